use std::any::Any;

use diesel::connection::Connection;
use diesel::SqliteConnection;
use gedeon_aggregation::{DiscoveryError, Result};
use log::{debug, error};
use tokio::sync::{mpsc, oneshot};

use super::DbPool;
use crate::errors::StorageError;

type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;
type Erased = Box<dyn Any + Send + 'static>;

/// Handle for sending jobs to the writer actor.
///
/// Every job runs inside its own immediate transaction on the actor's single
/// connection, so read-then-write sequences (dedup lookup then insert) are
/// serialized across all callers.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<(Job<Erased>, oneshot::Sender<Result<Erased>>)>,
}

impl WriteHandle {
    /// Executes a job on the writer actor's dedicated connection.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send((
                Box::new(move |c| job(c).map(|v| Box::new(v) as Erased)),
                ret_tx,
            ))
            .await
            .map_err(|_| StorageError::WriterUnavailable("job channel closed".to_string()))?;

        let boxed = ret_rx
            .await
            .map_err(|_| StorageError::WriterUnavailable("reply dropped".to_string()))??;
        boxed.downcast::<T>().map(|v| *v).map_err(|_| {
            DiscoveryError::Storage("writer actor returned an unexpected type".to_string())
        })
    }
}

/// Spawns the single database writer. It holds one pooled connection for its
/// whole lifetime and stops when every [`WriteHandle`] is dropped.
pub fn spawn_writer(pool: &DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::channel::<(Job<Erased>, oneshot::Sender<Result<Erased>>)>(1024);
    let pool = pool.clone();

    tokio::spawn(async move {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                // Pending and future jobs see a closed channel
                error!("Writer actor could not get a connection: {}", e);
                return;
            }
        };

        while let Some((job, reply_tx)) = rx.recv().await {
            let result: Result<Erased> = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(DiscoveryError::from);

            // The requester may have given up waiting
            let _ = reply_tx.send(result);
        }
        debug!("Writer actor stopped");
    });

    WriteHandle { tx }
}
