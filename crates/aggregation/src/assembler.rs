//! Final merge step of the read path.

use std::collections::HashSet;

use log::debug;

use crate::dedup::content_hash;
use crate::models::Event;

pub const DEFAULT_MAX_RESULTS: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssemblerConfig {
    pub max_results: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// Sorts by `(distance_km, start)`, drops content-hash duplicates across
/// sources (the nearest copy wins) and caps the list.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResultAssembler {
    config: AssemblerConfig,
}

impl ResultAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    pub fn assemble(&self, mut events: Vec<Event>) -> Vec<Event> {
        events.sort_by(Event::cmp_distance_then_start);

        let mut seen = HashSet::new();
        let total = events.len();
        let mut assembled: Vec<Event> = events
            .into_iter()
            .filter(|event| seen.insert(content_hash(event)))
            .collect();
        let unique = assembled.len();
        assembled.truncate(self.config.max_results);

        if assembled.len() < total {
            debug!(
                "Assembled {} of {} events ({} duplicates, cap {})",
                assembled.len(),
                total,
                total - unique,
                self.config.max_results
            );
        }
        assembled
    }
}
