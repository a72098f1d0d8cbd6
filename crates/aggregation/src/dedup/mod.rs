//! Write-path deduplication.
//!
//! A submission is hashed over its meaningful fields; a live row with the
//! same hash rejects it outright. Otherwise [`DeduplicationMatcher`] looks
//! for the same occurrence among live rows and the submission replaces it
//! in place, or is inserted under a new id.

mod content_hash;
mod matcher;
mod pool;
mod similarity;

pub use content_hash::content_hash;
pub use matcher::{
    city_key, plan_submission, DedupCandidate, DeduplicationMatcher, SubmissionPlan, SubmitAction,
    SubmitOutcome,
};
pub use pool::{apply_plan, EventPool, InMemoryEventPool, StoredEvent};
pub use similarity::{
    normalize_title, title_similarity, DedupConfig, SAME_PLACE_RADIUS_KM,
    TITLE_SIMILARITY_THRESHOLD,
};
