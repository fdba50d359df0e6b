pub mod advisor;
pub mod outcome;
pub mod store;

pub use advisor::{Suggestion, ThresholdAdvisor};
pub use outcome::{classify, is_trading_day, OutcomeRules, OutcomeStats, OutcomeTracker, TrackingReport};
pub use store::{CandidateStore, JsonFileStore};
