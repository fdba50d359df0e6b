pub mod bar;
pub mod candidate;

pub use bar::{Bar, BarSeries};
pub use candidate::{Candidate, CandidateStatus, RuleTag};
