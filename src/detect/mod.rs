pub mod pullback;
pub mod surge;

pub use pullback::{PullbackEvent, PullbackMonitor};
pub use surge::{SurgeDetector, SurgeSignal, Thresholds};
