use std::collections::HashSet;
use tracing::debug;

use crate::models::Candidate;

/// Intraday invalidation for same-session candidates. A pullback only
/// downgrades confidence for the rest of the session; the persisted
/// status stays OPEN so the next-session tracker still evaluates the
/// multi-day stop/target/expiry outcome.
#[derive(Debug, Clone)]
pub struct PullbackEvent {
    pub candidate_id: u64,
    pub code: String,
    pub flag_price: f64,
    pub current_price: f64,
    pub drop_pct: f64,
}

pub struct PullbackMonitor {
    pullback_pct: f64,
    target_pct: f64,
    invalidated: HashSet<u64>,
    target_touched: HashSet<u64>,
}

impl PullbackMonitor {
    pub fn new(pullback_pct: f64, target_pct: f64) -> Self {
        Self {
            pullback_pct,
            target_pct,
            invalidated: HashSet::new(),
            target_touched: HashSet::new(),
        }
    }

    /// Re-check one OPEN candidate against the current price. Returns
    /// an event the first time the pullback rule fires; a candidate
    /// that touched its target first is never invalidated intraday.
    pub fn check(&mut self, candidate: &Candidate, current_price: f64) -> Option<PullbackEvent> {
        if !candidate.is_open() || self.invalidated.contains(&candidate.id) {
            return None;
        }

        if current_price >= candidate.target_line(self.target_pct) {
            self.target_touched.insert(candidate.id);
            return None;
        }

        if self.target_touched.contains(&candidate.id) {
            return None;
        }

        let floor = candidate.flag_price * (1.0 - self.pullback_pct);
        if current_price > floor {
            return None;
        }

        self.invalidated.insert(candidate.id);
        let drop_pct = (candidate.flag_price - current_price) / candidate.flag_price;
        debug!(
            code = %candidate.code,
            drop_pct,
            "intraday pullback, confidence downgraded"
        );

        Some(PullbackEvent {
            candidate_id: candidate.id,
            code: candidate.code.clone(),
            flag_price: candidate.flag_price,
            current_price,
            drop_pct,
        })
    }

    pub fn is_invalidated(&self, candidate_id: u64) -> bool {
        self.invalidated.contains(&candidate_id)
    }

    /// Intraday state does not survive the session roll; unresolved
    /// candidates themselves carry over untouched.
    pub fn reset_session(&mut self) {
        self.invalidated.clear();
        self.target_touched.clear();
    }
}
