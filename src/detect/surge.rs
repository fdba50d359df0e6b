use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{BarSeries, Candidate, CandidateStatus, RuleTag};
use crate::tracking::CandidateStore;

/// Detection thresholds. Tunable via env in `Config::from_env`; the
/// outcome tracker suggests (but never applies) adjustments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Today's volume vs the trailing average must reach this ratio.
    pub min_volume_ratio: f64,
    /// Close vs prior close must gain at least this fraction.
    pub min_change_pct: f64,
    /// KRX daily price band above the prior close.
    pub limit_up_pct: f64,
    /// Flag only while the close is below this fraction of the
    /// limit-up ceiling, so the alert fires before lock-limit.
    pub limit_up_proximity: f64,
    /// Trailing sessions used for the volume average.
    pub volume_lookback: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_volume_ratio: 2.5,
            min_change_pct: 0.05,
            limit_up_pct: 0.30,
            limit_up_proximity: 0.97,
            volume_lookback: 5,
        }
    }
}

/// What the rules saw when they fired, carried onto the Candidate.
#[derive(Debug, Clone)]
pub struct SurgeSignal {
    pub last_close: f64,
    pub change_pct: f64,
    pub volume_ratio: f64,
    pub tags: Vec<RuleTag>,
}

pub struct SurgeDetector;

impl SurgeDetector {
    /// Pure rule evaluation over an ascending daily series. Returns a
    /// signal only when BOTH the volume-ratio and price-change rules
    /// pass and the close is still short of the limit-up ceiling.
    /// Short or empty series evaluate to None, never an error.
    pub fn evaluate(bars: &BarSeries, th: &Thresholds) -> Option<SurgeSignal> {
        if bars.len() < th.volume_lookback + 1 {
            return None;
        }

        let today = bars.last()?;
        let prior_close = bars.prior_close()?;
        let avg_volume = bars.avg_volume_before_last(th.volume_lookback)?;
        if prior_close <= 0.0 || avg_volume <= 0.0 {
            return None;
        }

        let change_pct = today.change_from(prior_close);
        let volume_ratio = today.volume / avg_volume;

        if volume_ratio < th.min_volume_ratio || change_pct < th.min_change_pct {
            return None;
        }

        // Already at or near the daily ceiling: too late to alert.
        let ceiling = prior_close * (1.0 + th.limit_up_pct);
        if today.close >= ceiling * th.limit_up_proximity {
            return None;
        }

        Some(SurgeSignal {
            last_close: today.close,
            change_pct,
            volume_ratio,
            tags: vec![RuleTag::VolumeSpike, RuleTag::PriceThrust],
        })
    }

    /// One code through the full flag pipeline: an existing OPEN
    /// candidate suppresses re-flagging, otherwise the rules are
    /// evaluated and a new record appended. Returns the appended
    /// candidate so the caller can alert on it.
    pub fn flag(
        store: &mut dyn CandidateStore,
        code: &str,
        name: &str,
        bars: &BarSeries,
        th: &Thresholds,
        theme_keywords: Vec<String>,
    ) -> Option<Candidate> {
        if store.open_for_code(code).is_some() {
            debug!(code = %code, "open candidate exists, skipping");
            return None;
        }

        let signal = Self::evaluate(bars, th)?;
        let mut tags = signal.tags;
        if !theme_keywords.is_empty() {
            tags.push(RuleTag::ThemeNews);
        }

        let candidate = Candidate {
            id: store.next_id(),
            code: code.to_string(),
            name: name.to_string(),
            flagged_at: Utc::now(),
            flag_price: signal.last_close,
            rule_reasons: tags,
            volume_ratio: signal.volume_ratio,
            change_pct: signal.change_pct,
            theme_keywords,
            status: CandidateStatus::Open,
            resolution_price: None,
            resolved_at: None,
        };
        store.append(candidate.clone());
        Some(candidate)
    }
}
