use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Asia::Seoul;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Open,
    StoppedOut,
    TargetHit,
    Expired,
}

impl CandidateStatus {
    pub fn is_terminal(&self) -> bool {
        *self != CandidateStatus::Open
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateStatus::Open => write!(f, "open"),
            CandidateStatus::StoppedOut => write!(f, "stopped_out"),
            CandidateStatus::TargetHit => write!(f, "target_hit"),
            CandidateStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Which heuristic rule(s) fired at detection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTag {
    VolumeSpike,
    PriceThrust,
    ThemeNews,
}

impl RuleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleTag::VolumeSpike => "volume_spike",
            RuleTag::PriceThrust => "price_thrust",
            RuleTag::ThemeNews => "theme_news",
        }
    }
}

impl fmt::Display for RuleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One flagged stock per detection event. Created by the detector,
/// resolved exactly once by the outcome tracker, kept forever for
/// statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: u64,
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub flagged_at: DateTime<Utc>,
    pub flag_price: f64,
    pub rule_reasons: Vec<RuleTag>,
    #[serde(default)]
    pub volume_ratio: f64,
    #[serde(default)]
    pub change_pct: f64,
    #[serde(default)]
    pub theme_keywords: Vec<String>,
    pub status: CandidateStatus,
    #[serde(default)]
    pub resolution_price: Option<f64>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Candidate {
    pub fn is_open(&self) -> bool {
        self.status == CandidateStatus::Open
    }

    /// KRX trading date the flag happened on.
    pub fn flag_date(&self) -> NaiveDate {
        self.flagged_at.with_timezone(&Seoul).date_naive()
    }

    pub fn stop_line(&self, stop_loss_pct: f64) -> f64 {
        self.flag_price * (1.0 - stop_loss_pct)
    }

    pub fn target_line(&self, target_pct: f64) -> f64 {
        self.flag_price * (1.0 + target_pct)
    }

    /// Records the single terminal transition. A second call is a no-op.
    pub fn resolve(&mut self, status: CandidateStatus, price: f64, at: DateTime<Utc>) {
        if self.status.is_terminal() || !status.is_terminal() {
            return;
        }
        self.status = status;
        self.resolution_price = Some(price);
        self.resolved_at = Some(at);
    }

    /// Realized return vs flag price, once resolved.
    pub fn realized_return_pct(&self) -> Option<f64> {
        if self.flag_price <= 0.0 {
            return None;
        }
        self.resolution_price
            .map(|p| (p - self.flag_price) / self.flag_price)
    }

    pub fn has_tag(&self, tag: RuleTag) -> bool {
        self.rule_reasons.contains(&tag)
    }
}
