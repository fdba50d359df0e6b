use serde::{Deserialize, Serialize};

use crate::detect::Thresholds;
use crate::models::RuleTag;
use crate::tracking::outcome::OutcomeStats;

// Hard floor/ceiling for each suggested parameter
const VOLUME_RATIO_FLOOR: f64 = 1.5;
const VOLUME_RATIO_CEILING: f64 = 10.0;
const CHANGE_PCT_FLOOR: f64 = 0.01;
const CHANGE_PCT_CEILING: f64 = 0.15;

const VOLUME_RATIO_STEP: f64 = 0.2;
const CHANGE_PCT_STEP: f64 = 0.005;

const WEAK_WIN_RATE: f64 = 0.45;
const STRONG_WIN_RATE: f64 = 0.65;

/// A suggested threshold move, reported but never auto-applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub parameter: String,
    pub current: f64,
    pub suggested: f64,
    pub reason: String,
}

impl Suggestion {
    fn shift(parameter: &str, current: f64, suggested: f64, reason: String) -> Self {
        Self {
            parameter: parameter.to_string(),
            current,
            suggested,
            reason,
        }
    }

    fn note(parameter: &str, reason: String) -> Self {
        Self {
            parameter: parameter.to_string(),
            current: 0.0,
            suggested: 0.0,
            reason,
        }
    }

    pub fn is_note(&self) -> bool {
        self.parameter.starts_with("note:")
    }
}

/// Comparative heuristics over the outcome statistics. No fitting, no
/// inference: bounded single steps in the direction the win/loss split
/// points.
pub struct ThresholdAdvisor {
    pub min_sample: usize,
}

impl ThresholdAdvisor {
    pub fn new(min_sample: usize) -> Self {
        Self { min_sample }
    }

    pub fn suggest(&self, stats: &OutcomeStats, th: &Thresholds) -> Vec<Suggestion> {
        let mut suggestions = Vec::new();
        if stats.wins + stats.losses < self.min_sample {
            return suggestions;
        }

        if stats.win_rate < WEAK_WIN_RATE {
            // Losers flagged on thinner volume than winners: the
            // volume bar is letting weak setups through.
            if stats.avg_volume_ratio_losers < stats.avg_volume_ratio_winners {
                let next = (th.min_volume_ratio + VOLUME_RATIO_STEP).min(VOLUME_RATIO_CEILING);
                if next > th.min_volume_ratio {
                    suggestions.push(Suggestion::shift(
                        "min_volume_ratio",
                        th.min_volume_ratio,
                        round4(next),
                        format!(
                            "win rate {:.1}%, loser avg volume ratio {:.2} vs winner {:.2}",
                            stats.win_rate * 100.0,
                            stats.avg_volume_ratio_losers,
                            stats.avg_volume_ratio_winners
                        ),
                    ));
                }
            }
            if stats.avg_change_pct_losers < stats.avg_change_pct_winners {
                let next = (th.min_change_pct + CHANGE_PCT_STEP).min(CHANGE_PCT_CEILING);
                if next > th.min_change_pct {
                    suggestions.push(Suggestion::shift(
                        "min_change_pct",
                        th.min_change_pct,
                        round4(next),
                        format!(
                            "win rate {:.1}%, loser avg change {:.2}% vs winner {:.2}%",
                            stats.win_rate * 100.0,
                            stats.avg_change_pct_losers * 100.0,
                            stats.avg_change_pct_winners * 100.0
                        ),
                    ));
                }
            }
        } else if stats.win_rate > STRONG_WIN_RATE {
            // Strong hit rate: the volume bar may be rejecting good
            // setups, loosen one step.
            let next = (th.min_volume_ratio - VOLUME_RATIO_STEP).max(VOLUME_RATIO_FLOOR);
            if next < th.min_volume_ratio {
                suggestions.push(Suggestion::shift(
                    "min_volume_ratio",
                    th.min_volume_ratio,
                    round4(next),
                    format!("win rate {:.1}%, room to loosen", stats.win_rate * 100.0),
                ));
            }
        }

        let theme_winners = stats.tag_share(RuleTag::ThemeNews, true);
        let theme_losers = stats.tag_share(RuleTag::ThemeNews, false);
        if theme_winners - theme_losers > 0.2 {
            suggestions.push(Suggestion::note(
                "note:theme_news",
                format!(
                    "theme-backed flags win more often ({:.0}% of winners vs {:.0}% of losers)",
                    theme_winners * 100.0,
                    theme_losers * 100.0
                ),
            ));
        }

        suggestions
    }
}

fn round4(x: f64) -> f64 {
    (x * 10000.0).round() / 10000.0
}
