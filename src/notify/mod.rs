pub mod telegram;

pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Candidate;
use crate::tracking::{Suggestion, TrackingReport};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("messaging API error: {0}")]
    Api(String),
}

/// Best-effort delivery: implementations log failures locally and
/// never surface them to the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str);
}

/// Human-readable flag alert.
pub fn render_alert(candidate: &Candidate) -> String {
    let mut lines = vec![
        "[EARLY SURGE]".to_string(),
        format!("{} ({})", candidate.name, candidate.code),
        format!("price {:.0}", candidate.flag_price),
        format!(
            "change {:+.1}% | volume x{:.1}",
            candidate.change_pct * 100.0,
            candidate.volume_ratio
        ),
    ];
    let tags: Vec<&str> = candidate.rule_reasons.iter().map(|t| t.as_str()).collect();
    lines.push(format!("rules: {}", tags.join(", ")));
    if !candidate.theme_keywords.is_empty() {
        lines.push(format!("themes: {}", candidate.theme_keywords.join(", ")));
    }
    lines.join("\n")
}

/// Intraday pullback downgrade notice.
pub fn render_pullback(code: &str, name: &str, flag_price: f64, current: f64, drop_pct: f64) -> String {
    format!(
        "[PULLBACK] {} ({})\nflagged {:.0} -> now {:.0} ({:+.1}%)\nconfidence downgraded for today",
        name,
        code,
        flag_price,
        current,
        -drop_pct * 100.0
    )
}

/// Daily reconciliation summary with threshold suggestions appended.
pub fn render_report(report: &TrackingReport, suggestions: &[Suggestion]) -> String {
    let stats = &report.stats;
    let mut lines = vec![
        "[OUTCOME REPORT]".to_string(),
        format!(
            "evaluated {} open | resolved {} | still open {}",
            report.evaluated,
            report.resolved.len(),
            report.still_open
        ),
    ];

    for c in &report.resolved {
        let ret = c.realized_return_pct().unwrap_or(0.0);
        lines.push(format!(
            "  {} ({}) {} {:+.1}%",
            c.name,
            c.code,
            c.status,
            ret * 100.0
        ));
    }

    lines.push(format!(
        "all-time: {} wins / {} losses / {} expired (win rate {:.1}%)",
        stats.wins,
        stats.losses,
        stats.expired,
        stats.win_rate * 100.0
    ));
    lines.push(format!(
        "avg gain {:+.1}% | avg loss {:+.1}%",
        stats.avg_gain_pct * 100.0,
        stats.avg_loss_pct * 100.0
    ));

    if suggestions.is_empty() {
        lines.push("thresholds: no change suggested".to_string());
    } else {
        lines.push("threshold suggestions:".to_string());
        for s in suggestions {
            if s.is_note() {
                lines.push(format!("  {}", s.reason));
            } else {
                lines.push(format!(
                    "  {}: {:.4} -> {:.4} ({})",
                    s.parameter, s.current, s.suggested, s.reason
                ));
            }
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateStatus, RuleTag};
    use crate::test_helpers::make_candidate;
    use crate::tracking::OutcomeStats;
    use chrono::Utc;

    #[test]
    fn alert_carries_code_rules_and_themes() {
        let mut c = make_candidate("005930", 71000.0);
        c.name = "삼성전자".to_string();
        c.change_pct = 0.062;
        c.volume_ratio = 3.4;
        c.rule_reasons.push(RuleTag::ThemeNews);
        c.theme_keywords = vec!["공급계약".to_string()];

        let text = render_alert(&c);
        assert!(text.contains("005930"));
        assert!(text.contains("volume_spike"));
        assert!(text.contains("theme_news"));
        assert!(text.contains("공급계약"));
        assert!(text.contains("+6.2%"));
    }

    #[test]
    fn report_lists_resolutions_and_suggestions() {
        let mut c = make_candidate("005930", 10000.0);
        c.resolve(CandidateStatus::TargetHit, 11600.0, Utc::now());

        let report = TrackingReport {
            evaluated: 2,
            resolved: vec![c.clone()],
            still_open: 1,
            stats: OutcomeStats::compute(&[c]),
        };
        let suggestions = vec![Suggestion {
            parameter: "min_volume_ratio".to_string(),
            current: 2.5,
            suggested: 2.7,
            reason: "weak win rate".to_string(),
        }];

        let text = render_report(&report, &suggestions);
        assert!(text.contains("target_hit"));
        assert!(text.contains("+16.0%"));
        assert!(text.contains("min_volume_ratio: 2.5000 -> 2.7000"));
    }

    #[test]
    fn report_without_suggestions_says_so() {
        let report = TrackingReport {
            evaluated: 0,
            resolved: vec![],
            still_open: 0,
            stats: OutcomeStats::default(),
        };
        let text = render_report(&report, &[]);
        assert!(text.contains("no change suggested"));
    }
}
