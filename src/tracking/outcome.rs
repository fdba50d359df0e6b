use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::market::MarketData;
use crate::models::{Bar, Candidate, CandidateStatus, RuleTag};
use crate::tracking::store::CandidateStore;

/// Stop-loss / target / hold-period rules for resolving a flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRules {
    pub stop_loss_pct: f64,
    pub target_pct: f64,
    /// Trading sessions the flag stays live; 3 spans a weekend.
    pub hold_days: usize,
}

impl Default for OutcomeRules {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.07,
            target_pct: 0.15,
            hold_days: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutcomeChange {
    pub status: CandidateStatus,
    /// Actual session extreme that breached the line (low for stop,
    /// high for target), or the final hold session's close on expiry.
    pub price: f64,
    pub session_date: NaiveDate,
}

/// Walks post-flag sessions in order and applies the terminal rules.
/// Stop-loss is checked before target within a session: when both
/// lines are crossed by one session's range, the conservative outcome
/// wins. Expiry fires only once a session beyond the hold window
/// exists, proving the window elapsed without a breach.
pub fn classify(flag_price: f64, post_bars: &[Bar], rules: &OutcomeRules) -> Option<OutcomeChange> {
    if flag_price <= 0.0 || post_bars.is_empty() {
        return None;
    }

    let stop_line = flag_price * (1.0 - rules.stop_loss_pct);
    let target_line = flag_price * (1.0 + rules.target_pct);
    // A zero hold window makes no sense; treat it as one session.
    let hold_days = rules.hold_days.max(1);

    for bar in post_bars.iter().take(hold_days) {
        if bar.low <= stop_line {
            return Some(OutcomeChange {
                status: CandidateStatus::StoppedOut,
                price: bar.low,
                session_date: bar.date,
            });
        }
        if bar.high >= target_line {
            return Some(OutcomeChange {
                status: CandidateStatus::TargetHit,
                price: bar.high,
                session_date: bar.date,
            });
        }
    }

    if post_bars.len() > hold_days {
        let last_held = post_bars[hold_days - 1];
        return Some(OutcomeChange {
            status: CandidateStatus::Expired,
            price: last_held.close,
            session_date: post_bars[hold_days].date,
        });
    }

    None
}

/// Aggregate statistics over every resolved candidate in the log.
/// Winners are target hits, losers are stop-outs; expiries are
/// reported separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutcomeStats {
    pub resolved_total: usize,
    pub wins: usize,
    pub losses: usize,
    pub expired: usize,
    pub win_rate: f64,
    pub avg_gain_pct: f64,
    pub avg_loss_pct: f64,
    pub avg_expired_pct: f64,
    pub avg_volume_ratio_winners: f64,
    pub avg_volume_ratio_losers: f64,
    pub avg_change_pct_winners: f64,
    pub avg_change_pct_losers: f64,
    pub winner_tags: HashMap<String, usize>,
    pub loser_tags: HashMap<String, usize>,
}

impl OutcomeStats {
    pub fn compute(candidates: &[Candidate]) -> Self {
        let winners: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.status == CandidateStatus::TargetHit)
            .collect();
        let losers: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.status == CandidateStatus::StoppedOut)
            .collect();
        let expired: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.status == CandidateStatus::Expired)
            .collect();

        let decided = winners.len() + losers.len();
        let win_rate = if decided > 0 {
            winners.len() as f64 / decided as f64
        } else {
            0.0
        };

        let mut stats = Self {
            resolved_total: decided + expired.len(),
            wins: winners.len(),
            losses: losers.len(),
            expired: expired.len(),
            win_rate: round4(win_rate),
            avg_gain_pct: round4(avg_return(&winners)),
            avg_loss_pct: round4(avg_return(&losers)),
            avg_expired_pct: round4(avg_return(&expired)),
            avg_volume_ratio_winners: round4(avg_by(&winners, |c| c.volume_ratio)),
            avg_volume_ratio_losers: round4(avg_by(&losers, |c| c.volume_ratio)),
            avg_change_pct_winners: round4(avg_by(&winners, |c| c.change_pct)),
            avg_change_pct_losers: round4(avg_by(&losers, |c| c.change_pct)),
            winner_tags: HashMap::new(),
            loser_tags: HashMap::new(),
        };

        for c in &winners {
            for tag in &c.rule_reasons {
                *stats.winner_tags.entry(tag.as_str().to_string()).or_insert(0) += 1;
            }
        }
        for c in &losers {
            for tag in &c.rule_reasons {
                *stats.loser_tags.entry(tag.as_str().to_string()).or_insert(0) += 1;
            }
        }

        stats
    }

    /// Fraction of the group carrying a given tag.
    pub fn tag_share(&self, tag: RuleTag, winners: bool) -> f64 {
        let (map, total) = if winners {
            (&self.winner_tags, self.wins)
        } else {
            (&self.loser_tags, self.losses)
        };
        if total == 0 {
            return 0.0;
        }
        *map.get(tag.as_str()).unwrap_or(&0) as f64 / total as f64
    }
}

fn avg_return(group: &[&Candidate]) -> f64 {
    let returns: Vec<f64> = group.iter().filter_map(|c| c.realized_return_pct()).collect();
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().sum::<f64>() / returns.len() as f64
}

fn avg_by(group: &[&Candidate], f: impl Fn(&Candidate) -> f64) -> f64 {
    if group.is_empty() {
        return 0.0;
    }
    group.iter().map(|c| f(c)).sum::<f64>() / group.len() as f64
}

fn round4(x: f64) -> f64 {
    (x * 10000.0).round() / 10000.0
}

#[derive(Debug, Clone)]
pub struct TrackingReport {
    pub evaluated: usize,
    pub resolved: Vec<Candidate>,
    pub still_open: usize,
    pub stats: OutcomeStats,
}

/// Next-session reconciliation: reads the log, fetches post-flag bars
/// per OPEN candidate, applies the terminal rules, rewrites the log.
/// Terminal records are never re-evaluated.
pub struct OutcomeTracker {
    rules: OutcomeRules,
}

impl OutcomeTracker {
    pub fn new(rules: OutcomeRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &OutcomeRules {
        &self.rules
    }

    pub async fn reconcile(
        &self,
        market: &mut dyn MarketData,
        store: &mut dyn CandidateStore,
        today: NaiveDate,
    ) -> TrackingReport {
        let open = store.list_open();
        let evaluated = open.len();
        let mut resolved = Vec::new();

        for mut candidate in open {
            let start = candidate.flag_date() + chrono::Duration::days(1);
            // Today's session is still forming, so only fetch through
            // the prior calendar day.
            let end = today - chrono::Duration::days(1);
            if start > end {
                continue;
            }

            let bars = match market.daily_bars(&candidate.code, start, end).await {
                Ok(bars) => bars,
                Err(e) => {
                    // Skip for this run; the flag stays open.
                    warn!(code = %candidate.code, "post-flag fetch failed: {e:#}");
                    continue;
                }
            };

            // A provider may still return today's partial row; drop it.
            let post: Vec<Bar> = bars
                .after(candidate.flag_date())
                .iter()
                .filter(|b| b.date < today)
                .copied()
                .collect();
            if let Some(change) = classify(candidate.flag_price, &post, &self.rules) {
                let resolved_at = change
                    .session_date
                    .and_time(NaiveTime::MIN)
                    .and_utc();
                candidate.resolve(change.status, change.price, resolved_at);
                info!(
                    code = %candidate.code,
                    status = %change.status,
                    price = change.price,
                    "candidate resolved"
                );
                store.update(&candidate);
                resolved.push(candidate);
            }
        }

        let all = store.list();
        let stats = OutcomeStats::compute(&all);
        let still_open = all.iter().filter(|c| c.is_open()).count();

        TrackingReport {
            evaluated,
            resolved,
            still_open,
            stats,
        }
    }
}

/// True on KRX trading days (weekdays; holidays are not modeled).
pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_bars, make_candidate};

    fn rules() -> OutcomeRules {
        OutcomeRules::default()
    }

    // flag_price 10000: stop line 9300, target line 11500

    #[test]
    fn stop_breach_resolves_stopped_out_at_session_low() {
        let bars = make_bars(&[(9800.0, 9900.0, 9200.0, 9500.0, 1000.0)]);
        let change = classify(10000.0, bars.as_slice(), &rules()).expect("resolved");
        assert_eq!(change.status, CandidateStatus::StoppedOut);
        assert!((change.price - 9200.0).abs() < 1e-9);
    }

    #[test]
    fn target_breach_resolves_target_hit_at_session_high() {
        let bars = make_bars(&[(10200.0, 11600.0, 9500.0, 11400.0, 1000.0)]);
        let change = classify(10000.0, bars.as_slice(), &rules()).expect("resolved");
        assert_eq!(change.status, CandidateStatus::TargetHit);
        assert!((change.price - 11600.0).abs() < 1e-9);
    }

    #[test]
    fn same_session_double_breach_is_stopped_out() {
        // Low 9200 and high 11600 in one session: conservative bias.
        let bars = make_bars(&[(10000.0, 11600.0, 9200.0, 10500.0, 1000.0)]);
        let change = classify(10000.0, bars.as_slice(), &rules()).expect("resolved");
        assert_eq!(change.status, CandidateStatus::StoppedOut);
        assert!((change.price - 9200.0).abs() < 1e-9);
    }

    #[test]
    fn stop_in_earlier_session_beats_target_in_later() {
        let bars = make_bars(&[
            (9800.0, 9900.0, 9250.0, 9400.0, 1000.0),
            (9400.0, 11700.0, 9300.0, 11600.0, 1000.0),
        ]);
        let change = classify(10000.0, bars.as_slice(), &rules()).expect("resolved");
        assert_eq!(change.status, CandidateStatus::StoppedOut);
    }

    #[test]
    fn no_breach_three_sessions_stays_open() {
        let flat = (9900.0, 10200.0, 9700.0, 10000.0, 1000.0);
        let bars = make_bars(&[flat, flat, flat]);
        assert!(classify(10000.0, bars.as_slice(), &rules()).is_none());
    }

    #[test]
    fn expiry_fires_exactly_at_session_hold_days_plus_one() {
        let flat = (9900.0, 10200.0, 9700.0, 10000.0, 1000.0);
        let bars = make_bars(&[flat, flat, flat, flat]);
        let change = classify(10000.0, bars.as_slice(), &rules()).expect("resolved");
        assert_eq!(change.status, CandidateStatus::Expired);
        // Exits at the close of the final hold session.
        assert!((change.price - 10000.0).abs() < 1e-9);
        assert_eq!(change.session_date, bars[3].date);
    }

    #[test]
    fn breach_beyond_hold_window_is_expiry_not_target() {
        let flat = (9900.0, 10200.0, 9700.0, 10000.0, 1000.0);
        let bars = make_bars(&[flat, flat, flat, (10000.0, 12000.0, 9900.0, 11900.0, 1000.0)]);
        let change = classify(10000.0, bars.as_slice(), &rules()).expect("resolved");
        assert_eq!(change.status, CandidateStatus::Expired);
    }

    #[test]
    fn no_post_flag_bars_no_resolution() {
        assert!(classify(10000.0, &[], &rules()).is_none());
    }

    #[test]
    fn zero_hold_days_is_clamped_to_one_session() {
        let mut r = rules();
        r.hold_days = 0;
        let flat = (9900.0, 10200.0, 9700.0, 10000.0, 1000.0);
        let bars = make_bars(&[flat, flat]);
        let change = classify(10000.0, bars.as_slice(), &r).expect("resolved");
        assert_eq!(change.status, CandidateStatus::Expired);
        assert!((change.price - 10000.0).abs() < 1e-9);
    }

    #[test]
    fn stats_split_winners_and_losers() {
        let mut win = make_candidate("005930", 10000.0);
        win.id = 1;
        win.volume_ratio = 4.0;
        win.resolve(
            CandidateStatus::TargetHit,
            11600.0,
            Utc::now(),
        );

        let mut loss = make_candidate("000660", 10000.0);
        loss.id = 2;
        loss.volume_ratio = 2.6;
        loss.resolve(
            CandidateStatus::StoppedOut,
            9200.0,
            Utc::now(),
        );

        let mut open = make_candidate("035720", 10000.0);
        open.id = 3;

        let stats = OutcomeStats::compute(&[win, loss, open]);
        assert_eq!(stats.resolved_total, 2);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert!((stats.win_rate - 0.5).abs() < 1e-9);
        assert!((stats.avg_gain_pct - 0.16).abs() < 1e-9);
        assert!((stats.avg_loss_pct - (-0.08)).abs() < 1e-9);
        assert!((stats.avg_volume_ratio_winners - 4.0).abs() < 1e-9);
        assert!((stats.avg_volume_ratio_losers - 2.6).abs() < 1e-9);
        assert!(stats.tag_share(RuleTag::VolumeSpike, true) > 0.99);
    }

    #[test]
    fn trading_day_skips_weekends() {
        // 2024-03-09 is a Saturday.
        assert!(!is_trading_day(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()));
        assert!(is_trading_day(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()));
    }
}
