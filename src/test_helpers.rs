use chrono::{DateTime, NaiveDate, Utc};

use crate::config::{parse_watchlist, Config};
use crate::detect::Thresholds;
use crate::models::{Bar, BarSeries, Candidate, CandidateStatus, RuleTag};
use crate::tracking::OutcomeRules;

/// Create daily bars from (open, high, low, close, volume) tuples with
/// consecutive dates starting Monday 2024-03-04.
pub fn make_bars(data: &[(f64, f64, f64, f64, f64)]) -> BarSeries {
    let base = NaiveDate::from_ymd_opt(2024, 3, 4).expect("valid date");

    let bars: Vec<Bar> = data
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c, v))| Bar {
            date: base + chrono::Duration::days(i as i64),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: v,
        })
        .collect();

    BarSeries::new(bars)
}

/// An OPEN candidate flagged mid-morning KST on 2024-03-08.
pub fn make_candidate(code: &str, flag_price: f64) -> Candidate {
    let flagged_at: DateTime<Utc> = DateTime::parse_from_rfc3339("2024-03-08T01:30:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc);

    Candidate {
        id: 1,
        code: code.to_string(),
        name: code.to_string(),
        flagged_at,
        flag_price,
        rule_reasons: vec![RuleTag::VolumeSpike, RuleTag::PriceThrust],
        volume_ratio: 3.0,
        change_pct: 0.06,
        theme_keywords: Vec::new(),
        status: CandidateStatus::Open,
        resolution_price: None,
        resolved_at: None,
    }
}

/// A Config suitable for testing — no credentials, temp log dir.
pub fn default_test_config() -> Config {
    Config {
        kis_base_url: "http://localhost".to_string(),
        kis_app_key: String::new(),
        kis_app_secret: String::new(),
        telegram_bot_token: String::new(),
        telegram_chat_id: String::new(),
        watchlist: parse_watchlist("005930:삼성전자,000660:SK하이닉스"),
        thresholds: Thresholds::default(),
        pullback_pct: 0.03,
        history_days: 30,
        outcome: OutcomeRules::default(),
        min_sample: 10,
        theme_keywords: vec!["공급계약".to_string(), "무상증자".to_string()],
        news_pages: Vec::new(),
        news_max_pages: 1,
        detection_interval_secs: 300,
        pullback_interval_secs: 120,
        log_dir: std::env::temp_dir()
            .join("surge_radar_test")
            .to_string_lossy()
            .to_string(),
        log_level: "ERROR".to_string(),
    }
}
