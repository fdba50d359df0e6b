use chrono::{DateTime, NaiveDate, Utc};

use surge_radar::models::{Bar, BarSeries, Candidate, CandidateStatus, RuleTag};

/// Daily bars from (open, high, low, close, volume) tuples with
/// consecutive dates starting at `base`.
pub fn make_bars_from(base: NaiveDate, data: &[(f64, f64, f64, f64, f64)]) -> BarSeries {
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

/// An OPEN candidate flagged mid-morning KST on Friday 2024-03-08.
pub fn make_candidate(code: &str, flag_price: f64) -> Candidate {
    let flagged_at: DateTime<Utc> = DateTime::parse_from_rfc3339("2024-03-08T01:30:00Z")
        .unwrap()
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
