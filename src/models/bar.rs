use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// OHLCV for one trading session. Immutable once fetched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Change ratio of this session's close against a reference close.
    pub fn change_from(&self, prior_close: f64) -> f64 {
        if prior_close <= 0.0 {
            return 0.0;
        }
        (self.close - prior_close) / prior_close
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn total_range(&self) -> f64 {
        self.high - self.low
    }
}

/// Wraps Vec<Bar> with the window helpers the rule evaluation needs.
/// Sorted ascending by date on construction.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.date);
        Self { bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn tail(&self, n: usize) -> BarSeries {
        let start = self.bars.len().saturating_sub(n);
        BarSeries::new(self.bars[start..].to_vec())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    pub fn as_slice(&self) -> &[Bar] {
        &self.bars
    }

    /// Close of the session before the last one.
    pub fn prior_close(&self) -> Option<f64> {
        if self.bars.len() < 2 {
            return None;
        }
        self.bars.get(self.bars.len() - 2).map(|b| b.close)
    }

    /// Average volume over up to `window` sessions preceding the last one.
    /// None when there is no preceding session.
    pub fn avg_volume_before_last(&self, window: usize) -> Option<f64> {
        if self.bars.len() < 2 || window == 0 {
            return None;
        }
        let end = self.bars.len() - 1;
        let start = end.saturating_sub(window);
        let slice = &self.bars[start..end];
        if slice.is_empty() {
            return None;
        }
        Some(slice.iter().map(|b| b.volume).sum::<f64>() / slice.len() as f64)
    }

    /// Sessions strictly after the given date (post-flag history).
    pub fn after(&self, date: NaiveDate) -> BarSeries {
        let bars: Vec<Bar> = self
            .bars
            .iter()
            .filter(|b| b.date > date)
            .copied()
            .collect();
        BarSeries::new(bars)
    }

    pub fn push(&mut self, bar: Bar) {
        self.bars.push(bar);
        self.bars.sort_by_key(|b| b.date);
    }
}

impl std::ops::Index<usize> for BarSeries {
    type Output = Bar;
    fn index(&self, index: usize) -> &Self::Output {
        &self.bars[index]
    }
}

impl<'a> IntoIterator for &'a BarSeries {
    type Item = &'a Bar;
    type IntoIter = std::slice::Iter<'a, Bar>;
    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}
