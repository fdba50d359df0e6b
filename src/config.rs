use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::detect::Thresholds;
use crate::tracking::OutcomeRules;

pub type SharedConfig = Arc<RwLock<Config>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchItem {
    pub code: String,
    pub name: String,
}

/// Parses "005930:삼성전자,000660:SK하이닉스"; an entry without a name
/// falls back to its code.
pub fn parse_watchlist(raw: &str) -> Vec<WatchItem> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((code, name)) => WatchItem {
                code: code.trim().to_string(),
                name: name.trim().to_string(),
            },
            None => WatchItem {
                code: entry.to_string(),
                name: entry.to_string(),
            },
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Brokerage
    pub kis_base_url: String,
    pub kis_app_key: String,
    pub kis_app_secret: String,

    // Messaging
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,

    // Universe
    pub watchlist: Vec<WatchItem>,

    // Detection
    pub thresholds: Thresholds,
    pub pullback_pct: f64,
    pub history_days: i64,

    // Outcome tracking
    pub outcome: OutcomeRules,
    pub min_sample: usize,

    // Theme scan
    pub theme_keywords: Vec<String>,
    pub news_pages: Vec<String>,
    pub news_max_pages: usize,

    // Scheduling
    pub detection_interval_secs: u64,
    pub pullback_interval_secs: u64,

    // Logging
    pub log_dir: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        let env_f64 = |key: &str, default: f64| -> f64 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };
        let env_usize = |key: &str, default: usize| -> usize {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        let thresholds = Thresholds {
            min_volume_ratio: env_f64("MIN_VOLUME_RATIO", 2.5),
            min_change_pct: env_f64("MIN_CHANGE_PCT", 0.05),
            limit_up_pct: env_f64("LIMIT_UP_PCT", 0.30),
            limit_up_proximity: env_f64("LIMIT_UP_PROXIMITY", 0.97),
            volume_lookback: env_usize("VOLUME_LOOKBACK", 5),
        };

        let outcome = OutcomeRules {
            stop_loss_pct: env_f64("STOP_LOSS_PCT", 0.07),
            target_pct: env_f64("TARGET_PCT", 0.15),
            hold_days: env_usize("HOLD_DAYS", 3).max(1),
        };

        let theme_keywords: Vec<String> = env(
            "THEME_KEYWORDS",
            "무상증자,유상증자,신규사업,공급계약,임상,특허",
        )
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

        let news_pages: Vec<String> = env("NEWS_PAGES", "")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Config {
            kis_base_url: env("KIS_BASE_URL", "https://openapi.koreainvestment.com:9443"),
            kis_app_key: env("KIS_APP_KEY", ""),
            kis_app_secret: env("KIS_APP_SECRET", ""),
            telegram_bot_token: env("TELEGRAM_BOT_TOKEN", ""),
            telegram_chat_id: env("TELEGRAM_CHAT_ID", ""),
            watchlist: parse_watchlist(&env("WATCHLIST", "")),
            thresholds,
            pullback_pct: env_f64("PULLBACK_PCT", 0.03),
            history_days: env_usize("HISTORY_DAYS", 30) as i64,
            outcome,
            min_sample: env_usize("MIN_SAMPLE", 10),
            theme_keywords,
            news_pages,
            news_max_pages: env_usize("NEWS_MAX_PAGES", 2),
            detection_interval_secs: env_usize("DETECTION_INTERVAL_SECS", 300) as u64,
            pullback_interval_secs: env_usize("PULLBACK_INTERVAL_SECS", 120) as u64,
            log_dir: env("LOG_DIR", "logs"),
            log_level: env("LOG_LEVEL", "INFO"),
        }
    }

    pub fn candidate_log_path(&self) -> String {
        format!("{}/early_detect_log.json", self.log_dir)
    }

    pub fn shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }
}
