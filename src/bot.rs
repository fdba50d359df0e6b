use chrono::{NaiveDate, Timelike, Utc};
use chrono_tz::Asia::Seoul;
use std::time::Instant;
use tracing::{debug, info, warn};

use surge_radar::config::SharedConfig;
use surge_radar::detect::{PullbackMonitor, SurgeDetector};
use surge_radar::market::MarketData;
use surge_radar::models::Candidate;
use surge_radar::news::{ThemeHit, ThemeScanner};
use surge_radar::notify::{render_alert, render_pullback, render_report, Notifier};
use surge_radar::tracking::{
    is_trading_day, CandidateStore, OutcomeTracker, ThresholdAdvisor,
};

const MARKET_OPEN: (u32, u32) = (9, 0);
const MARKET_CLOSE: (u32, u32) = (15, 30);

/// True during KRX cash-session hours on a trading day.
pub fn market_is_open(now_kst: chrono::DateTime<chrono_tz::Tz>) -> bool {
    if !is_trading_day(now_kst.date_naive()) {
        return false;
    }
    let minutes = now_kst.hour() * 60 + now_kst.minute();
    let open = MARKET_OPEN.0 * 60 + MARKET_OPEN.1;
    let close = MARKET_CLOSE.0 * 60 + MARKET_CLOSE.1;
    minutes >= open && minutes < close
}

pub struct SurgeBot {
    config: SharedConfig,
    market: Box<dyn MarketData>,
    store: Box<dyn CandidateStore>,
    notifier: Box<dyn Notifier>,
    scanner: ThemeScanner,
    pullback: PullbackMonitor,
    tracker: OutcomeTracker,
    advisor: ThresholdAdvisor,

    last_detection: Option<Instant>,
    last_pullback: Option<Instant>,
    last_reconciled: Option<NaiveDate>,
    session_date: NaiveDate,
    theme_hits: Vec<ThemeHit>,
}

impl SurgeBot {
    pub async fn new(
        config: SharedConfig,
        market: Box<dyn MarketData>,
        store: Box<dyn CandidateStore>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let cfg = config.read().await;

        info!("{}", "=".repeat(60));
        info!("Surge radar starting up");
        info!("Watchlist: {} codes", cfg.watchlist.len());
        info!(
            "Thresholds: volume x{:.1} | change {:.1}% | lookback {}",
            cfg.thresholds.min_volume_ratio,
            cfg.thresholds.min_change_pct * 100.0,
            cfg.thresholds.volume_lookback
        );
        info!(
            "Outcome rules: stop {:.0}% | target {:.0}% | hold {} sessions",
            cfg.outcome.stop_loss_pct * 100.0,
            cfg.outcome.target_pct * 100.0,
            cfg.outcome.hold_days
        );
        info!("{}", "=".repeat(60));

        let scanner = ThemeScanner::new(
            cfg.theme_keywords.clone(),
            cfg.news_pages.clone(),
            cfg.news_max_pages,
        );
        let pullback = PullbackMonitor::new(cfg.pullback_pct, cfg.outcome.target_pct);
        let tracker = OutcomeTracker::new(cfg.outcome.clone());
        let advisor = ThresholdAdvisor::new(cfg.min_sample);
        let session_date = Utc::now().with_timezone(&Seoul).date_naive();

        drop(cfg);

        Self {
            config,
            market,
            store,
            notifier,
            scanner,
            pullback,
            tracker,
            advisor,
            last_detection: None,
            last_pullback: None,
            last_reconciled: None,
            session_date,
            theme_hits: Vec::new(),
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!("Bot is now running. Press Ctrl+C to stop.");
        self.print_status();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    self.shutdown();
                    return Ok(());
                }
                _ = self.tick() => {}
            }
        }
    }

    async fn tick(&mut self) {
        let now_kst = Utc::now().with_timezone(&Seoul);
        let today = now_kst.date_naive();

        if today != self.session_date {
            self.pullback.reset_session();
            self.theme_hits.clear();
            self.session_date = today;
        }

        if market_is_open(now_kst) {
            // Reconcile yesterday's flags once at the start of the session.
            if self.last_reconciled != Some(today) {
                self.run_outcome_reconciliation(today).await;
                self.last_reconciled = Some(today);
            }

            let (detect_secs, pullback_secs) = {
                let cfg = self.config.read().await;
                (cfg.detection_interval_secs, cfg.pullback_interval_secs)
            };

            if elapsed_at_least(self.last_detection, detect_secs) {
                self.run_detection_pass(today).await;
                self.last_detection = Some(Instant::now());
            }

            if elapsed_at_least(self.last_pullback, pullback_secs) {
                self.run_pullback_check(today).await;
                self.last_pullback = Some(Instant::now());
            }
        }

        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
    }

    /// One detection sweep over the watchlist. Idempotent: an already
    /// open candidate on a code suppresses re-flagging.
    pub async fn run_detection_pass(&mut self, today: NaiveDate) {
        let cfg = self.config.read().await.clone();

        self.theme_hits = self.scanner.scan(&cfg.watchlist).await;

        let start = today - chrono::Duration::days(cfg.history_days);
        for item in &cfg.watchlist {
            // Skip before the fetch; the flag pipeline re-checks.
            if self.store.open_for_code(&item.code).is_some() {
                continue;
            }

            let bars = match self.market.daily_bars(&item.code, start, today).await {
                Ok(bars) => bars,
                Err(e) => {
                    warn!(code = %item.code, "bar fetch failed, skipping: {e:#}");
                    continue;
                }
            };

            let keywords: Vec<String> = self
                .theme_hits
                .iter()
                .filter(|h| h.code == item.code)
                .map(|h| h.keyword.clone())
                .collect();

            let candidate = match SurgeDetector::flag(
                &mut *self.store,
                &item.code,
                &item.name,
                &bars,
                &cfg.thresholds,
                keywords,
            ) {
                Some(c) => c,
                None => continue,
            };

            info!(
                code = %candidate.code,
                price = candidate.flag_price,
                volume_ratio = candidate.volume_ratio,
                change_pct = candidate.change_pct,
                "early surge flagged"
            );
            self.notifier.send(&render_alert(&candidate)).await;
        }
    }

    /// Intraday re-check of candidates flagged earlier this session.
    pub async fn run_pullback_check(&mut self, today: NaiveDate) {
        let flagged_today: Vec<Candidate> = self
            .store
            .list_open()
            .into_iter()
            .filter(|c| c.flag_date() == today)
            .collect();

        for candidate in flagged_today {
            let price = match self.market.current_price(&candidate.code).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(code = %candidate.code, "price fetch failed: {e:#}");
                    continue;
                }
            };

            if let Some(event) = self.pullback.check(&candidate, price) {
                let text = render_pullback(
                    &event.code,
                    &candidate.name,
                    event.flag_price,
                    event.current_price,
                    event.drop_pct,
                );
                self.notifier.send(&text).await;
            }
        }
    }

    /// Next-session reconciliation of every OPEN candidate, followed by
    /// the summary report with threshold suggestions.
    pub async fn run_outcome_reconciliation(&mut self, today: NaiveDate) {
        let report = self
            .tracker
            .reconcile(&mut *self.market, &mut *self.store, today)
            .await;

        if report.evaluated == 0 {
            debug!("no open candidates to reconcile");
            return;
        }

        let thresholds = self.config.read().await.thresholds.clone();
        let suggestions = self.advisor.suggest(&report.stats, &thresholds);

        info!("--- Outcome Reconciliation ---");
        info!(
            "evaluated {} | resolved {} | still open {}",
            report.evaluated,
            report.resolved.len(),
            report.still_open
        );
        for s in &suggestions {
            if s.is_note() {
                info!("  {}", s.reason);
            } else {
                info!(
                    "  {}: {:.4} -> {:.4} ({})",
                    s.parameter, s.current, s.suggested, s.reason
                );
            }
        }

        self.notifier.send(&render_report(&report, &suggestions)).await;
    }

    fn print_status(&self) {
        let all = self.store.list();
        let open = all.iter().filter(|c| c.is_open()).count();
        let resolved = all.len() - open;
        info!("Session date: {}", self.session_date);
        info!("Candidates: {} open | {} resolved", open, resolved);
    }

    fn shutdown(&mut self) {
        info!("Shutting down...");
        self.print_status();
        info!("Bot stopped.");
    }
}

fn elapsed_at_least(last: Option<Instant>, secs: u64) -> bool {
    match last {
        Some(t) => t.elapsed().as_secs() >= secs,
        None => true,
    }
}
