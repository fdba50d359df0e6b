use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::market::auth::{AuthContext, TokenResponse, TokenSource};
use crate::market::MarketData;
use crate::models::{Bar, BarSeries};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);

const TR_ID_DAILY_CHART: &str = "FHKST03010100";
const TR_ID_CURRENT_PRICE: &str = "FHKST01010100";

#[derive(Debug, Deserialize)]
struct TokenPayload {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct DailyChartResponse {
    #[serde(default)]
    output2: Vec<RawDailyBar>,
}

/// One session row as the brokerage returns it: every numeric field is
/// a string tagged with a broker field code.
#[derive(Debug, Deserialize)]
pub(crate) struct RawDailyBar {
    #[serde(default)]
    stck_bsop_date: String,
    #[serde(default)]
    stck_oprc: String,
    #[serde(default)]
    stck_hgpr: String,
    #[serde(default)]
    stck_lwpr: String,
    #[serde(default)]
    stck_clpr: String,
    #[serde(default)]
    acml_vol: String,
}

#[derive(Debug, Deserialize)]
struct CurrentPriceResponse {
    output: CurrentPriceOutput,
}

#[derive(Debug, Deserialize)]
struct CurrentPriceOutput {
    #[serde(default)]
    stck_prpr: String,
}

/// Token endpoint split from the quote client so the auth cache can
/// borrow it independently.
struct KisTokenEndpoint {
    client: Client,
    base_url: String,
    app_key: String,
    app_secret: String,
}

#[async_trait]
impl TokenSource for KisTokenEndpoint {
    async fn request_token(&self) -> Result<TokenResponse> {
        let url = format!("{}/oauth2/tokenP", self.base_url);
        let body = serde_json::json!({
            "grant_type": "client_credentials",
            "appkey": self.app_key,
            "appsecret": self.app_secret,
        });

        let resp = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .context("token request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("token endpoint error {}: {}", status, body);
        }

        let payload: TokenPayload = resp
            .json()
            .await
            .context("failed to parse token response")?;

        Ok(TokenResponse {
            access_token: payload.access_token,
            expires_in: payload.expires_in,
        })
    }
}

/// Brokerage quote client: OAuth2 token with cached expiry plus the
/// daily-chart and current-price endpoints.
pub struct KisClient {
    client: Client,
    endpoint: KisTokenEndpoint,
    auth: AuthContext,
    last_request: Option<Instant>,
}

impl KisClient {
    pub fn new(cfg: &Config) -> Self {
        Self {
            client: Client::new(),
            endpoint: KisTokenEndpoint {
                client: Client::new(),
                base_url: cfg.kis_base_url.clone(),
                app_key: cfg.kis_app_key.clone(),
                app_secret: cfg.kis_app_secret.clone(),
            },
            auth: AuthContext::new(),
            last_request: None,
        }
    }

    async fn rate_limit(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < MIN_REQUEST_INTERVAL {
                tokio::time::sleep(MIN_REQUEST_INTERVAL - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    async fn authed_get(
        &mut self,
        path: &str,
        tr_id: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        let token = self.auth.token(&self.endpoint).await?;
        self.rate_limit().await;

        let url = format!("{}{}", self.endpoint.base_url, path);
        let resp = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .query(query)
            .header("authorization", format!("Bearer {}", token))
            .header("appkey", self.endpoint.app_key.clone())
            .header("appsecret", self.endpoint.app_secret.clone())
            .header("tr_id", tr_id)
            .send()
            .await
            .with_context(|| format!("request to {} failed", path))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("brokerage API error {} on {}: {}", status, path, body);
        }

        Ok(resp)
    }
}

#[async_trait]
impl MarketData for KisClient {
    async fn daily_bars(
        &mut self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BarSeries> {
        let query = [
            ("FID_COND_MRKT_DIV_CODE", "J".to_string()),
            ("FID_INPUT_ISCD", code.to_string()),
            ("FID_INPUT_DATE_1", start.format("%Y%m%d").to_string()),
            ("FID_INPUT_DATE_2", end.format("%Y%m%d").to_string()),
            ("FID_PERIOD_DIV_CODE", "D".to_string()),
            ("FID_ORG_ADJ_PRC", "0".to_string()),
        ];

        let resp = self
            .authed_get(
                "/uapi/domestic-stock/v1/quotations/inquire-daily-itemchartprice",
                TR_ID_DAILY_CHART,
                &query,
            )
            .await?;

        let data: DailyChartResponse = resp
            .json()
            .await
            .context("failed to parse daily chart response")?;

        let bars: Vec<Bar> = data.output2.iter().filter_map(bar_from_raw).collect();
        Ok(BarSeries::new(bars))
    }

    async fn current_price(&mut self, code: &str) -> Result<f64> {
        let query = [
            ("FID_COND_MRKT_DIV_CODE", "J".to_string()),
            ("FID_INPUT_ISCD", code.to_string()),
        ];

        let resp = self
            .authed_get(
                "/uapi/domestic-stock/v1/quotations/inquire-price",
                TR_ID_CURRENT_PRICE,
                &query,
            )
            .await?;

        let data: CurrentPriceResponse = resp
            .json()
            .await
            .context("failed to parse current price response")?;

        let price = parse_or_zero(&data.output.stck_prpr);
        if price <= 0.0 {
            anyhow::bail!("no usable price for {}", code);
        }
        Ok(price)
    }
}

/// Missing or non-numeric broker fields coerce to zero; only a bad
/// session date drops the row.
pub(crate) fn bar_from_raw(raw: &RawDailyBar) -> Option<Bar> {
    let date = NaiveDate::parse_from_str(&raw.stck_bsop_date, "%Y%m%d").ok()?;
    Some(Bar {
        date,
        open: parse_or_zero(&raw.stck_oprc),
        high: parse_or_zero(&raw.stck_hgpr),
        low: parse_or_zero(&raw.stck_lwpr),
        close: parse_or_zero(&raw.stck_clpr),
        volume: parse_or_zero(&raw.acml_vol),
    })
}

fn parse_or_zero(s: &str) -> f64 {
    s.trim().parse().unwrap_or(0.0)
}
