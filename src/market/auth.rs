use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tracing::{debug, warn};

/// The server TTL is trimmed by this margin so a token is refreshed
/// before the brokerage actually rejects it.
const EXPIRY_MARGIN_SECS: i64 = 300;
const TOKEN_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    /// Server-reported lifetime in seconds.
    pub expires_in: i64,
}

/// Seam over the OAuth2 client-credentials endpoint so the cache and
/// retry logic can be tested without HTTP.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn request_token(&self) -> Result<TokenResponse>;
}

/// Lazily refreshed access-token cache, owned by the market client.
/// One instance per run; never a process-wide global.
#[derive(Debug)]
pub struct AuthContext {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    retry_delay: Duration,
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthContext {
    pub fn new() -> Self {
        Self {
            token: None,
            expires_at: None,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Tests use a zero delay to avoid sleeping through retries.
    pub fn with_retry_delay(retry_delay: Duration) -> Self {
        Self {
            token: None,
            expires_at: None,
            retry_delay,
        }
    }

    pub fn invalidate(&mut self) {
        self.token = None;
        self.expires_at = None;
    }

    /// Returns the cached token while it is still inside the expiry
    /// window; otherwise requests a new one with up to 3 attempts and a
    /// fixed delay between them. Exhausting the attempts is fatal to
    /// the caller's run.
    pub async fn token<S: TokenSource + ?Sized>(&mut self, source: &S) -> Result<String> {
        self.token_at(source, Utc::now()).await
    }

    pub async fn token_at<S: TokenSource + ?Sized>(
        &mut self,
        source: &S,
        now: DateTime<Utc>,
    ) -> Result<String> {
        if let (Some(token), Some(expires_at)) = (&self.token, self.expires_at) {
            if now < expires_at {
                return Ok(token.clone());
            }
            debug!("access token expired, refreshing");
        }

        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 1..=TOKEN_ATTEMPTS {
            match source.request_token().await {
                Ok(resp) => {
                    let ttl = (resp.expires_in - EXPIRY_MARGIN_SECS).max(0);
                    self.expires_at = Some(now + ChronoDuration::seconds(ttl));
                    self.token = Some(resp.access_token.clone());
                    debug!(ttl_secs = ttl, "access token refreshed");
                    return Ok(resp.access_token);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max = TOKEN_ATTEMPTS,
                        "token request failed: {e:#}"
                    );
                    last_err = Some(e);
                    if attempt < TOKEN_ATTEMPTS {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("token request failed")))
            .context(format!("authentication failed after {TOKEN_ATTEMPTS} attempts"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
        expires_in: i64,
    }

    impl CountingSource {
        fn ok(expires_in: i64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                expires_in,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
                expires_in: 0,
            }
        }

        fn count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn request_token(&self) -> Result<TokenResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(TokenResponse {
                access_token: format!("tok-{}", self.count()),
                expires_in: self.expires_in,
            })
        }
    }

    #[tokio::test]
    async fn two_calls_inside_window_issue_one_request() {
        let source = CountingSource::ok(86400);
        let mut auth = AuthContext::with_retry_delay(Duration::ZERO);
        let now = Utc::now();

        let t1 = auth.token_at(&source, now).await.unwrap();
        let t2 = auth
            .token_at(&source, now + ChronoDuration::minutes(10))
            .await
            .unwrap();

        assert_eq!(t1, t2);
        assert_eq!(source.count(), 1);
    }

    #[tokio::test]
    async fn call_after_expiry_refreshes_once() {
        let source = CountingSource::ok(86400);
        let mut auth = AuthContext::with_retry_delay(Duration::ZERO);
        let now = Utc::now();

        auth.token_at(&source, now).await.unwrap();
        // Past the TTL minus the safety margin.
        let later = now + ChronoDuration::seconds(86400 - 300 + 1);
        auth.token_at(&source, later).await.unwrap();

        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn margin_forces_early_refresh() {
        // TTL shorter than the safety margin: effectively always expired.
        let source = CountingSource::ok(200);
        let mut auth = AuthContext::with_retry_delay(Duration::ZERO);
        let now = Utc::now();

        auth.token_at(&source, now).await.unwrap();
        auth.token_at(&source, now + ChronoDuration::seconds(1))
            .await
            .unwrap();

        assert_eq!(source.count(), 2);
    }

    #[tokio::test]
    async fn failing_source_retried_exactly_three_times() {
        let source = CountingSource::failing();
        let mut auth = AuthContext::with_retry_delay(Duration::ZERO);

        let err = auth.token_at(&source, Utc::now()).await.unwrap_err();
        assert_eq!(source.count(), 3);
        assert!(err.to_string().contains("authentication failed"));
    }

    #[tokio::test]
    async fn invalidate_drops_cached_token() {
        let source = CountingSource::ok(86400);
        let mut auth = AuthContext::with_retry_delay(Duration::ZERO);
        let now = Utc::now();

        auth.token_at(&source, now).await.unwrap();
        auth.invalidate();
        auth.token_at(&source, now).await.unwrap();

        assert_eq!(source.count(), 2);
    }
}
