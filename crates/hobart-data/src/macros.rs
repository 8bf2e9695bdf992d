//! Macro series fetching.
//!
//! Pulls date-indexed macroeconomic observations (rates, spreads,
//! volatility indices) from a FRED-style JSON endpoint. Observations
//! land in the cache per series; [`crate::cache::QuoteCache::get_macro`]
//! assembles the wide frame the panel builder consumes.

use polars::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

use crate::error::{DataError, Result};

/// Default observations endpoint.
const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "HOBART_MACRO_API_KEY";

/// Default rate limit between requests.
const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct ObservationsPayload {
    observations: Vec<Observation>,
}

/// One dated observation. The upstream API encodes values as strings
/// and marks gaps with ".".
#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

struct RateLimiter {
    last_request: Instant,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Instant::now() - min_interval,
            min_interval,
        }
    }

    async fn wait(&mut self) {
        let elapsed = self.last_request.elapsed();
        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }
        self.last_request = Instant::now();
    }
}

/// Client for a date-indexed macro series API.
pub struct MacroProvider {
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for MacroProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacroProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MacroProvider {
    /// Create a provider against the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    /// Create a provider against a custom endpoint.
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(DataError::Network)?;

        Ok(Self {
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(DEFAULT_RATE_LIMIT))),
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Create a provider from the `HOBART_MACRO_API_KEY` environment
    /// variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| DataError::MissingApiKey(API_KEY_ENV.to_string()))?;
        Self::new(api_key)
    }

    /// Fetch one series' observations over a date range (ISO dates).
    ///
    /// Returns a frame with columns `date` (Date) and `value`;
    /// unparsable observations are skipped.
    pub async fn fetch_series(
        &self,
        series_id: &str,
        start: &str,
        end: &str,
    ) -> Result<DataFrame> {
        if series_id.is_empty() {
            return Err(DataError::MacroApi("empty series id".to_string()));
        }

        self.rate_limiter.lock().await.wait().await;

        let url = format!(
            "{}/series/observations?series_id={}&observation_start={}&observation_end={}&file_type=json",
            self.base_url, series_id, start, end
        );
        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(DataError::Network)?;

        if !response.status().is_success() {
            return Err(DataError::MacroApi(format!(
                "failed to fetch series {}: HTTP {}",
                series_id,
                response.status()
            )));
        }

        let payload = response.text().await.map_err(DataError::Network)?;
        let observations = parse_observations(&payload)?;
        if observations.is_empty() {
            return Err(DataError::MissingData {
                symbol: series_id.to_string(),
                reason: "no observations returned".to_string(),
            });
        }

        observations_frame(&observations)
    }
}

/// Parse the observations payload, dropping gap markers.
fn parse_observations(payload: &str) -> Result<Vec<(String, f64)>> {
    let parsed: ObservationsPayload = serde_json::from_str(payload)?;
    let observations = parsed
        .observations
        .into_iter()
        .filter_map(|o| o.value.trim().parse::<f64>().ok().map(|v| (o.date, v)))
        .collect();
    Ok(observations)
}

fn observations_frame(observations: &[(String, f64)]) -> Result<DataFrame> {
    let dates: Vec<String> = observations.iter().map(|(d, _)| d.clone()).collect();
    let values: Vec<f64> = observations.iter().map(|(_, v)| *v).collect();

    let df = DataFrame::new(vec![
        Series::new("date".into(), dates).into(),
        Series::new("value".into(), values).into(),
    ])?
    .lazy()
    .with_column(col("date").cast(DataType::Date))
    .sort(["date"], Default::default())
    .collect()?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_observations() {
        let payload = r#"{
            "observations": [
                {"date": "2024-01-02", "value": "5.33"},
                {"date": "2024-01-03", "value": "."},
                {"date": "2024-01-04", "value": "5.35"}
            ]
        }"#;

        let observations = parse_observations(payload).unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0], ("2024-01-02".to_string(), 5.33));
        assert_eq!(observations[1], ("2024-01-04".to_string(), 5.35));
    }

    #[test]
    fn test_parse_rejects_malformed_payload() {
        assert!(parse_observations("not json").is_err());
    }

    #[test]
    fn test_observations_frame_types() {
        let observations = vec![
            ("2024-01-02".to_string(), 5.33),
            ("2024-01-03".to_string(), 5.34),
        ];
        let df = observations_frame(&observations).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
        assert_eq!(df.column("value").unwrap().f64().unwrap().get(1), Some(5.34));
    }

    #[test]
    fn test_from_env_requires_key() {
        // Only meaningful when the variable is absent in the test
        // environment, which is the default.
        if std::env::var(API_KEY_ENV).is_err() {
            assert!(matches!(
                MacroProvider::from_env(),
                Err(DataError::MissingApiKey(_))
            ));
        }
    }
}
