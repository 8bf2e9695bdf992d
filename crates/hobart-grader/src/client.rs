//! HTTP client for the grading service.

use std::path::Path;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

use crate::error::{GraderError, Result};
use crate::parse::parse_score;

/// Environment variable holding the grader base URL.
pub const URL_ENV: &str = "HOBART_GRADER_URL";
/// Environment variable holding the login username.
pub const USER_ENV: &str = "HOBART_GRADER_USER";
/// Environment variable holding the login password.
pub const PASS_ENV: &str = "HOBART_GRADER_PASS";

/// Configuration for [`GraderClient`].
#[derive(Debug, Clone)]
pub struct GraderConfig {
    /// Service base URL, without a trailing slash.
    pub base_url: String,
    /// Login username; no login is attempted when absent.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Label preceding the score in the response page.
    pub score_label: String,
    /// Path of the submission endpoint.
    pub submit_path: String,
    /// Path of the login endpoint.
    pub login_path: String,
    /// Transport retries after the initial attempt.
    pub max_retries: usize,
    /// Minimum spacing between calls; also the backoff unit.
    pub call_delay: Duration,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            username: None,
            password: None,
            score_label: "score".to_string(),
            submit_path: "/submit".to_string(),
            login_path: "/login".to_string(),
            max_retries: 3,
            call_delay: Duration::from_millis(300),
        }
    }
}

impl GraderConfig {
    /// Build a configuration from `HOBART_GRADER_URL` plus the optional
    /// credential variables.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var(URL_ENV).map_err(|_| GraderError::MissingConfig(URL_ENV.to_string()))?;
        Ok(Self {
            base_url,
            username: std::env::var(USER_ENV).ok(),
            password: std::env::var(PASS_ENV).ok(),
            ..Self::default()
        })
    }
}

struct SessionState {
    logged_in: bool,
    last_call: Option<Instant>,
}

/// Serialized client for the grading service.
///
/// Calls run one at a time behind a session lock with a minimum spacing
/// between them, so a batch of submissions never floods the service.
pub struct GraderClient {
    client: reqwest::Client,
    config: GraderConfig,
    session: Mutex<SessionState>,
}

impl std::fmt::Debug for GraderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraderClient")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl GraderClient {
    /// Create a client. Cookies persist across calls so a form login
    /// carries over to subsequent submissions.
    pub fn new(config: GraderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(GraderError::Network)?;
        Ok(Self {
            client,
            config,
            session: Mutex::new(SessionState {
                logged_in: false,
                last_call: None,
            }),
        })
    }

    /// Create a client configured from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(GraderConfig::from_env()?)
    }

    /// The active configuration.
    pub const fn config(&self) -> &GraderConfig {
        &self.config
    }

    /// Upload one artifact for grading and return its score.
    ///
    /// `Ok(None)` means the service accepted the upload but the response
    /// page carried no usable score; the caller records the submission as
    /// ungraded and moves on. Transport errors are retried with linear
    /// backoff and surface as `Err` only once retries are exhausted.
    pub async fn submit(&self, artifact: &Path, year: i32) -> Result<Option<f64>> {
        let mut session = self.session.lock().await;
        self.pace(&mut session).await;

        if !session.logged_in && self.config.username.is_some() {
            self.login().await?;
            session.logged_in = true;
        }

        let Some(body) = self.upload_with_retries(artifact, year).await? else {
            return Ok(None);
        };
        let score = parse_score(&body, &self.config.score_label);
        if score.is_none() {
            log::warn!(
                "grader response for {} carries no '{}' value",
                artifact.display(),
                self.config.score_label
            );
        }
        Ok(score)
    }

    async fn pace(&self, session: &mut SessionState) {
        if let Some(last) = session.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.config.call_delay {
                sleep(self.config.call_delay - elapsed).await;
            }
        }
        session.last_call = Some(Instant::now());
    }

    async fn login(&self) -> Result<()> {
        let (Some(username), Some(password)) = (&self.config.username, &self.config.password)
        else {
            return Ok(());
        };
        let url = format!("{}{}", self.config.base_url, self.config.login_path);
        let response = self
            .client
            .post(&url)
            .form(&[("username", username.as_str()), ("password", password.as_str())])
            .send()
            .await
            .map_err(GraderError::Network)?;
        if !response.status().is_success() {
            return Err(GraderError::Http {
                status: response.status(),
                context: "login".to_string(),
            });
        }
        log::info!("logged in to grader as {username}");
        Ok(())
    }

    /// Upload the artifact, retrying transport failures.
    ///
    /// Returns the response body, or `None` when the service answered
    /// with a non-success status (an answered request is not retried).
    async fn upload_with_retries(&self, artifact: &Path, year: i32) -> Result<Option<String>> {
        let bytes = std::fs::read(artifact)?;
        let file_name = artifact
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "submission.csv".to_string());
        let url = format!("{}{}", self.config.base_url, self.config.submit_path);

        let mut attempt = 0usize;
        loop {
            let part = reqwest::multipart::Part::bytes(bytes.clone())
                .file_name(file_name.clone())
                .mime_str("text/csv")?;
            let form = reqwest::multipart::Form::new()
                .part("file", part)
                .text("year", year.to_string());

            match self.client.post(&url).multipart(form).send().await {
                Ok(response) => {
                    if !response.status().is_success() {
                        log::warn!(
                            "grader answered HTTP {} for {file_name}, recording as ungraded",
                            response.status()
                        );
                        return Ok(None);
                    }
                    return Ok(Some(response.text().await.map_err(GraderError::Network)?));
                }
                Err(err) => {
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        return Err(GraderError::RetriesExhausted {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    let backoff = self.config.call_delay * attempt as u32;
                    log::warn!("submit attempt {attempt} failed ({err}), retrying in {backoff:?}");
                    sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GraderConfig::default();
        assert_eq!(config.score_label, "score");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.call_delay, Duration::from_millis(300));
        assert!(config.username.is_none());
    }

    #[test]
    fn test_from_env_requires_url() {
        if std::env::var(URL_ENV).is_err() {
            assert!(matches!(
                GraderConfig::from_env(),
                Err(GraderError::MissingConfig(_))
            ));
        }
    }

    #[test]
    fn test_client_builds_offline() {
        let client = GraderClient::new(GraderConfig::default()).unwrap();
        assert_eq!(client.config().submit_path, "/submit");
    }
}
