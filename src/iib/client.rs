// Client for the IIB REST API: submitting add/rm builds, fetching build
// state and waiting for a build to reach a terminal state.

use crate::common::{CommandRunner, RealCommandRunner};
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{IibPushError, Result};
use crate::iib::auth::KerberosAuth;
use crate::iib::models::{BuildDetails, BuildRequest, FailureReport, Operation};
use crate::logging::Logger;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 7200;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

#[async_trait]
pub trait IibClient: Send + Sync {
    async fn add_bundles(&self, request: &BuildRequest) -> Result<BuildDetails>;

    async fn remove_operators(&self, request: &BuildRequest) -> Result<BuildDetails>;

    async fn get_build(&self, id: &str) -> Result<BuildDetails>;

    /// Poll until the build is `finished` or `failed`.
    async fn wait_for_build(&self, build: &BuildDetails) -> Result<BuildDetails>;

    /// Human-facing page for a build
    fn build_url(&self, id: &str) -> String;

    /// Fetch the current failure reason of a build
    async fn failure_report(&self, id: &str) -> Result<FailureReport> {
        let build = self.get_build(id).await?;
        let url = self.build_url(id);
        Ok(FailureReport {
            reason: build
                .state_reason
                .unwrap_or_else(|| "unknown reason".to_string()),
            logs_url: format!("{}/logs", url),
        })
    }
}

/// Polling policy for [`IibClient::wait_for_build`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildWaiter {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for BuildWaiter {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_BUILD_TIMEOUT_SECS),
        }
    }
}

impl BuildWaiter {
    pub async fn wait<C>(&self, client: &C, build: &BuildDetails, logger: &Logger) -> Result<BuildDetails>
    where
        C: IibClient + ?Sized,
    {
        let started = Instant::now();
        let mut current = build.clone();
        loop {
            if current.build_state().is_terminal() {
                return Ok(current);
            }
            if started.elapsed() >= self.timeout {
                return Err(IibPushError::BuildTimeout {
                    id: current.id,
                    seconds: self.timeout.as_secs(),
                });
            }
            logger.detail(&format!(
                "Build {} is {}, checking again in {}s",
                current.id,
                current.state,
                self.poll_interval.as_secs()
            ));
            tokio::time::sleep(self.poll_interval).await;
            current = client.get_build(&current.id).await?;
        }
    }
}

pub struct IibClientBuilder {
    server: String,
    auth: Option<KerberosAuth>,
    insecure: bool,
    waiter: BuildWaiter,
    runner: Arc<dyn CommandRunner>,
    logger: Logger,
}

impl IibClientBuilder {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            auth: None,
            insecure: false,
            waiter: BuildWaiter::default(),
            runner: Arc::new(RealCommandRunner),
            logger: Logger::default(),
        }
    }

    pub fn with_auth(mut self, auth: Option<KerberosAuth>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_build_timeout(mut self, timeout: Duration) -> Self {
        self.waiter.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.waiter.poll_interval = interval;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn build(self) -> Result<HttpIibClient> {
        let client = Client::builder()
            .danger_accept_invalid_certs(self.insecure)
            .build()
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "IIB client setup"))?;
        let base_url = base_url(&self.server);
        url::Url::parse(&base_url)?;

        Ok(HttpIibClient {
            client,
            base_url,
            auth: self.auth,
            insecure: self.insecure,
            waiter: self.waiter,
            runner: self.runner,
            logger: self.logger,
        })
    }
}

/// `iib.example.com` becomes `https://iib.example.com`; explicit schemes are kept.
fn base_url(server: &str) -> String {
    let server = server.trim_end_matches('/');
    if server.starts_with("http://") || server.starts_with("https://") {
        server.to_string()
    } else {
        format!("https://{}", server)
    }
}

pub struct HttpIibClient {
    client: Client,
    base_url: String,
    auth: Option<KerberosAuth>,
    insecure: bool,
    waiter: BuildWaiter,
    runner: Arc<dyn CommandRunner>,
    logger: Logger,
}

impl HttpIibClient {
    pub fn builder(server: impl Into<String>) -> IibClientBuilder {
        IibClientBuilder::new(server)
    }

    async fn submit(&self, request: &BuildRequest, expected: Operation) -> Result<BuildDetails> {
        if request.operation != expected {
            return Err(IibPushError::Validation(format!(
                "Cannot send a {} request as {}",
                request.operation, expected
            )));
        }

        let url = format!("{}/api/v1/builds/{}", self.base_url, expected.endpoint());
        let body = serde_json::to_vec(request)?;
        self.logger.debug(&format!("POST {}", url));

        let (status, text) = match &self.auth {
            Some(auth) => {
                auth.ensure_ticket(self.runner.as_ref(), &self.logger).await?;
                auth.negotiate_post(self.runner.as_ref(), &url, &body, self.insecure)
                    .await?
            }
            None => {
                let response = self
                    .client
                    .post(&url)
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body)
                    .send()
                    .await
                    .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "IIB build request"))?;
                let status = response.status();
                (status, response.text().await?)
            }
        };

        if !status.is_success() {
            return Err(HttpErrorHandler::handle_iib_error(
                status,
                &text,
                &expected.to_string(),
            ));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl IibClient for HttpIibClient {
    async fn add_bundles(&self, request: &BuildRequest) -> Result<BuildDetails> {
        self.submit(request, Operation::AddBundles).await
    }

    async fn remove_operators(&self, request: &BuildRequest) -> Result<BuildDetails> {
        self.submit(request, Operation::RemoveOperators).await
    }

    async fn get_build(&self, id: &str) -> Result<BuildDetails> {
        let url = self.build_url(id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "IIB build query"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HttpErrorHandler::handle_iib_error(
                status,
                &text,
                &format!("get build {}", id),
            ));
        }
        Ok(response.json().await?)
    }

    async fn wait_for_build(&self, build: &BuildDetails) -> Result<BuildDetails> {
        self.waiter.wait(self, build, &self.logger).await
    }

    fn build_url(&self, id: &str) -> String {
        format!("{}/api/v1/builds/{}", self.base_url, id)
    }
}
