//! Pulp publishing: sync the container repository from the built index
//! image, then publish it with `pubtools-pulp-publish`.

use crate::cli::config::PulpConfig;
use crate::common::{CommandOptions, CommandRunner};
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{IibPushError, Result};
use crate::iib::BuildDetails;
use crate::image::ImageReference;
use crate::logging::Logger;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const PULP_PUBLISH_COMMAND: &str = "pubtools-pulp-publish";

const TASK_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Override config for a docker repository sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSyncOptions {
    pub feed: String,
    pub upstream_name: String,
    pub tags: Vec<String>,
}

impl ContainerSyncOptions {
    /// Sync options pulling exactly the tag of `image` from its registry
    pub fn for_image(image: &ImageReference) -> Self {
        Self {
            feed: image.feed_url(),
            upstream_name: image.repository.clone(),
            tags: vec![image.tag_or_latest().to_string()],
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpawnedTask {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct CallReport {
    #[serde(default)]
    spawned_tasks: Vec<SpawnedTask>,
}

#[derive(Debug, Deserialize)]
struct TaskStatus {
    state: String,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Minimal client for the Pulp 2 REST API
pub struct PulpClient {
    client: Client,
    base_url: String,
    user: String,
    password: String,
}

impl PulpClient {
    pub fn new(config: &PulpConfig) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "Pulp client setup"))?;

        let url = config.url.trim_end_matches('/');
        let base_url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{}", url)
        };
        url::Url::parse(&base_url)?;

        Ok(Self {
            client,
            base_url,
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/pulp/api/v2/{}", self.base_url, path)
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HttpErrorHandler::handle_pulp_error(status, &text, operation));
        }
        Ok(response.json().await?)
    }

    pub async fn get_repository(&self, repo_id: &str) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(self.api_url(&format!("repositories/{}/", repo_id)))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "Pulp repository lookup"))?;
        Self::read_json(response, &format!("get repository {}", repo_id)).await
    }

    /// Start a sync and return the ids of the spawned tasks
    pub async fn sync_repository(&self, repo_id: &str, options: &ContainerSyncOptions) -> Result<Vec<String>> {
        let body = serde_json::json!({ "override_config": options });
        let response = self
            .client
            .post(self.api_url(&format!("repositories/{}/actions/sync/", repo_id)))
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "Pulp sync request"))?;
        let report: CallReport = Self::read_json(response, &format!("sync repository {}", repo_id)).await?;
        Ok(report.spawned_tasks.into_iter().map(|t| t.task_id).collect())
    }

    /// Wait for every task to finish; `error` and `canceled` fail the sync
    pub async fn wait_for_tasks(&self, task_ids: &[String], logger: &Logger) -> Result<()> {
        for task_id in task_ids {
            loop {
                let response = self
                    .client
                    .get(self.api_url(&format!("tasks/{}/", task_id)))
                    .basic_auth(&self.user, Some(&self.password))
                    .send()
                    .await
                    .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "Pulp task query"))?;
                let task: TaskStatus = Self::read_json(response, &format!("get task {}", task_id)).await?;

                match task.state.as_str() {
                    "finished" | "skipped" => break,
                    "error" | "canceled" => {
                        let detail = task
                            .error
                            .as_ref()
                            .and_then(|e| e.get("description"))
                            .and_then(|d| d.as_str())
                            .unwrap_or("no details");
                        return Err(IibPushError::Pulp(format!(
                            "Task {} {}: {}",
                            task_id, task.state, detail
                        )));
                    }
                    state => {
                        logger.detail(&format!("Pulp task {} is {}", task_id, state));
                        tokio::time::sleep(TASK_POLL_INTERVAL).await;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Arguments and environment for `pubtools-pulp-publish`
pub fn publish_command(config: &PulpConfig) -> (Vec<String>, CommandOptions) {
    let mut args = vec![
        "--pulp-url".to_string(),
        config.url.clone(),
        "--pulp-user".to_string(),
        config.user.clone(),
        "--repo-ids".to_string(),
        config.repository.clone(),
    ];
    if config.insecure {
        args.push("--pulp-insecure".to_string());
    }
    let options = CommandOptions::default().with_env("PULP_PASSWORD", config.password.clone());
    (args, options)
}

/// Sync + publish of the index image repository
pub struct PulpPublisher<'a> {
    config: &'a PulpConfig,
    client: PulpClient,
    runner: &'a dyn CommandRunner,
    logger: &'a Logger,
}

impl<'a> PulpPublisher<'a> {
    pub fn new(config: &'a PulpConfig, runner: &'a dyn CommandRunner, logger: &'a Logger) -> Result<Self> {
        Ok(Self {
            config,
            client: PulpClient::new(config)?,
            runner,
            logger,
        })
    }

    pub async fn publish(&self, build: &BuildDetails) -> Result<()> {
        let index_image = build.index_image.as_deref().ok_or_else(|| {
            IibPushError::Pulp(format!("Build {} has no index image to sync", build.id))
        })?;
        let image = ImageReference::parse(index_image)?;
        let repository = &self.config.repository;

        self.logger.debug(&format!("Getting pulp repository: {}", repository));
        self.client.get_repository(repository).await?;

        self.logger
            .info(&format!("Syncing pulp repository with {}", index_image));
        let tasks = self
            .client
            .sync_repository(repository, &ContainerSyncOptions::for_image(&image))
            .await?;
        self.client.wait_for_tasks(&tasks, self.logger).await?;

        self.logger
            .info(&format!("Publishing repository {}", repository));
        let (args, options) = publish_command(self.config);
        self.runner
            .run_checked(PULP_PUBLISH_COMMAND, &args, &options)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn config(url: String) -> PulpConfig {
        PulpConfig {
            url,
            user: "pulp-user".into(),
            password: "pulp-password".into(),
            insecure: true,
            repository: "redhat-operator-index".into(),
        }
    }

    #[test]
    fn test_sync_options_for_image() {
        let image = ImageReference::parse("feed.com/index/image:tag").unwrap();
        assert_eq!(
            serde_json::to_value(ContainerSyncOptions::for_image(&image)).unwrap(),
            json!({"feed": "https://feed.com", "upstream_name": "index/image", "tags": ["tag"]})
        );
    }

    #[test]
    fn test_publish_command() {
        let (args, options) = publish_command(&config("https://pulp".into()));
        assert_eq!(
            args,
            [
                "--pulp-url",
                "https://pulp",
                "--pulp-user",
                "pulp-user",
                "--repo-ids",
                "redhat-operator-index",
                "--pulp-insecure"
            ]
        );
        assert_eq!(
            options.env,
            vec![("PULP_PASSWORD".to_string(), "pulp-password".to_string())]
        );
    }

    #[tokio::test]
    async fn test_sync_and_wait() {
        let mut server = Server::new_async().await;
        let sync = server
            .mock("POST", "/pulp/api/v2/repositories/redhat-operator-index/actions/sync/")
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .match_body(Matcher::Json(json!({
                "override_config": {
                    "feed": "https://feed.com",
                    "upstream_name": "index/image",
                    "tags": ["tag"]
                }
            })))
            .with_status(202)
            .with_body(r#"{"spawned_tasks": [{"task_id": "t1", "_href": "/pulp/api/v2/tasks/t1/"}]}"#)
            .create_async()
            .await;
        let task = server
            .mock("GET", "/pulp/api/v2/tasks/t1/")
            .with_body(r#"{"state": "finished"}"#)
            .create_async()
            .await;

        let client = PulpClient::new(&config(server.url())).unwrap();
        let image = ImageReference::parse("feed.com/index/image:tag").unwrap();
        let tasks = client
            .sync_repository("redhat-operator-index", &ContainerSyncOptions::for_image(&image))
            .await
            .unwrap();
        assert_eq!(tasks, vec!["t1"]);
        client.wait_for_tasks(&tasks, &Logger::new_quiet()).await.unwrap();

        sync.assert_async().await;
        task.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_task_is_reported() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/pulp/api/v2/tasks/t1/")
            .with_body(r#"{"state": "error", "error": {"description": "feed unreachable"}}"#)
            .create_async()
            .await;

        let client = PulpClient::new(&config(server.url())).unwrap();
        let err = client
            .wait_for_tasks(&["t1".to_string()], &Logger::new_quiet())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Pulp error: Task t1 error: feed unreachable");
    }

    #[tokio::test]
    async fn test_missing_repository() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/pulp/api/v2/repositories/nope/")
            .with_status(404)
            .with_body(r#"{"error_message": "Missing resource(s): repository=nope"}"#)
            .create_async()
            .await;

        let client = PulpClient::new(&config(server.url())).unwrap();
        let err = client.get_repository("nope").await.unwrap_err();
        assert!(matches!(err, IibPushError::Pulp(_)));
    }
}
