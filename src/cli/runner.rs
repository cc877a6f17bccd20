//! Orchestration of one add-bundles / remove-operators run

use crate::cli::config::OperationConfig;
use crate::common::{CommandRunner, RealCommandRunner};
use crate::error::{IibPushError, Result};
use crate::iib::{BuildDetails, BuildState, HttpIibClient, IibClient, Operation};
use crate::logging::Logger;
use crate::publish::{PulpPublisher, QuayTagger};
use crate::push::{PushCollector, PushItemState, push_items_from_build};
use std::sync::Arc;

pub struct Runner {
    config: OperationConfig,
    iib: Arc<dyn IibClient>,
    collector: Arc<dyn PushCollector>,
    commands: Arc<dyn CommandRunner>,
    logger: Logger,
}

impl Runner {
    pub fn new(
        config: OperationConfig,
        iib: Arc<dyn IibClient>,
        collector: Arc<dyn PushCollector>,
        commands: Arc<dyn CommandRunner>,
        logger: Logger,
    ) -> Self {
        Self {
            config,
            iib,
            collector,
            commands,
            logger,
        }
    }

    /// Wire up the real IIB client, collector and subprocess runner
    pub fn from_config(config: OperationConfig) -> Result<Self> {
        let logger = config.logger();
        let commands: Arc<dyn CommandRunner> = Arc::new(RealCommandRunner);
        let iib = HttpIibClient::builder(config.iib.server.clone())
            .with_auth(Some(config.iib.auth.clone()))
            .with_insecure(config.iib.insecure)
            .with_build_timeout(config.iib.build_timeout)
            .with_runner(commands.clone())
            .with_logger(logger.clone())
            .build()?;
        let collector = config.collector.create(&config.collector_dir, &logger);

        Ok(Self::new(config, Arc::new(iib), collector, commands, logger))
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Run the whole operation and return the final build on success.
    ///
    /// A failed build reports NOTPUSHED items and yields
    /// [`IibPushError::BuildFailed`].
    pub async fn run(&self) -> Result<BuildDetails> {
        let operation = self.config.operation();
        self.logger.section(&format!("IIB {}", operation));
        self.logger.info(&format!(
            "Request to rebuild {}",
            self.config.request.from_index.as_deref().unwrap_or("a new index")
        ));

        let build = match operation {
            Operation::AddBundles => self.iib.add_bundles(&self.config.request).await?,
            Operation::RemoveOperators => self.iib.remove_operators(&self.config.request).await?,
        };
        self.logger
            .info(&format!("IIB details: {}", self.iib.build_url(&build.id)));

        self.report(&build, PushItemState::Pending).await?;

        let build = self.iib.wait_for_build(&build).await?;
        if build.build_state() == BuildState::Failed {
            return Err(self.fail(&build).await);
        }
        self.logger.success("IIB build finished");

        if let Err(e) = self.publish(&build).await {
            self.logger.error(&format!("Publishing failed: {}", e));
            self.report(&build, PushItemState::NotPushed).await?;
            return Err(e);
        }

        let final_state = match operation {
            Operation::AddBundles => PushItemState::Pushed,
            Operation::RemoveOperators => PushItemState::Deleted,
        };
        self.report(&build, final_state).await?;
        self.logger.info("IIB push finished");

        self.logger.summary_kv(
            "Summary",
            &[
                ("Build", build.id.clone()),
                ("Index image", build.index_image.clone().unwrap_or_default()),
                ("Push items", format!("{:?}", final_state).to_uppercase()),
                ("Elapsed", self.logger.format_duration(self.logger.elapsed())),
            ],
        );
        Ok(build)
    }

    async fn report(&self, build: &BuildDetails, state: PushItemState) -> Result<()> {
        let items = push_items_from_build(build, state, &self.config.pulp_repository);
        self.logger.debug(&format!(
            "Updating {} push items to {:?}",
            items.len(),
            state
        ));
        self.collector.update_push_items(&items).await
    }

    /// Report the failure and turn it into the error the run ends with
    async fn fail(&self, build: &BuildDetails) -> IibPushError {
        self.logger.error("IIB operation failed");
        if let Err(e) = self.report(build, PushItemState::NotPushed).await {
            return e;
        }

        let reason = match self.iib.failure_report(&build.id).await {
            Ok(report) => {
                self.logger
                    .error(&format!("IIB Failed with the error: '{}'", report.reason));
                self.logger
                    .error(&format!("Please check the full logs at {}", report.logs_url));
                report.reason
            }
            Err(e) => {
                self.logger
                    .warning(&format!("Could not fetch the failure reason: {}", e));
                build
                    .state_reason
                    .clone()
                    .unwrap_or_else(|| "unknown reason".to_string())
            }
        };

        IibPushError::BuildFailed {
            id: build.id.clone(),
            reason,
        }
    }

    async fn publish(&self, build: &BuildDetails) -> Result<()> {
        match &self.config.pulp {
            Some(pulp) => {
                self.logger.subsection("Pulp");
                PulpPublisher::new(pulp, self.commands.as_ref(), &self.logger)?
                    .publish(build)
                    .await?;
            }
            None => self.logger.verbose("Skipping Pulp publishing"),
        }

        match &self.config.quay {
            Some(quay) => {
                self.logger.subsection("Quay");
                QuayTagger::new(quay, self.commands.as_ref(), &self.logger)
                    .publish(build)
                    .await?;
            }
            None => self.logger.verbose("Skipping Quay publishing"),
        }
        Ok(())
    }
}
