//! Quay publishing through `pubtools-quay-tag-image`

use crate::cli::config::QuayConfig;
use crate::common::{CommandOptions, CommandRunner};
use crate::error::{IibPushError, Result};
use crate::iib::BuildDetails;
use crate::image::ImageReference;
use crate::logging::Logger;

pub const QUAY_TAG_COMMAND: &str = "pubtools-quay-tag-image";

/// Copies the built index image to `<dest_repo>:<tag>`.
pub struct QuayTagger<'a> {
    config: &'a QuayConfig,
    runner: &'a dyn CommandRunner,
    logger: &'a Logger,
}

impl<'a> QuayTagger<'a> {
    pub fn new(config: &'a QuayConfig, runner: &'a dyn CommandRunner, logger: &'a Logger) -> Self {
        Self {
            config,
            runner,
            logger,
        }
    }

    pub async fn publish(&self, build: &BuildDetails) -> Result<()> {
        let (args, options) = tag_command(self.config, build)?;
        self.logger.info(&format!(
            "Tagging {} as {}",
            args[1], args[3]
        ));
        self.runner
            .run_checked(QUAY_TAG_COMMAND, &args, &options)
            .await?;
        Ok(())
    }
}

/// Arguments and environment for `pubtools-quay-tag-image`.
///
/// The source is the resolved index image when IIB reported one; the
/// destination tag is the tag of the built index image.
pub fn tag_command(config: &QuayConfig, build: &BuildDetails) -> Result<(Vec<String>, CommandOptions)> {
    let source = build.source_image().ok_or_else(|| {
        IibPushError::Quay(format!("Build {} has no index image to tag", build.id))
    })?;
    let index_image = build.index_image.as_deref().unwrap_or(source);
    let tag = ImageReference::parse(index_image)?
        .tag
        .ok_or_else(|| IibPushError::Quay(format!("Index image '{}' has no tag", index_image)))?;

    let mut args = vec![
        "--source-ref".to_string(),
        source.to_string(),
        "--dest-ref".to_string(),
        format!("{}:{}", config.dest_repo, tag),
    ];
    let mut options = CommandOptions::default();

    if let Some(user) = &config.user {
        args.push("--quay-user".to_string());
        args.push(user.clone());
    }
    if let Some(password) = &config.password {
        options = options.with_env("QUAY_PASSWORD", password.clone());
    }

    if let Some(ssh) = &config.remote {
        args.push("--remote-exec".to_string());
        args.push("--ssh-remote-host".to_string());
        args.push(ssh.host.clone());
        if let Some(port) = ssh.port {
            args.push("--ssh-remote-host-port".to_string());
            args.push(port.to_string());
        }
        if let Some(username) = &ssh.username {
            args.push("--ssh-username".to_string());
            args.push(username.clone());
        }
        if let Some(password) = &ssh.password {
            options = options.with_env("SSH_PASSWORD", password.clone());
        }
    }

    if let Some(umb) = &config.umb {
        args.push("--send-umb-msg".to_string());
        for url in &umb.urls {
            args.push("--umb-url".to_string());
            args.push(url.clone());
        }
        args.push("--umb-cert".to_string());
        args.push(umb.cert.display().to_string());
        if let Some(key) = &umb.client_key {
            args.push("--umb-client-key".to_string());
            args.push(key.display().to_string());
        }
        if let Some(topic) = &umb.topic {
            args.push("--umb-topic".to_string());
            args.push(topic.clone());
        }
    }

    Ok((args, options))
}
