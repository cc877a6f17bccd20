//! Validated configuration built from the command line
//!
//! Validation happens here, before any remote service is contacted. It also
//! decides which publishing steps run: Pulp when a Pulp endpoint was given,
//! Quay when any Quay option was given, unless the matching `--skip-*` flag
//! is set.

use crate::cli::args::{AddBundlesArgs, Commands, CommonArgs, PulpArgs, QuayArgs};
use crate::error::{IibPushError, Result};
use crate::iib::client::DEFAULT_BUILD_TIMEOUT_SECS;
use crate::iib::{BuildRequest, KerberosAuth, Operation};
use crate::image::has_tag_or_digest;
use crate::logging::Logger;
use crate::push::CollectorKind;
use std::path::PathBuf;
use std::time::Duration;

/// IIB connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IibConfig {
    pub server: String,
    pub auth: KerberosAuth,
    pub insecure: bool,
    pub build_timeout: Duration,
}

/// Pulp connection settings, only present when Pulp publishing is requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulpConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub insecure: bool,
    pub repository: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UmbConfig {
    pub urls: Vec<String>,
    pub cert: PathBuf,
    pub client_key: Option<PathBuf>,
    pub topic: Option<String>,
}

/// Quay tagging settings, only present when Quay publishing is requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuayConfig {
    pub dest_repo: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub remote: Option<SshConfig>,
    pub umb: Option<UmbConfig>,
}

/// Everything one run needs
#[derive(Debug, Clone, PartialEq)]
pub struct OperationConfig {
    pub request: BuildRequest,
    pub iib: IibConfig,
    /// Destination recorded on push items
    pub pulp_repository: String,
    pub pulp: Option<PulpConfig>,
    pub quay: Option<QuayConfig>,
    pub collector: CollectorKind,
    pub collector_dir: PathBuf,
    pub verbose: bool,
    pub quiet: bool,
}

impl OperationConfig {
    pub fn from_command(command: Commands) -> Result<Self> {
        match command {
            Commands::AddBundles(args) => {
                let request = add_bundles_request(&args);
                Self::from_common(request, args.common)
            }
            Commands::RemoveOperators(args) => {
                let common = &args.common.iib;
                let request = BuildRequest::remove_operators(
                    common.index_image.clone(),
                    args.operator.clone(),
                    common.arch.clone(),
                );
                let request = with_common_extras(request, &args.common);
                Self::from_common(request, args.common)
            }
        }
    }

    fn from_common(request: BuildRequest, common: CommonArgs) -> Result<Self> {
        let iib = &common.iib;
        let build_timeout = match iib.build_timeout {
            Some(0) => {
                return Err(IibPushError::Validation(
                    "'--build-timeout' must be greater than 0".to_string(),
                ));
            }
            Some(secs) => secs,
            None => DEFAULT_BUILD_TIMEOUT_SECS,
        };

        let pulp = if iib.skip_pulp {
            None
        } else {
            pulp_config(&common.pulp)?
        };
        let quay = if iib.skip_quay {
            None
        } else {
            quay_config(&common.quay)?
        };

        Ok(Self {
            request,
            iib: IibConfig {
                server: iib.iib_server.clone(),
                auth: KerberosAuth::new(iib.iib_krb_principal.clone(), iib.iib_krb_ktfile.clone()),
                insecure: iib.iib_insecure,
                build_timeout: Duration::from_secs(build_timeout),
            },
            pulp_repository: common.pulp.pulp_repository.clone(),
            pulp,
            quay,
            collector: common.push_collector,
            collector_dir: common.push_collector_dir,
            verbose: common.verbose,
            quiet: common.quiet,
        })
    }

    pub fn operation(&self) -> Operation {
        self.request.operation
    }

    pub fn logger(&self) -> Logger {
        if self.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(self.verbose)
        }
    }
}

fn add_bundles_request(args: &AddBundlesArgs) -> BuildRequest {
    let iib = &args.common.iib;
    // entries are sent exactly as given between the commas
    let deprecation_list = args
        .deprecation_list
        .as_deref()
        .filter(|list| !list.is_empty())
        .map(|list| list.split(',').map(str::to_string).collect::<Vec<_>>());

    let request = BuildRequest::add_bundles(iib.index_image.clone(), args.bundle.clone(), iib.arch.clone())
        .with_organization(args.iib_legacy_org.clone())
        .with_deprecation_list(deprecation_list)
        .with_check_related_images(args.check_related_images);
    with_common_extras(request, &args.common)
}

fn with_common_extras(request: BuildRequest, common: &CommonArgs) -> BuildRequest {
    let iib = &common.iib;
    request
        .with_binary_image(iib.binary_image.clone())
        .with_overwrite_from_index(iib.overwrite_from_index, iib.overwrite_from_index_token.clone())
        .with_build_tags(iib.build_tag.clone())
}

fn pulp_config(args: &PulpArgs) -> Result<Option<PulpConfig>> {
    if args.pulp_url.is_none() && args.pulp_user.is_none() {
        return Ok(None);
    }

    let required = |value: &Option<String>, flag: &str| {
        value.clone().filter(|v| !v.is_empty()).ok_or_else(|| {
            IibPushError::Validation(format!("If pushing to Pulp, '{}' must be specified", flag))
        })
    };

    Ok(Some(PulpConfig {
        url: required(&args.pulp_url, "--pulp-url")?,
        user: required(&args.pulp_user, "--pulp-user")?,
        password: required(&args.pulp_password, "--pulp-password")?,
        insecure: args.pulp_insecure,
        repository: args.pulp_repository.clone(),
    }))
}

fn quay_config(args: &QuayArgs) -> Result<Option<QuayConfig>> {
    let requested = args.quay_dest_repo.is_some()
        || args.quay_user.is_some()
        || args.quay_remote_exec
        || args.quay_send_umb_msg;
    if !requested {
        return Ok(None);
    }

    let dest_repo = args.quay_dest_repo.clone().ok_or_else(|| {
        IibPushError::Validation("If pushing to Quay, destination repo must be specified".to_string())
    })?;
    if has_tag_or_digest(&dest_repo) {
        return Err(IibPushError::Validation(
            "Quay destination repo contains a tag, which is not allowed".to_string(),
        ));
    }

    if args.quay_user.is_some() != args.quay_password.is_some() {
        return Err(IibPushError::Validation(
            "Both Quay user and password must be present when attempting to push to Quay".to_string(),
        ));
    }

    let remote = if args.quay_remote_exec {
        let host = args.quay_ssh_remote_host.clone().ok_or_else(|| {
            IibPushError::Validation("Remote host is missing when remote execution was requested".to_string())
        })?;
        Some(SshConfig {
            host,
            port: args.quay_ssh_remote_host_port,
            username: args.quay_ssh_username.clone(),
            password: args.quay_ssh_password.clone(),
        })
    } else {
        None
    };

    let umb = if args.quay_send_umb_msg {
        if args.quay_umb_url.is_empty() {
            return Err(IibPushError::Validation(
                "UMB URL must be specified if sending a UMB message was requested".to_string(),
            ));
        }
        let cert = args.quay_umb_cert.clone().ok_or_else(|| {
            IibPushError::Validation(
                "A path to a client certificate must be provided when sending a UMB message".to_string(),
            )
        })?;
        Some(UmbConfig {
            urls: args.quay_umb_url.clone(),
            cert,
            client_key: args.quay_umb_client_key.clone(),
            topic: args.quay_umb_topic.clone(),
        })
    } else {
        None
    };

    Ok(Some(QuayConfig {
        dest_repo,
        user: args.quay_user.clone(),
        password: args.quay_password.clone(),
        remote,
        umb,
    }))
}
