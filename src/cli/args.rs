//! Command-line argument parsing

use crate::push::CollectorKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "iib-push")]
#[command(about = "Rebuild operator index images with IIB and publish them to Pulp and Quay")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add bundles to an index image
    AddBundles(AddBundlesArgs),
    /// Remove operators from an index image
    RemoveOperators(RemoveOperatorsArgs),
}

impl Commands {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Commands::AddBundles(args) => &args.common,
            Commands::RemoveOperators(args) => &args.common,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddBundlesArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(
        long = "bundle",
        required = true,
        help_heading = "IIB service",
        help = "<hostname>/<namespace>/<image>:<tag> of bundle (repeatable)"
    )]
    pub bundle: Vec<String>,

    #[arg(
        long = "deprecation-list",
        help_heading = "IIB service",
        help = "Comma separated list of bundles to deprecate"
    )]
    pub deprecation_list: Option<String>,

    #[arg(
        long = "check-related-images",
        help_heading = "IIB service",
        help = "Ask IIB to verify that related images of the bundles exist"
    )]
    pub check_related_images: bool,

    #[arg(
        long = "iib-legacy-org",
        help_heading = "IIB service",
        help = "Organization for legacy registry"
    )]
    pub iib_legacy_org: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RemoveOperatorsArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(
        long = "operator",
        required = true,
        help_heading = "IIB service",
        help = "operator name (repeatable)"
    )]
    pub operator: Vec<String>,
}

/// Flags shared by both subcommands
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[command(flatten)]
    pub iib: IibArgs,

    #[command(flatten)]
    pub pulp: PulpArgs,

    #[command(flatten)]
    pub quay: QuayArgs,

    #[arg(
        long = "push-collector",
        value_enum,
        default_value_t = CollectorKind::Dummy,
        help = "Backend receiving push item updates"
    )]
    pub push_collector: CollectorKind,

    #[arg(
        long = "push-collector-dir",
        default_value = ".pushcollector",
        help = "Directory used by the local push collector"
    )]
    pub push_collector_dir: PathBuf,

    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long = "quiet", short = 'q', conflicts_with = "verbose", help = "Only print errors")]
    pub quiet: bool,
}

#[derive(Args, Debug, Clone)]
#[command(next_help_heading = "IIB service")]
pub struct IibArgs {
    #[arg(long = "iib-server", required = true, help = "IIB service hostname")]
    pub iib_server: String,

    #[arg(
        long = "iib-krb-principal",
        required = true,
        help = "IIB kerberos principal in form: name@REALM"
    )]
    pub iib_krb_principal: String,

    #[arg(long = "iib-krb-ktfile", help = "IIB kerberos client keytab")]
    pub iib_krb_ktfile: Option<PathBuf>,

    #[arg(long = "iib-insecure", help = "Allow unverified HTTPS connection to IIB")]
    pub iib_insecure: bool,

    #[arg(
        long = "index-image",
        help = "<hostname>/<namespace>/<image>:<tag> of index image to rebuild"
    )]
    pub index_image: Option<String>,

    #[arg(
        long = "binary-image",
        help = "<hostname>/<namespace>/<image>:<tag> of binary image"
    )]
    pub binary_image: Option<String>,

    #[arg(long = "arch", help = "architecture to rebuild (repeatable)")]
    pub arch: Vec<String>,

    #[arg(long = "overwrite-from-index", help = "overwrite from_index_image as output")]
    pub overwrite_from_index: bool,

    #[arg(
        long = "overwrite-from-index-token",
        help = "Token used to overwrite the index image (or set OVERWRITE_FROM_INDEX_TOKEN)"
    )]
    pub overwrite_from_index_token: Option<String>,

    #[arg(long = "build-tag", help = "extra tag applied to the built index image (repeatable)")]
    pub build_tag: Vec<String>,

    #[arg(
        long = "build-timeout",
        help = "Seconds to wait for the IIB build before giving up (default 7200)"
    )]
    pub build_timeout: Option<u64>,

    #[arg(long = "skip-pulp", help = "Skip operations on Pulp")]
    pub skip_pulp: bool,

    #[arg(long = "skip-quay", help = "Skip operations on Quay")]
    pub skip_quay: bool,
}

#[derive(Args, Debug, Clone)]
#[command(next_help_heading = "Pulp environment")]
pub struct PulpArgs {
    #[arg(long = "pulp-url", help = "Pulp server URL")]
    pub pulp_url: Option<String>,

    #[arg(long = "pulp-user", help = "Pulp username")]
    pub pulp_user: Option<String>,

    #[arg(
        long = "pulp-password",
        help = "Pulp password (or set PULP_PASSWORD environment variable)"
    )]
    pub pulp_password: Option<String>,

    #[arg(long = "pulp-insecure", help = "Allow unverified HTTPS connection to Pulp")]
    pub pulp_insecure: bool,

    #[arg(
        long = "pulp-repository",
        default_value = "redhat-operator-index",
        help = "Pulp repository for publishing index image"
    )]
    pub pulp_repository: String,
}

#[derive(Args, Debug, Clone)]
#[command(next_help_heading = "Quay environment")]
pub struct QuayArgs {
    #[arg(
        long = "quay-dest-repo",
        help = "Quay repository the index image is tagged into, without a tag"
    )]
    pub quay_dest_repo: Option<String>,

    #[arg(long = "quay-user", help = "Quay username")]
    pub quay_user: Option<String>,

    #[arg(
        long = "quay-password",
        help = "Quay password (or set QUAY_PASSWORD environment variable)"
    )]
    pub quay_password: Option<String>,

    #[arg(long = "quay-remote-exec", help = "Run the tagging on a remote host over SSH")]
    pub quay_remote_exec: bool,

    #[arg(long = "quay-ssh-remote-host", help = "Remote host for tagging")]
    pub quay_ssh_remote_host: Option<String>,

    #[arg(long = "quay-ssh-remote-host-port", help = "SSH port of the remote host")]
    pub quay_ssh_remote_host_port: Option<u16>,

    #[arg(long = "quay-ssh-username", help = "SSH username for the remote host")]
    pub quay_ssh_username: Option<String>,

    #[arg(
        long = "quay-ssh-password",
        help = "SSH password for the remote host (or set SSH_PASSWORD environment variable)"
    )]
    pub quay_ssh_password: Option<String>,

    #[arg(long = "quay-send-umb-msg", help = "Send a UMB message after tagging")]
    pub quay_send_umb_msg: bool,

    #[arg(long = "quay-umb-url", help = "UMB broker URL (repeatable)")]
    pub quay_umb_url: Vec<String>,

    #[arg(long = "quay-umb-cert", help = "Path to the UMB client certificate")]
    pub quay_umb_cert: Option<PathBuf>,

    #[arg(long = "quay-umb-client-key", help = "Path to the UMB client key")]
    pub quay_umb_client_key: Option<PathBuf>,

    #[arg(long = "quay-umb-topic", help = "UMB topic for the tagging message")]
    pub quay_umb_topic: Option<String>,
}

impl CommonArgs {
    /// Fill secrets left unset on the command line through `lookup`.
    ///
    /// An empty value, given as a flag or in the environment, counts as unset.
    pub fn resolve_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |flag: Option<String>, name: &str| {
            flag.filter(|value| !value.is_empty())
                .or_else(|| lookup(name).filter(|value| !value.is_empty()))
        };

        self.pulp.pulp_password = resolve(self.pulp.pulp_password.take(), "PULP_PASSWORD");
        self.iib.overwrite_from_index_token = resolve(
            self.iib.overwrite_from_index_token.take(),
            "OVERWRITE_FROM_INDEX_TOKEN",
        );
        self.quay.quay_password = resolve(self.quay.quay_password.take(), "QUAY_PASSWORD");
        self.quay.quay_ssh_password = resolve(self.quay.quay_ssh_password.take(), "SSH_PASSWORD");

        self
    }
}

impl Commands {
    /// Apply the environment fallback to the shared flags
    pub fn resolve_env<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            Commands::AddBundles(mut args) => {
                args.common = args.common.resolve_env(lookup);
                Commands::AddBundles(args)
            }
            Commands::RemoveOperators(mut args) => {
                args.common = args.common.resolve_env(lookup);
                Commands::RemoveOperators(args)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::collections::HashMap;

    const REQUIRED: &[&str] = &[
        "iib-push",
        "add-bundles",
        "--iib-server",
        "some-server.com",
        "--iib-krb-principal",
        "some-name",
    ];

    fn parse(extra: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(REQUIRED.iter().chain(extra.iter()).copied())
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_add_bundles_parsing() {
        let cli = parse(&[
            "--bundle",
            "b1",
            "--bundle",
            "b2",
            "--arch",
            "amd64",
            "--build-tag",
            "t1",
            "--skip-pulp",
            "--skip-quay",
        ])
        .unwrap();
        let Commands::AddBundles(args) = cli.command else {
            panic!("expected add-bundles");
        };
        assert_eq!(args.bundle, vec!["b1", "b2"]);
        assert_eq!(args.common.iib.arch, vec!["amd64"]);
        assert_eq!(args.common.iib.build_tag, vec!["t1"]);
        assert!(args.common.iib.skip_pulp);
        assert!(args.common.iib.skip_quay);
        assert_eq!(args.common.pulp.pulp_repository, "redhat-operator-index");
        assert_eq!(args.common.push_collector, CollectorKind::Dummy);
    }

    #[test]
    fn test_missing_operator_is_usage_error() {
        let err = Cli::try_parse_from([
            "iib-push",
            "remove-operators",
            "--iib-server",
            "some-server.com",
            "--iib-krb-principal",
            "some-name",
        ])
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_umb_urls_are_collected() {
        let cli = parse(&[
            "--bundle",
            "b1",
            "--quay-umb-url",
            "some-umb-url:5555",
            "--quay-umb-url",
            "other:5555",
        ])
        .unwrap();
        assert_eq!(
            cli.command.common().quay.quay_umb_url,
            vec!["some-umb-url:5555", "other:5555"]
        );
    }

    #[test]
    fn test_env_fallback_fills_missing_values() {
        let env: HashMap<&str, &str> = [
            ("PULP_PASSWORD", "pulp-secret"),
            ("OVERWRITE_FROM_INDEX_TOKEN", "overwrite_from_index_token"),
            ("QUAY_PASSWORD", "quay-secret"),
            ("SSH_PASSWORD", ""),
        ]
        .into_iter()
        .collect();
        let cli = parse(&["--bundle", "b1"]).unwrap();

        let command = cli
            .command
            .resolve_env(|name| env.get(name).map(|v| v.to_string()));
        let common = command.common();

        assert_eq!(common.pulp.pulp_password.as_deref(), Some("pulp-secret"));
        assert_eq!(
            common.iib.overwrite_from_index_token.as_deref(),
            Some("overwrite_from_index_token")
        );
        assert_eq!(common.quay.quay_password.as_deref(), Some("quay-secret"));
        assert_eq!(common.quay.quay_ssh_password, None);
    }

    #[test]
    fn test_explicit_flag_wins_over_env() {
        let cli = parse(&["--bundle", "b1", "--pulp-password", "from-flag"]).unwrap();
        let command = cli
            .command
            .resolve_env(|_| Some("from-env".to_string()));
        assert_eq!(
            command.common().pulp.pulp_password.as_deref(),
            Some("from-flag")
        );
    }

    #[test]
    fn test_empty_flag_falls_back_to_env() {
        let cli = parse(&["--bundle", "b1", "--pulp-password", "", "--quay-password", ""]).unwrap();
        let command = cli.command.resolve_env(|name| match name {
            "PULP_PASSWORD" => Some("env-secret".to_string()),
            _ => None,
        });
        let common = command.common();
        assert_eq!(common.pulp.pulp_password.as_deref(), Some("env-secret"));
        assert_eq!(common.quay.quay_password, None);
    }
}
