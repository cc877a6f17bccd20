//! iib-push - rebuild operator index images with IIB and publish them

use clap::Parser;
use iib_push::cli::{Cli, OperationConfig, Runner};
use iib_push::logging::Logger;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let command = cli.command.resolve_env(|name| std::env::var(name).ok());
    let common = command.common();
    let fallback_logger = if common.quiet {
        Logger::new_quiet()
    } else {
        Logger::new(common.verbose)
    };

    let config = match OperationConfig::from_command(command) {
        Ok(config) => config,
        Err(e) => {
            fallback_logger.error(&e.to_string());
            std::process::exit(e.exit_code());
        }
    };

    let runner = match Runner::from_config(config) {
        Ok(runner) => runner,
        Err(e) => {
            fallback_logger.error(&e.to_string());
            std::process::exit(e.exit_code());
        }
    };

    if let Err(e) = runner.run().await {
        runner.logger().error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}
