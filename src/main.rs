//! `jar-modularizer` entry point.
//!
//! Exit codes: 0 when every archive was modularized, 1 when some archives
//! failed, 2 when the run could not complete.

use clap::Parser;
use std::process::ExitCode;
use std::time::Instant;
use tracing::error;

use jar_modularizer::cli::{render_summary, Cli, RunStatus};
use jar_modularizer::logger::init_logger;
use jar_modularizer::Modularizer;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    init_logger(args.verbose, args.quiet, args.no_color);

    if let Err(e) = args.validate() {
        error!("{e}");
        return ExitCode::from(RunStatus::Fatal.exit_code());
    }

    let start = Instant::now();
    let mut modularizer = Modularizer::new(args.config(), args.compiler());
    let status = match modularizer.run().await {
        Ok(summary) if summary.is_success() => RunStatus::Successful,
        Ok(_) => RunStatus::PartialFailure,
        Err(e) => {
            error!("{e}");
            RunStatus::Fatal
        }
    };

    print!(
        "{}",
        render_summary(
            status,
            modularizer.modularized(),
            modularizer.errors(),
            modularizer.skipped(),
            start.elapsed(),
        )
    );
    ExitCode::from(status.exit_code())
}
