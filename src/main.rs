use anyhow::Result;
use clap::Parser;
use tracing::error;

use unsubscan::utils::{setup_logging, validate_args};
use unsubscan::{analyze_mailbox, print_report, Args};

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);
    validate_args(&args)?;

    match analyze_mailbox(&args) {
        Ok(outcome) => print_report(&outcome, &args),
        Err(e) => {
            error!(action = "fail", component = "main", error = %format!("{e:#}"), "Analysis failed");
            std::process::exit(1);
        }
    }
}
