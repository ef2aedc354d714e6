use clap::Parser;
use std::path::PathBuf;

use crate::stats::{PriorityTier, SortKey};

#[derive(Parser, Debug)]
#[command(
    name = "unsubscan",
    about = "Scan exported mailbox messages for bulk senders and their unsubscribe links",
    version,
    long_about = None
)]
pub struct Args {
    /// Message JSON files (Graph pages or arrays), read in order
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Only scan messages received within the last N days
    #[arg(short, long)]
    pub days: Option<u32>,

    /// Maximum number of messages to scan
    #[arg(long, default_value_t = crate::source::MAX_MESSAGES)]
    pub max_messages: usize,

    /// Only show domains or subjects containing this text
    #[arg(short, long)]
    pub search: Option<String>,

    /// Only show domains with this priority
    #[arg(short, long, value_enum)]
    pub priority: Option<PriorityTier>,

    /// Sort order of the report
    #[arg(long, value_enum, default_value_t = SortKey::Count)]
    pub sort: SortKey,

    /// Number of domains to display
    #[arg(short, long)]
    pub top: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Redact domain names for privacy
    #[arg(long)]
    pub redact: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Extract links in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Number of worker threads (implies --parallel)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// SQLite database holding clicked-domain markers
    #[arg(long)]
    pub state_db: Option<PathBuf>,

    /// Mark a domain's link as clicked (requires --state-db)
    #[arg(long, requires = "state_db")]
    pub mark_clicked: Vec<String>,
}
