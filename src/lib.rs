pub mod args;
pub mod domain;
pub mod extractor;
pub mod mailbox;
pub mod message;
pub mod patterns;
pub mod scanner;
pub mod source;
pub mod stats;
pub mod store;
pub mod utils;

pub use args::Args;
pub use extractor::LinkExtractor;
pub use mailbox::{analyze_mailbox, print_report};
pub use message::{Header, Message};
pub use scanner::{DomainRecord, Progress, ScanEngine};
pub use stats::{DomainSummary, PriorityTier, Report, ReportFilter, ScanStats, SortKey};
