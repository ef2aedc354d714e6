use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info};

use crate::extractor::LinkExtractor;
use crate::scanner::ScanEngine;
use crate::source::{self, MessageQuery};
use crate::stats::{self, DomainSummary, Report, ReportFilter, ScanStats};
use crate::store::ClickStore;
use crate::utils::{format_number, redact_domain, truncate};
use crate::Args;

#[derive(Debug)]
pub struct ScanOutcome {
    pub report: Report,
    pub clicked: HashSet<String>,
}

pub fn analyze_mailbox(args: &Args) -> Result<ScanOutcome> {
    let total_start_time = Instant::now();
    info!(action = "start", component = "mailbox_scan", "Starting mailbox analysis");

    let query = MessageQuery {
        max_messages: args.max_messages,
        ..args.days.map(MessageQuery::days_back).unwrap_or_default()
    };
    let messages = source::load_messages(&args.inputs, &query)?;

    let extractor = LinkExtractor::new().context("Failed to compile detection patterns")?;
    let mut engine = ScanEngine::new(extractor);
    if let Some(workers) = worker_count(args) {
        info!(action = "configure", component = "mailbox_scan", worker_count = workers, "Using workers for extraction");
        engine = engine.with_workers(workers);
    }

    let mut last_decile = 0;
    let report = engine.scan_with_progress(&messages, |progress| {
        let decile = (progress.percent / 10.0) as u32;
        if decile > last_decile {
            last_decile = decile;
            debug!(
                action = "progress",
                component = "mailbox_scan",
                processed = progress.processed,
                total = progress.total,
                percent = progress.percent,
                "Scan progress"
            );
        }
    });

    let clicked = match &args.state_db {
        Some(path) => {
            let store = ClickStore::open(path)?;
            for domain in &args.mark_clicked {
                store.mark_clicked(domain)?;
            }
            store.clicked_domains()?
        }
        None => HashSet::new(),
    };

    info!(
        action = "complete",
        component = "mailbox_scan",
        duration_ms = total_start_time.elapsed().as_millis(),
        "Analysis completed successfully"
    );

    Ok(ScanOutcome { report, clicked })
}

fn worker_count(args: &Args) -> Option<usize> {
    match args.workers {
        Some(workers) => Some(workers),
        None if args.parallel => Some(std::cmp::min(num_cpus::get(), 8)),
        None => None,
    }
}

fn report_view<'a>(outcome: &'a ScanOutcome, args: &Args) -> Vec<&'a DomainSummary> {
    let filter = ReportFilter {
        search: args.search.clone(),
        priority: args.priority,
    };
    let mut view = outcome.report.filter(&filter);
    stats::sort_domains(&mut view, args.sort);
    if let Some(top) = args.top {
        view.truncate(top);
    }
    view
}

#[derive(Serialize)]
struct JsonRow<'a> {
    #[serde(flatten)]
    summary: &'a DomainSummary,
    clicked: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    domains: Vec<JsonRow<'a>>,
    stats: &'a ScanStats,
}

pub fn render_json(outcome: &ScanOutcome, args: &Args) -> Result<String> {
    let domains = report_view(outcome, args)
        .into_iter()
        .map(|summary| JsonRow {
            summary,
            clicked: outcome.clicked.contains(&summary.domain),
        })
        .collect();

    let report = JsonReport {
        domains,
        stats: &outcome.report.stats,
    };
    serde_json::to_string_pretty(&report).context("Failed to serialize report")
}

pub fn print_report(outcome: &ScanOutcome, args: &Args) -> Result<()> {
    if args.json {
        println!("{}", render_json(outcome, args)?);
        return Ok(());
    }

    let stats = &outcome.report.stats;
    println!("\n--- Mailbox Unsubscribe Report ---");
    println!("Emails scanned: {}", format_number(stats.total_messages));
    println!("Unique sender domains: {}", format_number(stats.unique_domains));
    println!(
        "Domains with unsubscribe link: {}",
        format_number(stats.domains_with_link)
    );
    println!(
        "Priority: {} high, {} medium, {} low",
        format_number(stats.high_priority),
        format_number(stats.medium_priority),
        format_number(stats.low_priority)
    );

    let view = report_view(outcome, args);
    if view.is_empty() {
        println!("\nNo matching domains.");
        return Ok(());
    }

    println!();
    for summary in view {
        let display_domain = if args.redact {
            redact_domain(&summary.domain)
        } else {
            summary.domain.clone()
        };
        let marker = if outcome.clicked.contains(&summary.domain) {
            "x"
        } else {
            " "
        };
        let one_click = if summary.one_click { " (one-click)" } else { "" };

        println!(
            "[{}] {:<6} {}: {} emails, \"{}\"",
            marker,
            summary.priority,
            display_domain,
            format_number(summary.count),
            truncate(&summary.subject, 50)
        );
        let link = if args.redact {
            summary.link_host().map(|h| redact_domain(&h)).unwrap_or_default()
        } else {
            summary.unsubscribe_link.clone()
        };
        println!("        {}{}", link, one_click);
    }

    Ok(())
}
