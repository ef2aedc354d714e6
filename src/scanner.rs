use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::sender_domain;
use crate::extractor::LinkExtractor;
use crate::message::{Header, Message};
use crate::stats::{DomainSummary, PriorityTier, Report, ScanStats};

const NO_SUBJECT: &str = "N/A";

/// Aggregate state for one sender domain during a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRecord {
    pub domain: String,
    pub count: u32,
    /// First valid link found for the domain; never replaced once set.
    pub unsubscribe_link: Option<String>,
    pub subject: String,
    pub received_date: Option<DateTime<Utc>>,
    pub one_click: bool,
}

impl DomainRecord {
    fn new(domain: String, first_message: &Message) -> Self {
        let subject = first_message
            .subject
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_SUBJECT)
            .to_string();

        Self {
            domain,
            count: 0,
            unsubscribe_link: None,
            subject,
            received_date: first_message.received_date_time,
            one_click: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub percent: f64,
    pub processed: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
struct Extraction {
    links: Vec<String>,
    one_click: bool,
}

/// Groups messages by sender domain and keeps the first unsubscribe link
/// found for each one.
#[derive(Debug)]
pub struct ScanEngine {
    extractor: LinkExtractor,
    workers: Option<usize>,
    records: Vec<DomainRecord>,
    index: HashMap<String, usize>,
}

impl ScanEngine {
    pub fn new(extractor: LinkExtractor) -> Self {
        Self {
            extractor,
            workers: None,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Extract links on a pool of `workers` threads. Results are merged in
    /// input order, so the report is identical to a sequential scan.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Domain records from the most recent scan, in discovery order.
    pub fn records(&self) -> &[DomainRecord] {
        &self.records
    }

    pub fn scan(&mut self, messages: &[Message]) -> Report {
        self.scan_with_progress(messages, |_| {})
    }

    pub fn scan_with_progress<F>(&mut self, messages: &[Message], on_progress: F) -> Report
    where
        F: FnMut(Progress),
    {
        self.run(messages, LinkExtractor::extract, on_progress)
    }

    fn run<E, F>(&mut self, messages: &[Message], extract: E, mut on_progress: F) -> Report
    where
        E: Fn(&LinkExtractor, &[Header], &str) -> Vec<String> + Sync,
        F: FnMut(Progress),
    {
        let start_time = Instant::now();
        self.records.clear();
        self.index.clear();

        let total = messages.len();
        info!(
            action = "start",
            component = "scan_engine",
            message_count = total,
            workers = self.workers.unwrap_or(1),
            "Starting mailbox scan"
        );

        let mut prefetched = self.prefetch(messages, &extract);

        for (i, message) in messages.iter().enumerate() {
            if let Some(idx) = self.record_message(message) {
                let extraction = match prefetched.as_mut() {
                    Some(extractions) => extractions.get_mut(i).and_then(Option::take),
                    None => extract_guarded(message, |headers, body| {
                        extract(&self.extractor, headers, body)
                    }),
                };
                if let Some(extraction) = extraction {
                    self.apply_extraction(idx, extraction);
                }
            }

            let processed = i + 1;
            on_progress(Progress {
                percent: processed as f64 / total as f64 * 100.0,
                processed,
                total,
            });
        }

        let report = self.report();
        info!(
            action = "complete",
            component = "scan_engine",
            unique_domains = report.stats.unique_domains,
            domains_with_link = report.stats.domains_with_link,
            duration_ms = start_time.elapsed().as_millis(),
            "Mailbox scan completed"
        );
        report
    }

    fn prefetch<E>(&self, messages: &[Message], extract: &E) -> Option<Vec<Option<Extraction>>>
    where
        E: Fn(&LinkExtractor, &[Header], &str) -> Vec<String> + Sync,
    {
        let workers = self.workers.filter(|&w| w > 1)?;

        let pool = match ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool,
            Err(e) => {
                warn!(
                    action = "configure",
                    component = "scan_engine",
                    error = %e,
                    "Failed to build worker pool, extracting sequentially"
                );
                return None;
            }
        };

        let extractor = &self.extractor;
        Some(pool.install(|| {
            messages
                .par_iter()
                .map(|message| {
                    message
                        .sender_address()
                        .and_then(sender_domain)
                        .and_then(|_| {
                            extract_guarded(message, |headers, body| {
                                extract(extractor, headers, body)
                            })
                        })
                })
                .collect()
        }))
    }

    /// Counts the message against its domain. Returns the record index when
    /// the message still needs link extraction.
    fn record_message(&mut self, message: &Message) -> Option<usize> {
        let Some(address) = message.sender_address() else {
            debug!(
                action = "skip",
                component = "scan_engine",
                reason = "no_sender",
                "Skipping message without sender address"
            );
            return None;
        };
        let Some(domain) = sender_domain(address) else {
            debug!(
                action = "skip",
                component = "scan_engine",
                reason = "malformed_address",
                address,
                "Skipping message with malformed sender address"
            );
            return None;
        };

        let idx = match self.index.get(&domain) {
            Some(&idx) => idx,
            None => {
                let idx = self.records.len();
                self.records.push(DomainRecord::new(domain.clone(), message));
                self.index.insert(domain, idx);
                idx
            }
        };

        let record = &mut self.records[idx];
        record.count += 1;

        if record.unsubscribe_link.is_some() || message.body_content().is_empty() {
            return None;
        }
        Some(idx)
    }

    fn apply_extraction(&mut self, idx: usize, extraction: Extraction) {
        let record = &mut self.records[idx];
        let found = extraction.links.len();

        if let Some(link) = extraction.links.into_iter().next() {
            debug!(
                action = "found",
                component = "scan_engine",
                domain = %record.domain,
                link_count = found,
                one_click = extraction.one_click,
                "Found unsubscribe link"
            );
            record.unsubscribe_link = Some(link);
            record.one_click = extraction.one_click;
        }
    }

    fn report(&self) -> Report {
        let mut domains: Vec<DomainSummary> = self
            .records
            .iter()
            .filter_map(|record| {
                let link = record.unsubscribe_link.clone()?;
                Some(DomainSummary {
                    domain: record.domain.clone(),
                    count: record.count,
                    unsubscribe_link: link,
                    subject: record.subject.clone(),
                    received_date: record.received_date,
                    priority: PriorityTier::from_count(record.count),
                    one_click: record.one_click,
                })
            })
            .collect();

        domains.sort_by(|a, b| b.count.cmp(&a.count));

        let tier_count =
            |tier: PriorityTier| domains.iter().filter(|d| d.priority == tier).count() as u32;

        let stats = ScanStats {
            total_messages: self.records.iter().map(|r| r.count).sum(),
            unique_domains: self.records.len() as u32,
            domains_with_link: domains.len() as u32,
            high_priority: tier_count(PriorityTier::High),
            medium_priority: tier_count(PriorityTier::Medium),
            low_priority: tier_count(PriorityTier::Low),
        };

        Report { domains, stats }
    }
}

fn extract_guarded<G>(message: &Message, extract: G) -> Option<Extraction>
where
    G: FnOnce(&[Header], &str) -> Vec<String>,
{
    let body = message.body_content();
    if body.is_empty() {
        return None;
    }
    let headers = message.headers();

    match panic::catch_unwind(AssertUnwindSafe(|| extract(headers, body))) {
        Ok(links) if links.is_empty() => None,
        Ok(links) => Some(Extraction {
            links,
            one_click: LinkExtractor::one_click_supported(headers),
        }),
        Err(_) => {
            warn!(
                action = "extract",
                component = "scan_engine",
                message_id = message.id.as_deref().unwrap_or("unknown"),
                "Link extraction failed, continuing with next message"
            );
            None
        }
    }
}
