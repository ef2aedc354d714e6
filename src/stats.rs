use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;

/// Urgency of unsubscribing from a sender, derived from its message count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    High,
    Medium,
    Low,
}

impl PriorityTier {
    pub fn from_count(count: u32) -> Self {
        if count >= 10 {
            PriorityTier::High
        } else if count >= 3 {
            PriorityTier::Medium
        } else {
            PriorityTier::Low
        }
    }

    fn rank(self) -> u8 {
        match self {
            PriorityTier::High => 0,
            PriorityTier::Medium => 1,
            PriorityTier::Low => 2,
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PriorityTier::High => "HIGH",
            PriorityTier::Medium => "MEDIUM",
            PriorityTier::Low => "LOW",
        };
        f.pad(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSummary {
    pub domain: String,
    pub count: u32,
    pub unsubscribe_link: String,
    pub subject: String,
    pub received_date: Option<DateTime<Utc>>,
    pub priority: PriorityTier,
    pub one_click: bool,
}

impl DomainSummary {
    pub fn link_host(&self) -> Option<String> {
        url::Url::parse(&self.unsubscribe_link)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    /// Messages attributed to any sender domain, linked or not.
    pub total_messages: u32,
    pub unique_domains: u32,
    pub domains_with_link: u32,
    pub high_priority: u32,
    pub medium_priority: u32,
    pub low_priority: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub domains: Vec<DomainSummary>,
    pub stats: ScanStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    #[default]
    Count,
    Domain,
    Priority,
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    /// Case-insensitive substring matched against domain and subject.
    pub search: Option<String>,
    pub priority: Option<PriorityTier>,
}

impl ReportFilter {
    pub fn matches(&self, summary: &DomainSummary) -> bool {
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            if !summary.domain.to_lowercase().contains(&needle)
                && !summary.subject.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        self.priority.map_or(true, |p| summary.priority == p)
    }
}

impl Report {
    pub fn filter(&self, filter: &ReportFilter) -> Vec<&DomainSummary> {
        self.domains.iter().filter(|d| filter.matches(d)).collect()
    }
}

/// Stable sort of a report view.
pub fn sort_domains(domains: &mut [&DomainSummary], key: SortKey) {
    match key {
        SortKey::Count => domains.sort_by(|a, b| b.count.cmp(&a.count)),
        SortKey::Domain => domains.sort_by_key(|d| d.domain.to_lowercase()),
        SortKey::Priority => domains.sort_by_key(|d| d.priority.rank()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(domain: &str, count: u32, subject: &str) -> DomainSummary {
        DomainSummary {
            domain: domain.to_string(),
            count,
            unsubscribe_link: format!("https://{domain}/unsubscribe"),
            subject: subject.to_string(),
            received_date: None,
            priority: PriorityTier::from_count(count),
            one_click: false,
        }
    }

    fn report() -> Report {
        Report {
            domains: vec![
                summary("shop.test", 14, "Flash sale"),
                summary("Blog.test", 4, "New post"),
                summary("alerts.test", 4, "Weekly digest"),
                summary("zeta.test", 1, "Welcome"),
            ],
            stats: ScanStats::default(),
        }
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(PriorityTier::from_count(0), PriorityTier::Low);
        assert_eq!(PriorityTier::from_count(2), PriorityTier::Low);
        assert_eq!(PriorityTier::from_count(3), PriorityTier::Medium);
        assert_eq!(PriorityTier::from_count(9), PriorityTier::Medium);
        assert_eq!(PriorityTier::from_count(10), PriorityTier::High);
    }

    #[test]
    fn tier_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PriorityTier::Medium).unwrap(),
            "\"medium\""
        );
        assert_eq!(PriorityTier::High.to_string(), "HIGH");
    }

    #[test]
    fn search_matches_domain_or_subject() {
        let report = report();
        let filter = ReportFilter {
            search: Some("DIGEST".to_string()),
            priority: None,
        };
        let found: Vec<_> = report.filter(&filter).into_iter().map(|d| d.domain.as_str()).collect();
        assert_eq!(found, vec!["alerts.test"]);

        let filter = ReportFilter {
            search: Some("blog".to_string()),
            priority: None,
        };
        assert_eq!(report.filter(&filter).len(), 1);
    }

    #[test]
    fn priority_filter() {
        let report = report();
        let filter = ReportFilter {
            search: None,
            priority: Some(PriorityTier::Medium),
        };
        let found: Vec<_> = report.filter(&filter).into_iter().map(|d| d.domain.as_str()).collect();
        assert_eq!(found, vec!["Blog.test", "alerts.test"]);
    }

    #[test]
    fn sorts_by_domain_case_insensitively() {
        let report = report();
        let mut view = report.filter(&ReportFilter::default());
        sort_domains(&mut view, SortKey::Domain);
        let order: Vec<_> = view.iter().map(|d| d.domain.as_str()).collect();
        assert_eq!(order, vec!["alerts.test", "Blog.test", "shop.test", "zeta.test"]);
    }

    #[test]
    fn priority_sort_is_stable() {
        let report = report();
        let mut view = report.filter(&ReportFilter::default());
        view.reverse();
        sort_domains(&mut view, SortKey::Priority);
        let order: Vec<_> = view.iter().map(|d| d.domain.as_str()).collect();
        assert_eq!(order, vec!["shop.test", "alerts.test", "Blog.test", "zeta.test"]);
    }

    #[test]
    fn link_host_parses_url() {
        assert_eq!(
            summary("shop.test", 1, "x").link_host(),
            Some("shop.test".to_string())
        );
    }
}
