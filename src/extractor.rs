use anyhow::Result;
use regex::{Captures, Regex};
use std::collections::HashSet;
use tracing::trace;

use crate::message::Header;
use crate::patterns::DetectionPatterns;

pub const LIST_UNSUBSCRIBE: &str = "List-Unsubscribe";
pub const LIST_UNSUBSCRIBE_POST: &str = "List-Unsubscribe-Post";

type DetectionMethod = fn(&DetectionPatterns, &[Header], &str) -> Vec<String>;

/// Detection methods in precedence order. The header method is authoritative
/// and callers usually keep only the first surviving link.
const METHODS: [(&str, DetectionMethod); 5] = [
    ("list_unsubscribe_header", from_list_unsubscribe_header),
    ("anchor_text", from_anchor_text),
    ("href_keyword", from_href_keyword),
    ("keyword_then_href", from_keyword_then_href),
    ("href_then_keyword", from_href_then_keyword),
];

/// Finds candidate unsubscribe URLs in a single message.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    patterns: DetectionPatterns,
}

impl LinkExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: DetectionPatterns::compile()?,
        })
    }

    /// Returns validated, de-duplicated HTTP(S) links ordered by detection
    /// method and then by position within the input.
    pub fn extract(&self, headers: &[Header], body: &str) -> Vec<String> {
        let candidates: Vec<String> = METHODS
            .iter()
            .flat_map(|(name, method)| {
                let found = method(&self.patterns, headers, body);
                trace!(
                    action = "detect",
                    component = "link_extractor",
                    method = *name,
                    candidate_count = found.len(),
                    "Detection method finished"
                );
                found
            })
            .collect();

        self.clean_and_validate(candidates)
    }

    /// Whether the message advertises RFC 8058 one-click unsubscribe.
    pub fn one_click_supported(headers: &[Header]) -> bool {
        let has = |name: &str| headers.iter().any(|h| h.name == name);
        has(LIST_UNSUBSCRIBE) && has(LIST_UNSUBSCRIBE_POST)
    }

    pub fn clean_and_validate(&self, links: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut valid = Vec::new();

        for link in links {
            let link = self.decode_html_entities(&link);

            if link.is_empty() || !self.patterns.http_scheme.is_match(&link) {
                continue;
            }
            // Tracking pixels
            if self.patterns.image_extension.is_match(&link) {
                continue;
            }
            if self.patterns.mailto.is_match(&link) {
                continue;
            }

            if seen.insert(link.clone()) {
                valid.push(link);
            }
        }

        valid
    }

    pub fn decode_html_entities(&self, text: &str) -> String {
        self.patterns
            .entity
            .replace_all(text, |caps: &Captures| match decode_entity(&caps[1]) {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(numeric) = entity.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }

    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

fn first_groups(re: &Regex, haystack: &str) -> Vec<String> {
    re.captures_iter(haystack)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn from_list_unsubscribe_header(
    patterns: &DetectionPatterns,
    headers: &[Header],
    _body: &str,
) -> Vec<String> {
    headers
        .iter()
        .find(|h| h.name == LIST_UNSUBSCRIBE)
        .map(|h| first_groups(&patterns.header_uri, &h.value))
        .unwrap_or_default()
}

fn from_anchor_text(patterns: &DetectionPatterns, _headers: &[Header], body: &str) -> Vec<String> {
    first_groups(&patterns.anchor_text, body)
}

fn from_href_keyword(patterns: &DetectionPatterns, _headers: &[Header], body: &str) -> Vec<String> {
    first_groups(&patterns.href_keyword, body)
}

fn from_keyword_then_href(
    patterns: &DetectionPatterns,
    _headers: &[Header],
    body: &str,
) -> Vec<String> {
    first_groups(&patterns.keyword_then_href, body)
}

fn from_href_then_keyword(
    patterns: &DetectionPatterns,
    _headers: &[Header],
    body: &str,
) -> Vec<String> {
    first_groups(&patterns.href_then_keyword, body)
}
