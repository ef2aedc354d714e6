use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use std::time::Instant;
use tracing::debug;

/// Maximum distance, in characters, between an unsubscribe keyword and the
/// `href` it is paired with by the proximity methods.
pub const PROXIMITY_WINDOW: usize = 200;

const HEADER_URI: &str = r"<(https?://[^>]+)>";

const ANCHOR_TEXT: &str = r#"<a[^>]+href\s*=\s*["']([^"']+)["'][^>]*>(?:[^<]*(?:unsubscribe|opt[\s\-]?out|remove\s?me|manage\s?preferences|email\s?preferences)[^<]*)</a>"#;

const HREF_KEYWORD: &str =
    r#"<a[^>]+href\s*=\s*["']([^"']*(?:unsubscribe|optout|opt-out|remove|unsub)[^"']*)["']"#;

const PROXIMITY_KEYWORDS: &str = r"(?:unsubscribe|opt[\s\-]?out|remove\s?me)";

const HTTP_SCHEME: &str = r"^https?://";
const IMAGE_EXTENSION: &str = r"\.(gif|jpg|jpeg|png|bmp)(\?|$)";
const MAILTO: &str = r"^mailto:";
const ENTITY: &str = r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);";

// The bounded Unicode `.` repetitions in the proximity patterns exceed the
// default compiled size limit.
const SIZE_LIMIT: usize = 64 * (1 << 20);

/// Compiled regular expressions shared by every detection method.
#[derive(Debug, Clone)]
pub struct DetectionPatterns {
    pub header_uri: Regex,
    pub anchor_text: Regex,
    pub href_keyword: Regex,
    pub keyword_then_href: Regex,
    pub href_then_keyword: Regex,
    pub http_scheme: Regex,
    pub image_extension: Regex,
    pub mailto: Regex,
    pub entity: Regex,
}

impl DetectionPatterns {
    pub fn compile() -> Result<Self> {
        let start_time = Instant::now();

        let keyword_then_href = format!(
            r#"{PROXIMITY_KEYWORDS}.{{0,{PROXIMITY_WINDOW}}}?href\s*=\s*["']([^"']+)["']"#
        );
        let href_then_keyword = format!(
            r#"href\s*=\s*["']([^"']+)["'][^>]{{0,{PROXIMITY_WINDOW}}}?{PROXIMITY_KEYWORDS}"#
        );

        let patterns = Self {
            header_uri: build(HEADER_URI, false)?,
            anchor_text: build(ANCHOR_TEXT, true)?,
            href_keyword: build(HREF_KEYWORD, true)?,
            keyword_then_href: build(&keyword_then_href, true)?,
            href_then_keyword: build(&href_then_keyword, true)?,
            http_scheme: build(HTTP_SCHEME, true)?,
            image_extension: build(IMAGE_EXTENSION, true)?,
            mailto: build(MAILTO, true)?,
            entity: build(ENTITY, false)?,
        };

        debug!(
            action = "complete",
            component = "pattern_compile",
            duration_ms = start_time.elapsed().as_millis(),
            "Compiled detection patterns"
        );
        Ok(patterns)
    }
}

fn build(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .size_limit(SIZE_LIMIT)
        .build()
        .with_context(|| format!("Invalid detection pattern: {pattern}"))
}
