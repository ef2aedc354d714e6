use serde_json::json;
use unsubscan::{Header, LinkExtractor, Message, PriorityTier, ScanEngine};

fn extractor() -> LinkExtractor {
    LinkExtractor::new().expect("patterns compile")
}

fn engine() -> ScanEngine {
    ScanEngine::new(extractor())
}

fn message(from: &str, subject: &str, body: &str) -> Message {
    serde_json::from_value(json!({
        "subject": subject,
        "from": { "emailAddress": { "address": from } },
        "receivedDateTime": "2024-06-01T12:00:00Z",
        "body": { "contentType": "html", "content": body }
    }))
    .expect("valid message")
}

fn linked(from: &str, url: &str) -> Message {
    message(from, "Newsletter", &format!(r#"<a href="{url}">Unsubscribe</a>"#))
}

#[test]
fn list_unsubscribe_header_wins_over_body() {
    let headers = vec![Header::new(
        "List-Unsubscribe",
        "<https://list.test/one>, <https://list.test/two>",
    )];
    let body = r#"<a href="https://body.test/unsubscribe">Unsubscribe</a> opt out: <a href="https://body.test/x">x</a>"#;

    let links = extractor().extract(&headers, body);
    assert_eq!(links.first().map(String::as_str), Some("https://list.test/one"));
    assert_eq!(links[1], "https://list.test/two");
}

#[test]
fn anchor_with_unsubscribe_text_is_found() {
    let body = r#"<html><body><a href="https://x.test/u">Unsubscribe here</a></body></html>"#;
    assert!(extractor()
        .extract(&[], body)
        .contains(&"https://x.test/u".to_string()));
}

#[test]
fn image_links_never_returned() {
    let body = r#"<a href="https://x.test/track.png">Unsubscribe</a>"#;
    let links = extractor().extract(&[], body);
    assert!(!links.contains(&"https://x.test/track.png".to_string()));
}

#[test]
fn mailto_never_returned() {
    let headers = vec![Header::new("List-Unsubscribe", "<mailto:unsub@x.test>")];
    let body = r#"<a href="mailto:unsub@x.test">unsubscribe</a>"#;
    let links = extractor().extract(&headers, body);
    assert!(!links.iter().any(|l| l.contains("mailto:")));
}

#[test]
fn same_href_reported_once() {
    let body = concat!(
        r#"<p>If you no longer wish to receive these, unsubscribe "#,
        r#"<a href="https://x.test/unsubscribe?id=4">here</a>.</p>"#,
        r#"<a href="https://x.test/unsubscribe?id=4">Unsubscribe</a>"#,
    );
    let links = extractor().extract(&[], body);
    assert_eq!(links, vec!["https://x.test/unsubscribe?id=4"]);
}

#[test]
fn domain_aggregation_and_tiers() {
    let mut messages = Vec::new();
    for _ in 0..12 {
        messages.push(linked("deals@a.test", "https://a.test/unsubscribe"));
    }
    for _ in 0..5 {
        messages.push(linked("news@b.test", "https://b.test/unsubscribe"));
    }
    for _ in 0..2 {
        messages.push(message("hi@c.test", "Hello", "<p>no links</p>"));
    }

    let report = engine().scan(&messages);

    assert_eq!(report.domains.len(), 2);
    assert_eq!(report.domains[0].domain, "a.test");
    assert_eq!(report.domains[0].priority, PriorityTier::High);
    assert_eq!(report.domains[1].domain, "b.test");
    assert_eq!(report.domains[1].priority, PriorityTier::Medium);

    assert_eq!(report.stats.total_messages, 19);
    assert_eq!(report.stats.unique_domains, 3);
    assert_eq!(report.stats.domains_with_link, 2);
    assert_eq!(report.stats.high_priority, 1);
    assert_eq!(report.stats.medium_priority, 1);
    assert_eq!(report.stats.low_priority, 0);
}

#[test]
fn ties_keep_discovery_order() {
    let messages = vec![
        linked("a@first.test", "https://first.test/unsubscribe"),
        linked("a@second.test", "https://second.test/unsubscribe"),
        linked("a@third.test", "https://third.test/unsubscribe"),
    ];

    let report = engine().scan(&messages);
    let order: Vec<_> = report.domains.iter().map(|d| d.domain.as_str()).collect();
    assert_eq!(order, vec!["first.test", "second.test", "third.test"]);
    assert!(report.domains.iter().all(|d| d.priority == PriorityTier::Low));
}

#[test]
fn first_link_wins_across_messages() {
    let messages = vec![
        message("a@shop.test", "No body", ""),
        linked("a@shop.test", "https://shop.test/unsubscribe/second"),
        linked("a@shop.test", "https://shop.test/unsubscribe/third"),
    ];

    let report = engine().scan(&messages);
    assert_eq!(
        report.domains[0].unsubscribe_link,
        "https://shop.test/unsubscribe/second"
    );
    assert_eq!(report.domains[0].subject, "No body");
    assert_eq!(report.domains[0].count, 3);
}

#[test]
fn senderless_messages_are_ignored() {
    let mut orphan = linked("x@shop.test", "https://shop.test/unsubscribe");
    orphan.from = None;
    orphan.sender = None;

    let messages = vec![orphan, linked("a@b.test", "https://b.test/unsubscribe")];
    let report = engine().scan(&messages);

    assert_eq!(report.stats.total_messages, 1);
    assert_eq!(report.stats.unique_domains, 1);
    assert_eq!(report.domains.len(), 1);
}

#[test]
fn scanning_twice_is_idempotent() {
    let messages = vec![
        linked("a@one.test", "https://one.test/unsubscribe"),
        message("a@two.test", "s", ""),
        linked("a@one.test", "https://one.test/unsubscribe/other"),
    ];

    let mut engine = engine();
    let first = engine.scan(&messages);
    let second = engine.scan(&messages);
    assert_eq!(first, second);
}

#[test]
fn empty_input_gives_empty_report() {
    let report = engine().scan(&[]);
    assert!(report.domains.is_empty());
    assert_eq!(report.stats.total_messages, 0);
    assert_eq!(report.stats.unique_domains, 0);
}
