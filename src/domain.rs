/// Derives the aggregation key for a sender address: the part after `@`,
/// lowercased. Returns `None` when the address has no `@`.
pub fn sender_domain(address: &str) -> Option<String> {
    let mut parts = address.split('@');
    parts.next()?;
    let domain = parts.next()?;
    Some(domain.to_lowercase())
}
