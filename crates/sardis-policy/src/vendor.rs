/// Normalize a destination or vendor string to its canonical domain form:
/// trimmed, ASCII-lowercased, scheme and path stripped, leading `www.`
/// removed. Non-ASCII labels are rejected to the empty string rather than
/// guessed at; upstream enrichment supplies punycode.
pub fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .split('@')
        .next_back()
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("");
    if !host.is_ascii() {
        return String::new();
    }
    let lowered = host.to_ascii_lowercase();
    let canonical = lowered.strip_prefix("www.").unwrap_or(&lowered);
    canonical.trim_matches('.').to_string()
}

/// Exact match on normalized domain form. Substring containment is forbidden:
/// `aws-evil.com` must never match a rule for `aws`.
pub fn vendor_matches(rule: &str, candidate: &str) -> bool {
    let rule = normalize_domain(rule);
    let candidate = normalize_domain(candidate);
    !rule.is_empty() && rule == candidate
}
