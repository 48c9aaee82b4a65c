use once_cell::sync::Lazy;
use regex::Regex;

/// PII scrubber for sanitizing submitted statements before audit logging.
///
/// ### WARNING
/// This utility uses regex-based patterns which is a **best-effort** approach.
/// It does not guarantee complete sanitization of literals embedded in
/// complex SQL dialects or concatenated strings.
///
/// For high-compliance environments, consider disabling literal logging
/// entirely.
static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").unwrap());

static SSN_REGEX: Lazy<Regex> = Lazy::new(|| {
    // Basic US SSN pattern: XXX-XX-XXXX
    Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap()
});

static CREDIT_CARD_REGEX: Lazy<Regex> = Lazy::new(|| {
    // Basic 13-16 digit pattern, often grouped by hyphens or spaces
    Regex::new(r"\b(?:\d[ -]*?){13,16}\b").unwrap()
});

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    // Matches common phone formats like (XXX) XXX-XXXX or XXX-XXX-XXXX
    Regex::new(r"(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}").unwrap()
});

pub fn scrub(input: &str) -> String {
    let mut scrubbed = input.to_string();

    scrubbed = EMAIL_REGEX.replace_all(&scrubbed, "[EMAIL]").to_string();

    scrubbed = SSN_REGEX.replace_all(&scrubbed, "[SSN]").to_string();

    // Note: 13-16 digits might catch IDs too, but better safe for an
    // audit log.
    scrubbed = CREDIT_CARD_REGEX
        .replace_all(&scrubbed, "[CREDIT_CARD]")
        .to_string();

    scrubbed = PHONE_REGEX.replace_all(&scrubbed, "[PHONE]").to_string();

    scrubbed
}
