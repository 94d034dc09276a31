//! Regex-based lead signals over raw message text.
//!
//! All three checks are pure and independent; none of them can fail.

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").expect("email pattern is valid")
});

// Optional +1 country code, optional parens around the area code, and
// space/dot/dash separators between groups. The number must not start or end
// inside a longer digit run.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d+])(?:\+?1[\s.-]?)?\(?(\d{3})\)?[\s.-]?(\d{3})[\s.-]?(\d{4})\b")
        .expect("phone pattern is valid")
});

static INTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:quote|estimate|pricing|price|book|booking|appointment|schedule|contact|call me|reach out|get in touch)\b",
    )
    .expect("intent pattern is valid")
});

/// What the extractor found in one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadSignals {
    pub email: Option<String>,
    /// Normalised to `NNN-NNN-NNNN`.
    pub phone: Option<String>,
    pub intent: bool,
}

impl LeadSignals {
    /// A lead is worth recording when any signal fired.
    pub fn qualifies(&self) -> bool {
        self.email.is_some() || self.phone.is_some() || self.intent
    }
}

pub fn extract(message: &str) -> LeadSignals {
    LeadSignals {
        email: extract_email(message),
        phone: extract_phone(message),
        intent: has_intent(message),
    }
}

pub fn extract_email(message: &str) -> Option<String> {
    EMAIL_RE.find(message).map(|m| m.as_str().to_string())
}

pub fn extract_phone(message: &str) -> Option<String> {
    PHONE_RE
        .captures(message)
        .map(|c| format!("{}-{}-{}", &c[1], &c[2], &c[3]))
}

pub fn has_intent(message: &str) -> bool {
    INTENT_RE.is_match(message)
}
