//! Content redaction applied before an event is persisted.
//!
//! Rules run in a fixed order: credentials, then PII, then user patterns.
//! Every match is replaced by `[REDACTED:<kind>]`.

use regex::Regex;
use strata_settings::RedactionSettings;

const CREDENTIAL_RULES: &[(&str, &str)] = &[
    (
        "api_key",
        r#"(?i)\b(api[_-]?key|access[_-]?token|secret|password)(\s*[:=]\s*)["']?[^\s"']+["']?"#,
    ),
    ("bearer", r"(?i)\bbearer\s+[A-Za-z0-9._~+/=-]{8,}"),
    ("secret_key", r"\bsk-[A-Za-z0-9_-]{16,}"),
];

// SSN and card numbers before phone numbers, which would match their digits.
const PII_RULES: &[(&str, &str)] = &[
    ("email", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
    ("ssn", r"\b\d{3}-\d{2}-\d{4}\b"),
    ("credit_card", r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{1,4}\b"),
    ("phone", r"(?:\+\d{1,3}[ .-]?)?(?:\(\d{3}\)|\b\d{3})[ .-]?\d{3}[ .-]\d{4}\b"),
];

struct Rule {
    kind: &'static str,
    regex: Regex,
    keep_label: bool,
}

/// Outcome of redacting one text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redacted {
    /// Text with every match replaced.
    pub text: String,
    /// Kinds that matched, in rule order, without repeats.
    pub kinds: Vec<&'static str>,
}

impl Redacted {
    /// Whether anything was replaced.
    pub fn changed(&self) -> bool {
        !self.kinds.is_empty()
    }
}

/// Compiled redaction rules.
pub struct Redactor {
    rules: Vec<Rule>,
}

impl Redactor {
    /// Compile the enabled built-in rules and the user patterns.
    pub fn new(settings: &RedactionSettings) -> Result<Self, regex::Error> {
        let mut rules = Vec::new();
        if settings.credentials {
            for (kind, pattern) in CREDENTIAL_RULES {
                rules.push(Rule { kind, regex: Regex::new(pattern)?, keep_label: *kind == "api_key" });
            }
        }
        if settings.pii {
            for (kind, pattern) in PII_RULES {
                rules.push(Rule { kind, regex: Regex::new(pattern)?, keep_label: false });
            }
        }
        for pattern in &settings.patterns {
            rules.push(Rule { kind: "custom", regex: Regex::new(pattern)?, keep_label: false });
        }
        Ok(Self { rules })
    }

    /// Number of active rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rule is active.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule to `text`.
    pub fn redact(&self, text: &str) -> Redacted {
        let mut out = text.to_string();
        let mut kinds = Vec::new();
        for rule in &self.rules {
            if !rule.regex.is_match(&out) {
                continue;
            }
            let replacement = if rule.keep_label {
                format!("${{1}}${{2}}[REDACTED:{}]", rule.kind)
            } else {
                format!("[REDACTED:{}]", rule.kind)
            };
            out = rule.regex.replace_all(&out, replacement.as_str()).into_owned();
            if !kinds.contains(&rule.kind) {
                kinds.push(rule.kind);
            }
        }
        Redacted { text: out, kinds }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
