//! Student status filtering
//!
//! Connect attaches a single-letter status code to every enrolment. Each enrol
//! instance carries an allow-list of codes (or `*`); only rows whose code is on
//! the list become desired state.

use std::collections::BTreeSet;
use std::fmt;

/// Codes used when an instance and the configuration both leave the list empty
pub const DEFAULT_STATUSES: [&str; 8] = ["A", "J", "P", "R", "T", "W", "Y", "H"];

/// Records marked for deletion in Connect; never synced
const DELETION_CODE: &str = "D";

/// Status codes Connect can report, with their meaning
pub const KNOWN_STATUS_CODES: [(&str, &str); 16] = [
    ("?", "Not Known"),
    ("A", "Not here, not registered"),
    ("C", "Here but not yet registered"),
    ("D", "Record for deletion"),
    ("H", "Holding / Awaiting further information"),
    ("I", "Intermission"),
    ("J", "Resit candidate"),
    ("M", "Modular student, not in attendance"),
    ("P", "Provisional registration"),
    ("R", "Registered"),
    ("S", "Sabbatical Officer having completed POS"),
    ("T", "Thesis submitted"),
    ("W", "Writing up"),
    ("X", "Record for archiving"),
    ("Y", "Compulsory year abroad / placement"),
    ("Z", "Deferred entry"),
];

/// Parsed allow-list of status codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedStatuses {
    /// `*`: every record is eligible
    Any,
    /// Explicit set of upper-cased codes
    Codes(BTreeSet<String>),
}

impl AllowedStatuses {
    /// Parse an allow-list, using `fallback` when `text` names no codes
    ///
    /// `fallback` is parsed the same way; if it is empty too, the built-in
    /// [`DEFAULT_STATUSES`] apply.
    pub fn parse(text: &str, fallback: &str) -> Self {
        if let Some(parsed) = Self::parse_list(text) {
            return parsed;
        }
        if let Some(parsed) = Self::parse_list(fallback) {
            return parsed;
        }
        Self::default()
    }

    fn parse_list(text: &str) -> Option<Self> {
        if text.trim() == "*" {
            return Some(AllowedStatuses::Any);
        }

        let mut codes = BTreeSet::new();
        for item in text.split(',') {
            let code = item.trim().to_uppercase();
            if code.is_empty() {
                continue;
            }
            if code == DELETION_CODE {
                tracing::warn!(code = %code, "Ignoring deletion status code in allow-list");
                continue;
            }
            if !is_known(&code) {
                tracing::warn!(code = %code, "Unknown status code in allow-list");
            }
            codes.insert(code);
        }

        if codes.is_empty() {
            None
        } else {
            Some(AllowedStatuses::Codes(codes))
        }
    }

    /// Whether a record with `code` should be synced
    pub fn is_allowed(&self, code: &str) -> bool {
        match self {
            AllowedStatuses::Any => true,
            AllowedStatuses::Codes(codes) => {
                let code = code.trim().to_uppercase();
                !code.is_empty() && codes.contains(&code)
            }
        }
    }
}

impl Default for AllowedStatuses {
    fn default() -> Self {
        AllowedStatuses::Codes(DEFAULT_STATUSES.iter().map(|c| c.to_string()).collect())
    }
}

impl fmt::Display for AllowedStatuses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowedStatuses::Any => f.write_str("*"),
            AllowedStatuses::Codes(codes) => {
                let joined: Vec<&str> = codes.iter().map(String::as_str).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

/// Whether Connect defines `code`
pub fn is_known(code: &str) -> bool {
    KNOWN_STATUS_CODES.iter().any(|(known, _)| *known == code)
}

/// One-shot check against raw allow-list text with the built-in fallback
pub fn is_allowed(code: &str, allowed: &str) -> bool {
    AllowedStatuses::parse(allowed, "").is_allowed(code)
}
