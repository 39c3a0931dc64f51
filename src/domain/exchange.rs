//! Request/response exchange rules
//!
//! A central writes a text request such as `Enroll request 3`; the peripheral
//! answers the next read with `Enroll response 3 [<timestamp>]`. Reading a
//! response that starts with the enrollment-complete marker hands the
//! peripheral over from the Enroll service to the Auth service.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Write};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRules {
    /// Marker in the request text that is swapped for `response_marker`
    #[serde(default = "default_request_marker")]
    pub request_marker: String,
    #[serde(default = "default_response_marker")]
    pub response_marker: String,
    /// Prefix of a response that completes enrollment
    #[serde(default = "default_enroll_complete_marker")]
    pub enroll_complete_marker: String,
    /// chrono format string for the appended timestamp
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for ExchangeRules {
    fn default() -> Self {
        Self {
            request_marker: default_request_marker(),
            response_marker: default_response_marker(),
            enroll_complete_marker: default_enroll_complete_marker(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

fn default_request_marker() -> String {
    "request".to_string()
}
fn default_response_marker() -> String {
    "response".to_string()
}
fn default_enroll_complete_marker() -> String {
    "Enroll response".to_string()
}
fn default_timestamp_format() -> String {
    "%Y-%m-%d %H:%M:%S%.3f".to_string()
}

impl ExchangeRules {
    /// Build the response for a decoded request received at `now`
    pub fn respond<Tz>(&self, request: &str, now: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let body = if self.request_marker.is_empty() {
            request.to_string()
        } else {
            request.replace(&self.request_marker, &self.response_marker)
        };
        format!("{} [{}]", body, self.timestamp(now))
    }

    fn timestamp<Tz>(&self, now: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let mut stamp = String::new();
        if write!(stamp, "{}", now.format(&self.timestamp_format)).is_ok() {
            return stamp;
        }
        warn!(
            "Cannot format timestamp with '{}', using the default format",
            self.timestamp_format
        );
        now.format(&default_timestamp_format()).to_string()
    }

    /// Replace an unusable timestamp format with the default one.
    ///
    /// Returns the rejected format, if any.
    pub fn sanitize(&mut self) -> Option<String> {
        if is_valid_timestamp_format(&self.timestamp_format) {
            return None;
        }
        Some(std::mem::replace(
            &mut self.timestamp_format,
            default_timestamp_format(),
        ))
    }

    /// True when reading `response` completes enrollment.
    ///
    /// This is a plain prefix match on `enroll_complete_marker`; an empty
    /// marker never matches.
    pub fn is_enrollment_complete(&self, response: &str) -> bool {
        !self.enroll_complete_marker.is_empty()
            && response.starts_with(&self.enroll_complete_marker)
    }
}

/// True when every item of a strftime-style `format` is understood by chrono
pub fn is_valid_timestamp_format(format: &str) -> bool {
    StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 5).unwrap()
    }

    #[test]
    fn test_enroll_request_becomes_response() {
        let rules = ExchangeRules::default();
        let response = rules.respond("Enroll request 3", &fixed_time());
        assert_eq!(response, "Enroll response 3 [2026-10-17 09:30:05.000]");
        assert!(rules.is_enrollment_complete(&response));
    }

    #[test]
    fn test_auth_response_does_not_complete_enrollment() {
        let rules = ExchangeRules::default();
        let response = rules.respond("Auth request 1", &fixed_time());
        assert_eq!(response, "Auth response 1 [2026-10-17 09:30:05.000]");
        assert!(!rules.is_enrollment_complete(&response));
    }

    #[test]
    fn test_marker_must_be_a_prefix() {
        let rules = ExchangeRules::default();
        assert!(!rules.is_enrollment_complete("late Enroll response"));
        assert!(!rules.is_enrollment_complete(""));
    }

    #[test]
    fn test_text_without_marker_gets_timestamp_only() {
        let rules = ExchangeRules::default();
        assert_eq!(
            rules.respond("hello", &fixed_time()),
            "hello [2026-10-17 09:30:05.000]"
        );
    }

    #[test]
    fn test_custom_rules() {
        let rules = ExchangeRules {
            request_marker: "REQ".to_string(),
            response_marker: "RSP".to_string(),
            enroll_complete_marker: String::new(),
            timestamp_format: "%H:%M".to_string(),
        };
        assert_eq!(rules.respond("E REQ", &fixed_time()), "E RSP [09:30]");
        assert!(!rules.is_enrollment_complete("E RSP [09:30]"));
    }

    #[test]
    fn test_invalid_timestamp_format_falls_back_to_default() {
        let rules = ExchangeRules {
            timestamp_format: "%Q".to_string(),
            ..ExchangeRules::default()
        };
        assert_eq!(
            rules.respond("Enroll request 3", &fixed_time()),
            "Enroll response 3 [2026-10-17 09:30:05.000]"
        );
    }

    #[test]
    fn test_sanitize_rejects_unknown_items() {
        assert!(is_valid_timestamp_format("%Y-%m-%d %H:%M:%S%.3f"));
        assert!(!is_valid_timestamp_format("%Q"));

        let mut rules = ExchangeRules {
            timestamp_format: "%H:%Q".to_string(),
            ..ExchangeRules::default()
        };
        assert_eq!(rules.sanitize().as_deref(), Some("%H:%Q"));
        assert_eq!(rules, ExchangeRules::default());
        assert_eq!(rules.sanitize(), None);
    }
}
