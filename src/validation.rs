use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use validator::Validate;

use crate::error::{GateError, Result};
use crate::summary::{week_start_of, DATE_FORMAT};

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"));

/// Request validation utilities
pub struct RequestValidator;

impl RequestValidator {
    /// Run `validator` rules on a request body
    pub fn validate_payload<T: Validate>(payload: &T) -> Result<()> {
        payload
            .validate()
            .map_err(|e| GateError::InvalidRequest(e.to_string()))
    }

    /// Parse a strict `YYYY-MM-DD` date, falling back to `default` when absent
    pub fn parse_date(raw: Option<&str>, default: NaiveDate) -> Result<NaiveDate> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(default),
            Some(raw) => raw,
        };

        if !DATE_PATTERN.is_match(raw) {
            return Err(GateError::InvalidRequest(
                "Invalid date format. Use YYYY-MM-DD".to_string(),
            ));
        }

        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|_| GateError::InvalidRequest(format!("Invalid date: {}", raw)))
    }

    /// An explicit `start` is used as given; otherwise the Monday of `today`'s week
    pub fn week_start(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate> {
        Self::parse_date(raw, week_start_of(today))
    }
}
