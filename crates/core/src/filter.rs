use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LocolError, Result};
use crate::time::parse_time_or_relative;

/// Optional half-open `[since, until)` bound on record time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn all() -> Self {
        Self {
            since: None,
            until: None,
        }
    }

    pub fn parse(since: Option<&str>, until: Option<&str>) -> Result<Self> {
        let window = Self {
            since: since.map(parse_time_or_relative).transpose()?,
            until: until.map(parse_time_or_relative).transpose()?,
        };
        if let (Some(s), Some(u)) = (window.since, window.until) {
            if s > u {
                return Err(LocolError::InvalidArgument(format!(
                    "since ({s}) is after until ({u})"
                )));
            }
        }
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_unbounded() {
        let w = TimeWindow::all();
        assert_eq!(w, TimeWindow::default());
        assert!(w.since.is_none() && w.until.is_none());
    }

    #[test]
    fn parses_both_bounds() {
        let w = TimeWindow::parse(Some("2026-01-01T00:00:00Z"), Some("2026-01-02T00:00:00Z"))
            .unwrap();
        assert_eq!(w.since.unwrap().to_rfc3339(), "2026-01-01T00:00:00+00:00");
        assert_eq!(w.until.unwrap().to_rfc3339(), "2026-01-02T00:00:00+00:00");
    }

    #[test]
    fn rejects_inverted_window() {
        let err = TimeWindow::parse(Some("2026-01-02T00:00:00Z"), Some("2026-01-01T00:00:00Z"))
            .unwrap_err();
        assert!(matches!(err, LocolError::InvalidArgument(_)));
    }
}
