use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::RuleError;

/// How a temporary grant's end is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporaryAccessMode {
    /// End is start plus a duration range.
    Relative,
}

impl TemporaryAccessMode {
    /// Returns a stable storage value for this mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relative => "relative",
        }
    }
}

impl FromStr for TemporaryAccessMode {
    type Err = RuleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "relative" => Ok(Self::Relative),
            _ => Err(RuleError::InvalidTemporaryAccess(format!(
                "unknown temporary mode '{value}'"
            ))),
        }
    }
}

/// Parses a temporary range such as `30m`, `1h`, `7d` or `1w`.
pub fn parse_temporary_range(range: &str) -> Result<Duration, RuleError> {
    let parsed = humantime::parse_duration(range.trim()).map_err(|error| {
        RuleError::InvalidTemporaryAccess(format!("invalid range '{range}': {error}"))
    })?;

    Duration::from_std(parsed).map_err(|error| {
        RuleError::InvalidTemporaryAccess(format!("range '{range}' is out of bounds: {error}"))
    })
}

/// Half-open validity window `[starts_at, ends_at)` of a temporary grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryAccessWindow {
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl TemporaryAccessWindow {
    /// Creates a window; the end must be after the start.
    pub fn new(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<Self, RuleError> {
        if ends_at <= starts_at {
            return Err(RuleError::InvalidTemporaryAccess(format!(
                "window ends at {ends_at} which is not after its start {starts_at}"
            )));
        }

        Ok(Self { starts_at, ends_at })
    }

    /// Creates a window lasting `range` from `starts_at`.
    pub fn relative(starts_at: DateTime<Utc>, range: &str) -> Result<Self, RuleError> {
        let length = parse_temporary_range(range)?;
        let ends_at = starts_at.checked_add_signed(length).ok_or_else(|| {
            RuleError::InvalidTemporaryAccess(format!("range '{range}' overflows the clock"))
        })?;

        Self::new(starts_at, ends_at)
    }

    /// Returns the inclusive start.
    #[must_use]
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    /// Returns the exclusive end.
    #[must_use]
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    /// Returns whether `now` falls inside the window. No grace period.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }
}

/// Lifetime of a role assignment or additional privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessGrant {
    /// Active until revoked.
    Permanent,
    /// Active only inside the window.
    Temporary(TemporaryAccessWindow),
}

impl AccessGrant {
    /// Builds a grant from stored temporary-access columns.
    ///
    /// An explicit end takes precedence over `start + range`.
    pub fn from_parts(
        is_temporary: bool,
        mode: Option<&str>,
        range: Option<&str>,
        starts_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
    ) -> Result<Self, RuleError> {
        if !is_temporary {
            return Ok(Self::Permanent);
        }

        if let Some(mode) = mode {
            TemporaryAccessMode::from_str(mode)?;
        }

        let starts_at = starts_at.ok_or_else(|| {
            RuleError::InvalidTemporaryAccess("temporary grant has no start time".to_owned())
        })?;

        let window = match (ends_at, range) {
            (Some(ends_at), _) => TemporaryAccessWindow::new(starts_at, ends_at)?,
            (None, Some(range)) => TemporaryAccessWindow::relative(starts_at, range)?,
            (None, None) => {
                return Err(RuleError::InvalidTemporaryAccess(
                    "temporary grant has neither a range nor an end time".to_owned(),
                ));
            }
        };

        Ok(Self::Temporary(window))
    }

    /// Returns whether the grant is active at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Permanent => true,
            Self::Temporary(window) => window.is_active_at(now),
        }
    }

    /// Returns whether the grant is time-bound.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{AccessGrant, TemporaryAccessWindow, parse_temporary_range};

    fn start() -> chrono::DateTime<Utc> {
        match Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single() {
            Some(value) => value,
            None => panic!("valid timestamp"),
        }
    }

    #[test]
    fn ranges_parse_common_units() {
        assert_eq!(parse_temporary_range("30m"), Ok(Duration::minutes(30)));
        assert_eq!(parse_temporary_range("1h"), Ok(Duration::hours(1)));
        assert_eq!(parse_temporary_range("7d"), Ok(Duration::days(7)));
        assert_eq!(parse_temporary_range("1w"), Ok(Duration::weeks(1)));
        assert!(parse_temporary_range("soon").is_err());
    }

    #[test]
    fn relative_window_expires_strictly_at_end() {
        let Ok(window) = TemporaryAccessWindow::relative(start(), "1h") else {
            panic!("window should build");
        };

        assert!(window.is_active_at(start()));
        assert!(window.is_active_at(start() + Duration::minutes(30)));
        assert!(!window.is_active_at(start() + Duration::hours(1)));
        assert!(!window.is_active_at(start() + Duration::minutes(61)));
        assert!(!window.is_active_at(start() - Duration::seconds(1)));
    }

    #[test]
    fn explicit_end_takes_precedence_over_range() {
        let grant = AccessGrant::from_parts(
            true,
            Some("relative"),
            Some("7d"),
            Some(start()),
            Some(start() + Duration::minutes(10)),
        );

        let Ok(grant) = grant else {
            panic!("grant should build");
        };
        assert!(grant.is_active_at(start() + Duration::minutes(5)));
        assert!(!grant.is_active_at(start() + Duration::minutes(11)));
    }

    #[test]
    fn incomplete_temporary_grant_is_rejected() {
        assert!(AccessGrant::from_parts(true, None, Some("1h"), None, None).is_err());
        assert!(AccessGrant::from_parts(true, None, None, Some(start()), None).is_err());
        assert!(AccessGrant::from_parts(true, Some("sliding"), Some("1h"), Some(start()), None).is_err());
        assert!(AccessGrant::from_parts(true, None, None, Some(start()), Some(start())).is_err());
    }

    #[test]
    fn permanent_grant_ignores_temporary_columns() {
        let grant = AccessGrant::from_parts(false, None, Some("garbage"), None, None);
        assert!(matches!(grant, Ok(AccessGrant::Permanent)));
    }
}
