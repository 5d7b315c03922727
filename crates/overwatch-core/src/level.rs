//! Notification severity levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LevelParseError;

/// The severity of a notification.
///
/// Levels are totally ordered: `Debug < Info < Warn < Error`. The dispatcher
/// compares a notification's level against the configured minimum with this
/// ordering.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// Chatter, useful only while debugging a cluster.
    Debug,
    /// Normal lifecycle activity.
    Info,
    /// Something degraded that should be looked at.
    Warn,
    /// Something broken. Also the level for unrecognized reasons.
    #[default]
    Error,
}

impl Level {
    /// All levels in ascending order.
    pub const ALL: [Self; 4] = [Self::Debug, Self::Info, Self::Warn, Self::Error];

    /// Returns the level as its canonical upper-case string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    /// Returns true if a notification at this level passes a `minimum` threshold.
    #[must_use]
    pub fn meets(self, minimum: Self) -> bool {
        self >= minimum
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            _ => Err(LevelParseError {
                input: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn ordering_is_ascending_severity() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test_case("DEBUG", Level::Debug ; "upper debug")]
    #[test_case("info", Level::Info ; "lower info")]
    #[test_case("Warn", Level::Warn ; "mixed warn")]
    #[test_case("warning", Level::Warn ; "warning alias")]
    #[test_case(" ERROR ", Level::Error ; "padded error")]
    fn parse_level(input: &str, expected: Level) {
        assert_eq!(input.parse::<Level>().unwrap(), expected);
    }

    #[test]
    fn parse_unknown_level_fails() {
        let err = "CRITICAL".parse::<Level>().unwrap_err();
        assert_eq!(err.to_string(), "unknown level: CRITICAL");
    }

    #[test]
    fn display_round_trips_through_parse() {
        for level in Level::ALL {
            assert_eq!(level.to_string().parse::<Level>().unwrap(), level);
        }
    }

    #[test]
    fn meets_threshold() {
        assert!(Level::Warn.meets(Level::Warn));
        assert!(Level::Error.meets(Level::Warn));
        assert!(!Level::Info.meets(Level::Warn));
        assert!(Level::Debug.meets(Level::Debug));
    }

    #[test]
    fn default_is_error() {
        assert_eq!(Level::default(), Level::Error);
    }

    #[test]
    fn serde_uses_upper_case() {
        let json = serde_json::to_string(&Level::Warn).unwrap();
        assert_eq!(json, "\"WARN\"");
        let parsed: Level = serde_json::from_str("\"INFO\"").unwrap();
        assert_eq!(parsed, Level::Info);
    }
}
