use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unit a poll duration is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollDurationUnit {
    Hours,
    Days,
    Weeks,
}

impl PollDurationUnit {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Weeks => "weeks",
        }
    }
}

impl fmt::Display for PollDurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PollDurationUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hours" => Ok(Self::Hours),
            "days" => Ok(Self::Days),
            "weeks" => Ok(Self::Weeks),
            _ => Err(format!("Invalid poll duration type: {s}")),
        }
    }
}

/// How long a poll stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDuration {
    unit: PollDurationUnit,
    length: u32,
}

impl PollDuration {
    /// Build a duration; the length must be positive.
    pub fn new(unit: PollDurationUnit, length: u32) -> Result<Self, String> {
        if length == 0 {
            return Err("Poll duration length must be positive".to_string());
        }
        Ok(Self { unit, length })
    }

    #[must_use]
    pub fn unit(&self) -> PollDurationUnit {
        self.unit
    }

    #[must_use]
    pub fn length(&self) -> u32 {
        self.length
    }
}
