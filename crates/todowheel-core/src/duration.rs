use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("duration is empty")]
    Empty,
    #[error("invalid duration amount: {0}")]
    InvalidAmount(String),
    #[error("duration must be a positive number")]
    NonPositive,
    #[error("unknown duration unit: {0} (expected minutes, hours or days)")]
    UnknownUnit(String),
    #[error("duration is too large")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Minutes,
    Hours,
    Days,
}

impl DurationUnit {
    pub fn minutes(self) -> u32 {
        match self {
            Self::Minutes => 1,
            Self::Hours => 60,
            Self::Days => 24 * 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        }
    }

    fn label(self, amount: u32) -> &'static str {
        match (self, amount) {
            (Self::Minutes, 1) => "minute",
            (Self::Hours, 1) => "hour",
            (Self::Days, 1) => "day",
            (unit, _) => unit.as_str(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "m" | "min" | "mins" | "minute" | "minutes" => Some(Self::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(Self::Hours),
            "d" | "day" | "days" => Some(Self::Days),
            _ => None,
        }
    }
}

/// Estimated time for a task, stored in minutes alongside the unit it was
/// entered with so it displays back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDuration {
    pub minutes: u32,
    pub unit: DurationUnit,
}

impl TaskDuration {
    pub fn new(amount: u32, unit: DurationUnit) -> Result<Self, DurationError> {
        if amount == 0 {
            return Err(DurationError::NonPositive);
        }
        let minutes = amount
            .checked_mul(unit.minutes())
            .ok_or(DurationError::Overflow)?;
        Ok(Self { minutes, unit })
    }

    /// Builds a duration from separate amount and unit inputs, e.g. `"2"` and
    /// `"hours"`.
    pub fn from_parts(amount: &str, unit: &str) -> Result<Self, DurationError> {
        let unit = DurationUnit::parse(unit)
            .ok_or_else(|| DurationError::UnknownUnit(unit.trim().to_string()))?;
        Self::new(parse_amount(amount)?, unit)
    }

    /// Amount in the display unit, when the stored minutes divide evenly.
    pub fn amount(&self) -> Option<u32> {
        let factor = self.unit.minutes();
        (self.minutes % factor == 0).then_some(self.minutes / factor)
    }
}

impl fmt::Display for TaskDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.amount() {
            Some(amount) => write!(f, "{amount} {}", self.unit.label(amount)),
            None => write!(
                f,
                "{} {}",
                self.minutes,
                DurationUnit::Minutes.label(self.minutes)
            ),
        }
    }
}

impl FromStr for TaskDuration {
    type Err = DurationError;

    /// Parses free-form input such as `30 mins`, `2h` or `45`. A bare number
    /// is read as minutes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DurationError::Empty);
        }

        let caps = duration_re()
            .and_then(|re| re.captures(trimmed))
            .ok_or_else(|| DurationError::InvalidAmount(trimmed.to_string()))?;
        let amount = caps.name("amount").map_or("", |m| m.as_str());
        match caps.name("unit") {
            Some(unit) => Self::from_parts(amount, unit.as_str()),
            None => Self::new(parse_amount(amount)?, DurationUnit::Minutes),
        }
    }
}

fn parse_amount(raw: &str) -> Result<u32, DurationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(DurationError::NonPositive);
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| DurationError::InvalidAmount(trimmed.to_string()))
}

fn duration_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<amount>-?\d+)\s*(?P<unit>[A-Za-z]+)?$").ok())
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::{DurationError, DurationUnit, TaskDuration};

    #[test]
    fn two_hours_normalizes_to_minutes_and_displays_back() {
        let duration = TaskDuration::from_parts("2", "hours").expect("valid duration");
        assert_eq!(duration.minutes, 120);
        assert_eq!(duration.unit, DurationUnit::Hours);
        assert_eq!(duration.to_string(), "2 hours");
    }

    #[test]
    fn singular_units_read_naturally() {
        let duration = TaskDuration::from_parts("1", "hour").expect("valid duration");
        assert_eq!(duration.to_string(), "1 hour");
        let day: TaskDuration = "1d".parse().expect("valid duration");
        assert_eq!(day.minutes, 1440);
        assert_eq!(day.to_string(), "1 day");
    }

    #[test]
    fn free_form_inputs_parse() {
        let mins: TaskDuration = "30 mins".parse().expect("valid duration");
        assert_eq!(mins.minutes, 30);
        assert_eq!(mins.to_string(), "30 minutes");

        let bare: TaskDuration = " 45 ".parse().expect("valid duration");
        assert_eq!(bare.unit, DurationUnit::Minutes);
        assert_eq!(bare.minutes, 45);
    }

    #[test]
    fn rejects_zero_negative_and_unknown_units() {
        assert_eq!(
            TaskDuration::from_parts("0", "hours"),
            Err(DurationError::NonPositive)
        );
        assert_eq!(
            "-3 hours".parse::<TaskDuration>(),
            Err(DurationError::NonPositive)
        );
        assert_eq!(
            TaskDuration::from_parts("3", "fortnights"),
            Err(DurationError::UnknownUnit("fortnights".to_string()))
        );
        assert_eq!("".parse::<TaskDuration>(), Err(DurationError::Empty));
        assert!(matches!(
            "soon".parse::<TaskDuration>(),
            Err(DurationError::InvalidAmount(_))
        ));
    }

    #[test]
    fn uneven_minutes_fall_back_to_minutes_display() {
        let odd = TaskDuration {
            minutes: 90,
            unit: DurationUnit::Hours,
        };
        assert_eq!(odd.amount(), None);
        assert_eq!(odd.to_string(), "90 minutes");
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(
            TaskDuration::new(u32::MAX, DurationUnit::Days),
            Err(DurationError::Overflow)
        );
    }
}
