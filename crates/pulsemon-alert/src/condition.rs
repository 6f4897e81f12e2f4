use crate::error::AlertError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Comparison applied as `value <op> threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
}

impl AlertCondition {
    pub const ALL: [AlertCondition; 5] = [Self::Gt, Self::Lt, Self::Gte, Self::Lte, Self::Eq];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Eq => "eq",
        }
    }

    /// `Eq` is exact floating-point equality, with no tolerance.
    #[allow(clippy::float_cmp)]
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Gte => value >= threshold,
            Self::Lte => value <= threshold,
            Self::Eq => value == threshold,
        }
    }
}

impl FromStr for AlertCondition {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gt" => Ok(Self::Gt),
            "lt" => Ok(Self::Lt),
            "gte" => Ok(Self::Gte),
            "lte" => Ok(Self::Lte),
            "eq" => Ok(Self::Eq),
            _ => Err(AlertError::UnknownCondition(s.to_string())),
        }
    }
}

impl std::fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluates a stored condition string. Unknown conditions never match.
///
/// # Examples
///
/// ```
/// use pulsemon_alert::evaluate_condition;
///
/// assert!(evaluate_condition("gte", 90.0, 90.0));
/// assert!(!evaluate_condition("gt", 90.0, 90.0));
/// assert!(!evaluate_condition("between", 1.0, 1.0));
/// ```
pub fn evaluate_condition(condition: &str, value: f64, threshold: f64) -> bool {
    condition
        .parse::<AlertCondition>()
        .map(|c| c.check(value, threshold))
        .unwrap_or(false)
}
