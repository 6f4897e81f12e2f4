use crate::condition::evaluate_condition;
use chrono::{DateTime, Duration, Utc};
use pulsemon_common::types::{AlertEventType, AlertNotice, NoticeField};
use serde::Serialize;

/// The slice of a stored rule that evaluation reads.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleState {
    pub name: String,
    pub metric_key: String,
    pub condition: String,
    pub threshold: f64,
    pub consecutive_breaches: i32,
    pub cooldown_seconds: i64,
    pub slack_channel: Option<String>,
    pub current_breach_count: i32,
    pub last_fired_at: Option<DateTime<Utc>>,
}

impl RuleState {
    /// Breaches required before firing. Stored values below 1 behave as 1.
    pub fn required_breaches(&self) -> i32 {
        self.consecutive_breaches.max(1)
    }

    /// `true` while `last_fired_at` is within the cooldown window. A cooldown
    /// too large for `Duration` never elapses.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.last_fired_at.is_some_and(|last| {
            Duration::try_seconds(self.cooldown_seconds)
                .map_or(true, |cooldown| now - last < cooldown)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FiredAlert {
    pub value: f64,
    pub message: String,
    pub notice: AlertNotice,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAlert {
    pub value: f64,
    pub message: String,
    pub notice: AlertNotice,
}

/// What one evaluation cycle does to a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// No metric value yet; the rule is left untouched.
    NoData,
    /// Condition false and nothing to reset.
    Steady,
    /// Condition true. `count` is the new breach count; `fire` is set when
    /// the threshold is met and the cooldown permits.
    Breach { count: i32, fire: Option<FiredAlert> },
    /// Condition false after at least one breach. `resolve` is set only if
    /// the rule has fired before.
    Reset { resolve: Option<ResolvedAlert> },
}

/// Plans the next state of `rule` given the latest metric value.
///
/// Re-fires on every breaching cycle once the cooldown has elapsed.
pub fn plan_transition(rule: &RuleState, latest: Option<f64>, now: DateTime<Utc>) -> Transition {
    let Some(value) = latest else {
        return Transition::NoData;
    };

    if evaluate_condition(&rule.condition, value, rule.threshold) {
        let required = rule.required_breaches();
        let count = rule
            .current_breach_count
            .max(0)
            .saturating_add(1)
            .min(required);

        let fire = (count >= required && !rule.in_cooldown(now))
            .then(|| fired(rule, value, count, now));
        return Transition::Breach { count, fire };
    }

    if rule.current_breach_count == 0 {
        return Transition::Steady;
    }

    let resolve = rule.last_fired_at.map(|_| resolved(rule, value, now));
    Transition::Reset { resolve }
}

fn fired(rule: &RuleState, value: f64, count: i32, now: DateTime<Utc>) -> FiredAlert {
    let message = format!(
        "Alert: {} — {} is {} (threshold: {} {})",
        rule.name, rule.metric_key, value, rule.condition, rule.threshold
    );
    let notice = AlertNotice {
        kind: AlertEventType::Fired,
        text: message.clone(),
        fields: vec![
            field("Metric", rule.metric_key.clone()),
            field("Value", value.to_string()),
            field("Threshold", format!("{} {}", rule.condition, rule.threshold)),
            field("Breaches", count.to_string()),
        ],
        channel: rule.slack_channel.clone(),
        timestamp: now,
    };
    FiredAlert {
        value,
        message,
        notice,
    }
}

fn resolved(rule: &RuleState, value: f64, now: DateTime<Utc>) -> ResolvedAlert {
    let message = format!(
        "Resolved: {} — {} is now {}",
        rule.name, rule.metric_key, value
    );
    let notice = AlertNotice {
        kind: AlertEventType::Resolved,
        text: message.clone(),
        fields: vec![
            field("Metric", rule.metric_key.clone()),
            field("Value", value.to_string()),
        ],
        channel: rule.slack_channel.clone(),
        timestamp: now,
    };
    ResolvedAlert {
        value,
        message,
        notice,
    }
}

fn field(title: &str, value: String) -> NoticeField {
    NoticeField {
        title: title.to_string(),
        value,
        short: true,
    }
}

/// Per-cycle counters reported by the evaluator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationSummary {
    pub evaluated: usize,
    pub skipped: usize,
    pub fired: usize,
    pub resolved: usize,
}

impl EvaluationSummary {
    pub fn record(&mut self, transition: &Transition) {
        match transition {
            Transition::NoData => self.skipped += 1,
            Transition::Steady => self.evaluated += 1,
            Transition::Breach { fire, .. } => {
                self.evaluated += 1;
                if fire.is_some() {
                    self.fired += 1;
                }
            }
            Transition::Reset { resolve } => {
                self.evaluated += 1;
                if resolve.is_some() {
                    self.resolved += 1;
                }
            }
        }
    }
}
