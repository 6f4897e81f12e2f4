//! Alert rule evaluation.
//!
//! Rules compare the latest value of one metric against a threshold. A rule
//! must breach on `consecutive_breaches` evaluation cycles in a row before it
//! fires, may not fire again until its cooldown has elapsed, and emits a
//! resolution once the condition clears after having fired.
//!
//! Everything in this crate is pure. [`plan_transition`] decides what should
//! happen to a rule for one cycle; the caller persists the new state and
//! delivers the resulting [`AlertNotice`](pulsemon_common::types::AlertNotice).

pub mod condition;
pub mod error;
pub mod transition;


pub use condition::{evaluate_condition, AlertCondition};
pub use error::{AlertError, Result};
pub use transition::{
    plan_transition, EvaluationSummary, FiredAlert, ResolvedAlert, RuleState, Transition,
};
