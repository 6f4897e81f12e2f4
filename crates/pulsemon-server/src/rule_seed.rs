use pulsemon_alert::AlertCondition;
use pulsemon_storage::{MonitorStore, NewAlertConfig};
use serde::Serialize;

use crate::config::RulesSeedFile;

/// Upper bound for `cooldownSeconds`: one year.
pub const MAX_COOLDOWN_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedOutcome {
    pub created: u32,
    pub skipped: u32,
}

/// Checks the fields the evaluator depends on. Returns a message suitable
/// for a 400 response.
pub fn validate_rule(rule: &NewAlertConfig) -> Result<(), String> {
    if rule.name.trim().is_empty() {
        return Err("name must not be empty".to_string());
    }
    if rule.metric_key.trim().is_empty() {
        return Err("metricKey must not be empty".to_string());
    }
    if rule.condition.parse::<AlertCondition>().is_err() {
        return Err(format!(
            "condition must be one of gt, lt, gte, lte, eq (got '{}')",
            rule.condition
        ));
    }
    if !rule.threshold.is_finite() {
        return Err("threshold must be a finite number".to_string());
    }
    if rule.consecutive_breaches.is_some_and(|n| n < 1) {
        return Err("consecutiveBreaches must be at least 1".to_string());
    }
    if let Some(cooldown) = rule.cooldown_seconds {
        check_cooldown(cooldown)?;
    }
    Ok(())
}

pub fn check_cooldown(cooldown_seconds: i64) -> Result<(), String> {
    if cooldown_seconds < 0 {
        return Err("cooldownSeconds must not be negative".to_string());
    }
    if cooldown_seconds > MAX_COOLDOWN_SECONDS {
        return Err(format!(
            "cooldownSeconds must not exceed {MAX_COOLDOWN_SECONDS}"
        ));
    }
    Ok(())
}

/// Creates the rules in `seed`, skipping names that already exist and
/// rules that fail validation.
pub async fn init_rules_from_seed(
    store: &MonitorStore,
    seed: &RulesSeedFile,
) -> pulsemon_storage::Result<SeedOutcome> {
    let mut outcome = SeedOutcome::default();

    for r in &seed.rules {
        if store.find_alert_config_by_name(&r.name).await?.is_some() {
            tracing::warn!(name = %r.name, "Alert rule already exists, skipping");
            outcome.skipped += 1;
            continue;
        }

        let new = NewAlertConfig {
            name: r.name.clone(),
            metric_key: r.metric_key.clone(),
            condition: r.condition.clone(),
            threshold: r.threshold,
            consecutive_breaches: r.consecutive_breaches,
            cooldown_seconds: r.cooldown_seconds,
            slack_channel: r.slack_channel.clone(),
            enabled: Some(r.enabled),
        };
        if let Err(msg) = validate_rule(&new) {
            tracing::warn!(name = %r.name, reason = %msg, "Invalid alert rule in seed, skipping");
            outcome.skipped += 1;
            continue;
        }

        let created = store.create_alert_config(&new).await?;
        tracing::info!(name = %created.name, id = %created.id, "Alert rule created");
        outcome.created += 1;
    }

    tracing::info!(
        created = outcome.created,
        skipped = outcome.skipped,
        "init-rules completed"
    );
    Ok(outcome)
}
