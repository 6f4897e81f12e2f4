use chrono::{DateTime, Utc};
use pulsemon_alert::{plan_transition, EvaluationSummary, RuleState, Transition};
use pulsemon_common::types::AlertEventType;
use pulsemon_notify::{deliver, NotificationChannel};
use pulsemon_storage::{AlertConfigRow, MonitorStore, NewAlertEvent};
use std::sync::Arc;

/// Applies alert rule transitions through the store and notifier.
pub struct AlertEvaluator {
    store: Arc<MonitorStore>,
    notifier: Arc<dyn NotificationChannel>,
}

impl AlertEvaluator {
    pub fn new(store: Arc<MonitorStore>, notifier: Arc<dyn NotificationChannel>) -> Self {
        Self { store, notifier }
    }

    pub async fn evaluate_alerts(&self) -> EvaluationSummary {
        self.evaluate_at(Utc::now()).await
    }

    /// Evaluates every enabled rule against its latest metric value.
    ///
    /// Rules are processed one after another; a failing rule is logged and
    /// the remaining rules still run.
    pub async fn evaluate_at(&self, now: DateTime<Utc>) -> EvaluationSummary {
        let mut summary = EvaluationSummary::default();

        let rules = match self.store.list_enabled_alert_configs().await {
            Ok(rules) => rules,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load alert rules");
                return summary;
            }
        };

        for rule in &rules {
            match self.evaluate_rule(rule, now).await {
                Ok(transition) => summary.record(&transition),
                Err(e) => {
                    tracing::error!(
                        rule_id = %rule.id,
                        rule = %rule.name,
                        error = %e,
                        "Alert rule evaluation failed"
                    );
                }
            }
        }

        tracing::info!(
            evaluated = summary.evaluated,
            skipped = summary.skipped,
            fired = summary.fired,
            resolved = summary.resolved,
            "Alert evaluation completed"
        );
        summary
    }

    async fn evaluate_rule(
        &self,
        rule: &AlertConfigRow,
        now: DateTime<Utc>,
    ) -> pulsemon_storage::Result<Transition> {
        let latest = self
            .store
            .latest_metric(&rule.metric_key)
            .await?
            .map(|m| m.value);
        let transition = plan_transition(&rule_state(rule), latest, now);

        match &transition {
            Transition::NoData | Transition::Steady => {}
            Transition::Breach { count, fire: None } => {
                self.store.set_breach_count(&rule.id, *count).await?;
            }
            Transition::Breach {
                count,
                fire: Some(fired),
            } => {
                let event = NewAlertEvent {
                    alert_config_id: rule.id.clone(),
                    event_type: AlertEventType::Fired,
                    metric_key: rule.metric_key.clone(),
                    metric_value: fired.value,
                    threshold: rule.threshold,
                    message: Some(fired.message.clone()),
                };
                self.store
                    .record_alert_fired(&rule.id, *count, &event, now)
                    .await?;
                tracing::warn!(rule = %rule.name, value = fired.value, "Alert fired");
                deliver(self.notifier.as_ref(), &fired.notice).await;
            }
            Transition::Reset { resolve: None } => {
                self.store.set_breach_count(&rule.id, 0).await?;
            }
            Transition::Reset {
                resolve: Some(resolved),
            } => {
                let event = NewAlertEvent {
                    alert_config_id: rule.id.clone(),
                    event_type: AlertEventType::Resolved,
                    metric_key: rule.metric_key.clone(),
                    metric_value: resolved.value,
                    threshold: rule.threshold,
                    message: Some(resolved.message.clone()),
                };
                self.store
                    .record_alert_resolved(&rule.id, &event, now)
                    .await?;
                tracing::info!(rule = %rule.name, value = resolved.value, "Alert resolved");
                deliver(self.notifier.as_ref(), &resolved.notice).await;
            }
        }

        Ok(transition)
    }
}

fn rule_state(row: &AlertConfigRow) -> RuleState {
    RuleState {
        name: row.name.clone(),
        metric_key: row.metric_key.clone(),
        condition: row.condition.clone(),
        threshold: row.threshold,
        consecutive_breaches: row.consecutive_breaches,
        cooldown_seconds: row.cooldown_seconds,
        slack_channel: row.slack_channel.clone(),
        current_breach_count: row.current_breach_count,
        last_fired_at: row.last_fired_at,
    }
}
