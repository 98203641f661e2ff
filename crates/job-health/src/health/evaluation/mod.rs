mod condition;
mod priority;

pub(crate) use condition::check_structure;
pub use condition::{evaluate_condition, ConditionOutcome, RuleConfigError};
pub use priority::resolve_priority;

use chrono::Utc;
use tracing::{debug, warn};

use super::domain::{HealthProfile, JobHealthResult, JobId, MetricsSnapshot};

/// Stateless evaluator that applies a health profile to a metrics snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        job_id: &JobId,
        profile: &HealthProfile,
        snapshot: &MetricsSnapshot,
    ) -> JobHealthResult {
        let evaluated_at = Utc::now();
        let mut warnings = Vec::new();
        let mut matched = Vec::new();
        let mut enabled = 0usize;

        for rule in profile.enabled_rules() {
            enabled += 1;
            let outcome = evaluate_condition(rule, snapshot);

            if let Some(error) = outcome.config_error {
                warn!(job_id = %job_id, profile_id = %profile.id, rule_id = %rule.id, "{error}");
                warnings.push(error.to_string());
                continue;
            }

            warnings.extend(outcome.warnings);
            if outcome.matched {
                matched.push((rule, outcome.observed));
            }
        }

        let (color, winner) = resolve_priority(matched.iter().map(|(rule, _)| *rule));
        let winner = winner.map(|index| matched[index]);

        let explanation = match winner {
            Some((rule, Some(value))) => format!(
                "rule '{}' matched: {} (observed {})",
                rule.id,
                rule.describe(),
                value
            ),
            Some((rule, None)) => format!("rule '{}' matched: {}", rule.id, rule.describe()),
            None if enabled == 0 => "profile has no enabled rules".to_string(),
            None => format!("none of {enabled} enabled rule(s) matched"),
        };

        debug!(
            job_id = %job_id,
            profile_id = %profile.id,
            %color,
            matched = matched.len(),
            warnings = warnings.len(),
            "job health evaluated"
        );

        JobHealthResult {
            job_id: job_id.clone(),
            profile_id: profile.id.clone(),
            color,
            matched_rule_id: winner.map(|(rule, _)| rule.id.clone()),
            evaluated_at,
            explanation,
            warnings,
            metrics_available: true,
        }
    }
}
