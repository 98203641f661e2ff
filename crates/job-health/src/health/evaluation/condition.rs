use super::super::domain::{ConditionType, HealthRule, MetricsSnapshot, Operator, RuleId};

const RATE_FLOOR: f64 = 0.0;
const RATE_CEILING: f64 = 100.0;

/// Structural problems that cause a rule to be skipped during evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleConfigError {
    #[error("rule '{rule_id}' skipped: condition '{condition}' requires a stage")]
    MissingStage {
        rule_id: RuleId,
        condition: ConditionType,
    },
    #[error("rule '{rule_id}' skipped: operator 'between' requires maxValue")]
    MissingMaxValue { rule_id: RuleId },
    #[error("rule '{rule_id}' skipped: negative threshold {value} on count metric '{condition}'")]
    NegativeThreshold {
        rule_id: RuleId,
        condition: ConditionType,
        value: f64,
    },
    #[error("rule '{rule_id}' skipped: thresholds must be finite numbers")]
    NonFiniteThreshold { rule_id: RuleId },
}

impl RuleConfigError {
    pub fn rule_id(&self) -> &RuleId {
        match self {
            RuleConfigError::MissingStage { rule_id, .. }
            | RuleConfigError::MissingMaxValue { rule_id }
            | RuleConfigError::NegativeThreshold { rule_id, .. }
            | RuleConfigError::NonFiniteThreshold { rule_id } => rule_id,
        }
    }
}

/// Result of checking a single rule against a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionOutcome {
    pub matched: bool,
    pub observed: Option<f64>,
    pub config_error: Option<RuleConfigError>,
    pub warnings: Vec<String>,
}

impl ConditionOutcome {
    fn skipped(error: RuleConfigError) -> Self {
        Self {
            matched: false,
            observed: None,
            config_error: Some(error),
            warnings: Vec::new(),
        }
    }
}

/// Evaluate one rule's condition. Misconfigured rules never match.
pub fn evaluate_condition(rule: &HealthRule, snapshot: &MetricsSnapshot) -> ConditionOutcome {
    if let Err(error) = check_structure(rule) {
        return ConditionOutcome::skipped(error);
    }

    let mut warnings = Vec::new();
    if rule.condition == ConditionType::DisqualificationRate {
        let max_value = rule.max_value.filter(|_| rule.operator == Operator::Between);
        let thresholds = std::iter::once(rule.value).chain(max_value);
        for threshold in thresholds {
            if !(RATE_FLOOR..=RATE_CEILING).contains(&threshold) {
                warnings.push(format!(
                    "rule '{}': disqualification_rate threshold {} is outside 0-100",
                    rule.id, threshold
                ));
            }
        }
    }

    let Some(observed) = resolve_metric(rule, snapshot) else {
        // check_structure guarantees the stage for stage-scoped conditions
        return ConditionOutcome::skipped(RuleConfigError::MissingStage {
            rule_id: rule.id.clone(),
            condition: rule.condition,
        });
    };

    let matched = match (rule.operator, rule.max_value) {
        (Operator::Gt, _) => observed > rule.value,
        (Operator::Lt, _) => observed < rule.value,
        (Operator::Eq, _) => observed == rule.value,
        (Operator::Between, Some(max)) => {
            let (low, high) = if rule.value <= max {
                (rule.value, max)
            } else {
                (max, rule.value)
            };
            low <= observed && observed <= high
        }
        (Operator::Between, None) => false,
    };

    ConditionOutcome {
        matched,
        observed: Some(observed),
        config_error: None,
        warnings,
    }
}

pub(crate) fn check_structure(rule: &HealthRule) -> Result<(), RuleConfigError> {
    if rule.condition.requires_stage() && rule.stage_name().is_none() {
        return Err(RuleConfigError::MissingStage {
            rule_id: rule.id.clone(),
            condition: rule.condition,
        });
    }

    if rule.operator == Operator::Between && rule.max_value.is_none() {
        return Err(RuleConfigError::MissingMaxValue {
            rule_id: rule.id.clone(),
        });
    }

    let max_value = rule.max_value.filter(|_| rule.operator == Operator::Between);
    for threshold in std::iter::once(rule.value).chain(max_value) {
        if !threshold.is_finite() {
            return Err(RuleConfigError::NonFiniteThreshold {
                rule_id: rule.id.clone(),
            });
        }
        if rule.condition.is_count() && threshold < 0.0 {
            return Err(RuleConfigError::NegativeThreshold {
                rule_id: rule.id.clone(),
                condition: rule.condition,
                value: threshold,
            });
        }
    }

    Ok(())
}

fn resolve_metric(rule: &HealthRule, snapshot: &MetricsSnapshot) -> Option<f64> {
    let value = match rule.condition {
        ConditionType::CandidatesTotal => f64::from(snapshot.candidates_total),
        ConditionType::CandidatesAtStage => f64::from(snapshot.candidates_at(rule.stage_name()?)),
        ConditionType::TimeInStage => f64::from(snapshot.days_in(rule.stage_name()?)),
        ConditionType::DaysSinceContact => f64::from(snapshot.days_since_last_client_contact),
        ConditionType::DisqualificationRate => snapshot
            .disqualification_rate_percent
            .clamp(RATE_FLOOR, RATE_CEILING),
        ConditionType::DaysOpen => f64::from(snapshot.days_open),
    };
    Some(value)
}
