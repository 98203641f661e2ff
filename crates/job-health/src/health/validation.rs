use std::collections::HashSet;

use super::domain::{ConditionType, HealthProfile, HealthRule, Operator, ProfileId, RuleId};
use super::evaluation::{check_structure, RuleConfigError};

/// Save-time validation errors. The engine itself stays permissive and skips bad rules.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileValidationError {
    #[error("profile id must not be empty")]
    MissingProfileId,
    #[error("profile '{0}' must have a name")]
    MissingName(ProfileId),
    #[error("profile '{0}' contains a rule without an id")]
    MissingRuleId(ProfileId),
    #[error("profile '{profile_id}' contains duplicate rule id '{rule_id}'")]
    DuplicateRuleId {
        profile_id: ProfileId,
        rule_id: RuleId,
    },
    #[error(transparent)]
    Rule(#[from] RuleConfigError),
    #[error("rule '{rule_id}' has an inverted range ({value} > {max_value})")]
    InvertedRange {
        rule_id: RuleId,
        value: f64,
        max_value: f64,
    },
    #[error("rule '{rule_id}' sets a disqualification rate threshold of {value} outside 0-100")]
    RateOutOfRange { rule_id: RuleId, value: f64 },
}

/// Validate a profile before it is persisted.
pub fn validate_profile(profile: &HealthProfile) -> Result<(), ProfileValidationError> {
    if profile.id.0.trim().is_empty() {
        return Err(ProfileValidationError::MissingProfileId);
    }

    if profile.name.trim().is_empty() {
        return Err(ProfileValidationError::MissingName(profile.id.clone()));
    }

    let mut seen = HashSet::new();
    for rule in &profile.rules {
        if rule.id.0.trim().is_empty() {
            return Err(ProfileValidationError::MissingRuleId(profile.id.clone()));
        }
        if !seen.insert(&rule.id) {
            return Err(ProfileValidationError::DuplicateRuleId {
                profile_id: profile.id.clone(),
                rule_id: rule.id.clone(),
            });
        }
        validate_rule(rule)?;
    }

    Ok(())
}

/// Validate a single rule, regardless of whether it is enabled.
pub fn validate_rule(rule: &HealthRule) -> Result<(), ProfileValidationError> {
    check_structure(rule)?;

    // maxValue only carries meaning for `between`; elsewhere it is ignored.
    let max_value = rule.max_value.filter(|_| rule.operator == Operator::Between);

    if let Some(max_value) = max_value {
        if rule.value > max_value {
            return Err(ProfileValidationError::InvertedRange {
                rule_id: rule.id.clone(),
                value: rule.value,
                max_value,
            });
        }
    }

    if rule.condition == ConditionType::DisqualificationRate {
        for value in std::iter::once(rule.value).chain(max_value) {
            if !(0.0..=100.0).contains(&value) {
                return Err(ProfileValidationError::RateOutOfRange {
                    rule_id: rule.id.clone(),
                    value,
                });
            }
        }
    }

    Ok(())
}
