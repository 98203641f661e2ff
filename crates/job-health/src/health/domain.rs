use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for job requisitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

/// Identifier wrapper for health profiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub String);

/// Identifier wrapper for rules inside a profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

macro_rules! display_id {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })*
    };
}

display_id!(JobId, ProfileId, RuleId);

/// Color-coded health status attached to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthColor {
    Red,
    Orange,
    Yellow,
    Purple,
    Blue,
    Gray,
    #[default]
    Green,
}

impl HealthColor {
    pub const ALL: [HealthColor; 7] = [
        HealthColor::Red,
        HealthColor::Orange,
        HealthColor::Yellow,
        HealthColor::Purple,
        HealthColor::Blue,
        HealthColor::Gray,
        HealthColor::Green,
    ];

    /// Rank used to pick a winner among simultaneous matches. Higher is more urgent.
    pub fn severity(self) -> u8 {
        match self {
            HealthColor::Red => 6,
            HealthColor::Orange => 5,
            HealthColor::Yellow => 4,
            HealthColor::Purple => 3,
            HealthColor::Blue => 2,
            HealthColor::Gray => 1,
            HealthColor::Green => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HealthColor::Red => "red",
            HealthColor::Orange => "orange",
            HealthColor::Yellow => "yellow",
            HealthColor::Purple => "purple",
            HealthColor::Blue => "blue",
            HealthColor::Gray => "gray",
            HealthColor::Green => "green",
        }
    }
}

impl PartialOrd for HealthColor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HealthColor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl fmt::Display for HealthColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Metric a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    CandidatesTotal,
    CandidatesAtStage,
    TimeInStage,
    DaysSinceContact,
    DisqualificationRate,
    DaysOpen,
}

impl ConditionType {
    /// Stage-scoped conditions look up their metric by pipeline stage name.
    pub fn requires_stage(self) -> bool {
        matches!(
            self,
            ConditionType::CandidatesAtStage | ConditionType::TimeInStage
        )
    }

    /// Count-like metrics can never be negative, so negative thresholds are misconfigured.
    pub fn is_count(self) -> bool {
        !matches!(self, ConditionType::DisqualificationRate)
    }

    pub fn label(self) -> &'static str {
        match self {
            ConditionType::CandidatesTotal => "candidates_total",
            ConditionType::CandidatesAtStage => "candidates_at_stage",
            ConditionType::TimeInStage => "time_in_stage",
            ConditionType::DaysSinceContact => "days_since_contact",
            ConditionType::DisqualificationRate => "disqualification_rate",
            ConditionType::DaysOpen => "days_open",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Comparison applied between the observed metric and the configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Gt,
    Lt,
    Eq,
    Between,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Eq => "==",
            Operator::Between => "between",
        }
    }
}

/// User-authored rule mapping a metric condition to a health color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRule {
    pub id: RuleId,
    pub color: HealthColor,
    pub condition: ConditionType,
    pub operator: Operator,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub enabled: bool,
}

impl HealthRule {
    /// Stage name with surrounding whitespace removed, `None` when blank.
    pub fn stage_name(&self) -> Option<&str> {
        self.stage
            .as_deref()
            .map(str::trim)
            .filter(|stage| !stage.is_empty())
    }

    pub fn describe(&self) -> String {
        let subject = match self.stage_name() {
            Some(stage) => format!("{} at '{}'", self.condition, stage),
            None => self.condition.to_string(),
        };

        match (self.operator, self.max_value) {
            (Operator::Between, Some(max)) => {
                format!("{subject} between {} and {}", self.value, max)
            }
            _ => format!("{subject} {} {}", self.operator.symbol(), self.value),
        }
    }
}

/// Named, ordered rule set applied to one category of job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthProfile {
    pub id: ProfileId,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub rules: Vec<HealthRule>,
}

impl HealthProfile {
    pub fn enabled_rules(&self) -> impl Iterator<Item = &HealthRule> {
        self.rules.iter().filter(|rule| rule.enabled)
    }
}

/// Point-in-time metrics for a job requisition, supplied by a `MetricsProvider`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub candidates_total: u32,
    #[serde(default)]
    pub candidates_by_stage: BTreeMap<String, u32>,
    #[serde(default)]
    pub time_in_stage_days: BTreeMap<String, u32>,
    pub days_since_last_client_contact: u32,
    pub disqualification_rate_percent: f64,
    pub days_open: u32,
}

impl MetricsSnapshot {
    /// Candidates currently at `stage`; stages never reached count as zero.
    pub fn candidates_at(&self, stage: &str) -> u32 {
        self.candidates_by_stage.get(stage).copied().unwrap_or(0)
    }

    /// Days spent at `stage`; stages never reached count as zero.
    pub fn days_in(&self, stage: &str) -> u32 {
        self.time_in_stage_days.get(stage).copied().unwrap_or(0)
    }
}

/// Outcome of evaluating one job against one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHealthResult {
    pub job_id: JobId,
    pub profile_id: ProfileId,
    pub color: HealthColor,
    pub matched_rule_id: Option<RuleId>,
    pub evaluated_at: DateTime<Utc>,
    pub explanation: String,
    pub warnings: Vec<String>,
    pub metrics_available: bool,
}

impl JobHealthResult {
    /// Fail-closed result used when no snapshot could be obtained for the job.
    pub fn metrics_unavailable(job_id: JobId, profile_id: ProfileId, reason: String) -> Self {
        Self {
            job_id,
            profile_id,
            color: HealthColor::Gray,
            matched_rule_id: None,
            evaluated_at: Utc::now(),
            explanation: "metrics unavailable; health unknown".to_string(),
            warnings: vec![reason],
            metrics_available: false,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.metrics_available && self.color == HealthColor::Green
    }
}
