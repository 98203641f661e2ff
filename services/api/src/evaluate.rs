use clap::Args;
use job_health::error::AppError;
use job_health::health::{
    load_profiles, validate_profile, EvaluationError, HealthProfile, JobHealthResult, JobId,
    MetricsSnapshot, ProfileId, ProfileStoreError, RuleEngine,
};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// JSON file holding one profile or an array of profiles
    #[arg(long)]
    pub(crate) profile: PathBuf,
    /// JSON file holding the metrics snapshot to evaluate
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
    /// Job identifier to stamp on the result
    #[arg(long, default_value = "cli")]
    pub(crate) job_id: String,
    /// Profile to pick when the file holds several (defaults to the first)
    #[arg(long)]
    pub(crate) profile_id: Option<String>,
    /// Emit the result as JSON instead of a text summary
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let profiles = load_profiles(&args.profile)?;
    let profile = select_profile(profiles, args.profile_id.map(ProfileId))?;
    validate_profile(&profile).map_err(ProfileStoreError::from)?;

    let raw = std::fs::read_to_string(&args.snapshot)?;
    let snapshot: MetricsSnapshot = serde_json::from_str(&raw)?;

    let result = RuleEngine::new().evaluate(&JobId(args.job_id), &profile, &snapshot);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_text(&profile, &result));
    }

    Ok(())
}

fn select_profile(
    profiles: Vec<HealthProfile>,
    wanted: Option<ProfileId>,
) -> Result<HealthProfile, AppError> {
    match wanted {
        Some(id) => profiles
            .into_iter()
            .find(|profile| profile.id == id)
            .ok_or_else(|| EvaluationError::ProfileNotFound(id).into()),
        None => profiles.into_iter().next().ok_or_else(|| {
            EvaluationError::ProfileNotFound(ProfileId("<empty file>".to_string())).into()
        }),
    }
}

fn render_text(profile: &HealthProfile, result: &JobHealthResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Job {} | profile {} ({})\n",
        result.job_id, profile.id, profile.name
    ));
    out.push_str(&format!("Color: {}\n", result.color.label()));
    match &result.matched_rule_id {
        Some(rule_id) => out.push_str(&format!("Matched rule: {rule_id}\n")),
        None => out.push_str("Matched rule: none\n"),
    }
    out.push_str(&format!("Explanation: {}\n", result.explanation));
    for warning in &result.warnings {
        out.push_str(&format!("Warning: {warning}\n"));
    }
    out
}
