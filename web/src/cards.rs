use shared::gate::{GrantRequest, Refusal};
use shared::protocol::GrantOutcome;
use shared::rank::RankEntry;

/// Every displayed field, so a card re-renders when any of them changes.
pub fn card_key(entry: &RankEntry) -> (u32, String, u64, u64, String) {
    (
        entry.rank,
        entry.name.clone(),
        entry.score,
        entry.exp,
        entry.medal.clone(),
    )
}

pub fn medal_class(medal: &str) -> &'static str {
    let medal = medal.to_lowercase();
    if medal.contains("gold") {
        "card medal-gold"
    } else if medal.contains("silver") {
        "card medal-silver"
    } else if medal.contains("bronze") {
        "card medal-bronze"
    } else {
        "card"
    }
}

/// Build a grant from the raw form fields.
pub fn grant_request(
    student: &str,
    activity: &str,
    points: &str,
    override_code: &str,
) -> Result<GrantRequest, String> {
    let points: u64 = match points.trim().parse() {
        Ok(p) if p > 0 => p,
        _ => return Err("Points must be a whole number above zero".to_string()),
    };
    if student.trim().is_empty() {
        return Err("Pick a student".to_string());
    }
    if activity.trim().is_empty() {
        return Err("Pick an activity".to_string());
    }
    let code = override_code.trim();
    Ok(GrantRequest {
        student: student.trim().to_string(),
        activity: activity.trim().to_string(),
        points,
        override_code: (!code.is_empty()).then(|| code.to_string()),
    })
}

pub fn outcome_text(outcome: &GrantOutcome) -> String {
    match outcome {
        GrantOutcome::Applied {
            record,
            previous,
            updated,
        } => format!(
            "{} +{} for {} ({} -> {})",
            record.student, record.points, record.activity, previous, updated
        ),
        GrantOutcome::Refused { refusal } => {
            let existing = refusal.existing();
            let when = existing.timestamp.format("%H:%M");
            match refusal {
                Refusal::Duplicate { .. } => format!(
                    "{} already got points for {} today ({} by {})",
                    existing.student, existing.activity, when, existing.admin
                ),
                Refusal::BadOverrideCode { .. } => format!(
                    "Override code rejected; {} already got points for {} today",
                    existing.student, existing.activity
                ),
            }
        }
    }
}
