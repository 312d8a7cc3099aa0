use crate::audit::{find_duplicate, AuditRecord, AuditStatus};
use crate::fsm::{GrantEvent, GrantStage};
use crate::schema::RosterSchema;
use crate::score::cell_points;
use crate::sheet::{CellRef, Table};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An admin's request to credit points for one activity slot.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GrantRequest {
    pub student: String,
    pub activity: String,
    pub points: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_code: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrantError {
    #[error("student name is required")]
    MissingStudent,
    #[error("activity is required")]
    MissingActivity,
    #[error("points must be at least 1")]
    NoPoints,
    #[error("student {0:?} is not on the roster")]
    StudentNotFound(String),
    #[error("student {name:?} appears on {count} roster rows")]
    AmbiguousStudent { name: String, count: usize },
    #[error("activity {0:?} is not a roster column")]
    ActivityNotFound(String),
    #[error("activity {label:?} names {count} roster columns")]
    AmbiguousActivity { label: String, count: usize },
    #[error("column {0:?} is not an activity slot")]
    NotAnActivity(String),
}

/// Why a well-formed grant was turned away.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Refusal {
    /// Already credited today.
    Duplicate { existing: AuditRecord },
    /// Already credited today and the override code did not match.
    BadOverrideCode { existing: AuditRecord },
}

impl Refusal {
    pub fn existing(&self) -> &AuditRecord {
        match self {
            Refusal::Duplicate { existing } | Refusal::BadOverrideCode { existing } => existing,
        }
    }
}

/// Everything needed to carry out an accepted grant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantPlan {
    pub cell: CellRef,
    pub previous: u64,
    pub updated: u64,
    pub record: AuditRecord,
    pub stage: GrantStage,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Proceed(GrantPlan),
    Refused(Refusal),
}

/// Rules for accepting point grants against a roster.
#[derive(Clone, Debug, Default)]
pub struct Gate {
    pub schema: RosterSchema,
    pub override_code: Option<String>,
}

impl Gate {
    pub fn new(schema: RosterSchema, override_code: Option<String>) -> Self {
        Self {
            schema,
            override_code: override_code
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        }
    }

    /// Decide whether `request` may be applied to the given snapshots.
    ///
    /// Nothing is written here. On `Proceed` the caller writes `plan.updated`
    /// to `plan.cell` and appends `plan.record`, in that order.
    pub fn plan(
        &self,
        request: &GrantRequest,
        admin: &str,
        now: NaiveDateTime,
        roster: &Table,
        log: &[AuditRecord],
    ) -> Result<Decision, GrantError> {
        let student = request.student.trim();
        let activity = request.activity.trim();
        if student.is_empty() {
            return Err(GrantError::MissingStudent);
        }
        if activity.is_empty() {
            return Err(GrantError::MissingActivity);
        }
        if request.points == 0 {
            return Err(GrantError::NoPoints);
        }

        let mut stage = GrantStage::default();
        let mut status = AuditStatus::Granted;
        if let Some(existing) = find_duplicate(log, student, activity, now.date()) {
            let overridden = match (&self.override_code, &request.override_code) {
                (Some(expected), Some(given)) if given.trim() == expected.as_str() => true,
                (Some(_), Some(_)) => {
                    return Ok(Decision::Refused(Refusal::BadOverrideCode {
                        existing: existing.clone(),
                    }))
                }
                _ => false,
            };
            if !overridden {
                return Ok(Decision::Refused(Refusal::Duplicate {
                    existing: existing.clone(),
                }));
            }
            stage = advance(stage, &GrantEvent::Overridden);
            status = AuditStatus::Override;
        } else {
            stage = advance(stage, &GrantEvent::Clear);
        }

        let cell = self.locate(roster, student, activity)?;
        let previous = cell_points(roster.get(cell));
        let updated = previous.saturating_add(request.points);

        Ok(Decision::Proceed(GrantPlan {
            cell,
            previous,
            updated,
            record: AuditRecord {
                timestamp: now,
                admin: admin.to_string(),
                student: student.to_string(),
                points: request.points,
                activity: activity.to_string(),
                status,
            },
            stage,
        }))
    }

    /// Find the single activity cell for `student` and `activity`.
    pub fn locate(&self, roster: &Table, student: &str, activity: &str) -> Result<CellRef, GrantError> {
        let rows: Vec<usize> = (0..roster.rows.len())
            .filter(|&r| roster.cell(r, self.schema.name_column).trim() == student)
            .collect();
        let row = match rows.as_slice() {
            [] => return Err(GrantError::StudentNotFound(student.to_string())),
            [row] => *row,
            _ => {
                return Err(GrantError::AmbiguousStudent {
                    name: student.to_string(),
                    count: rows.len(),
                })
            }
        };

        let columns: Vec<usize> = roster
            .header
            .iter()
            .enumerate()
            .filter(|(_, h)| h.trim() == activity)
            .map(|(i, _)| i)
            .collect();
        let column = match columns.as_slice() {
            [] => return Err(GrantError::ActivityNotFound(activity.to_string())),
            [column] => *column,
            _ => {
                return Err(GrantError::AmbiguousActivity {
                    label: activity.to_string(),
                    count: columns.len(),
                })
            }
        };
        if !self.schema.is_activity(column, &roster.header[column]) {
            return Err(GrantError::NotAnActivity(activity.to_string()));
        }

        Ok(CellRef { row, column })
    }
}

fn advance(stage: GrantStage, event: &GrantEvent) -> GrantStage {
    stage.advance(event).unwrap_or_else(|s| s)
}
