use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where each logical roster field lives in the worksheet.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RosterSchema {
    pub name_column: usize,
    pub score_column: usize,
    pub exp_column: usize,
    pub medal_column: usize,
    /// Headers containing this text (case-insensitive) are activity slots.
    pub activity_marker: String,
}

impl Default for RosterSchema {
    fn default() -> Self {
        Self {
            name_column: 0,
            score_column: 37,
            exp_column: 38,
            medal_column: 39,
            activity_marker: "day".to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{field} column {column} is beyond the roster header ({width} columns)")]
    OutOfRange {
        field: &'static str,
        column: usize,
        width: usize,
    },
    #[error("{first} and {second} both point at column {column}")]
    Collision {
        first: &'static str,
        second: &'static str,
        column: usize,
    },
    #[error("activity marker must not be empty")]
    EmptyMarker,
    #[error("no activity columns match marker {0:?}")]
    NoActivities(String),
}

impl RosterSchema {
    fn fields(&self) -> [(&'static str, usize); 4] {
        [
            ("name", self.name_column),
            ("score", self.score_column),
            ("exp", self.exp_column),
            ("medal", self.medal_column),
        ]
    }

    /// Check the configured positions against a live header row.
    pub fn validate(&self, header: &[String]) -> Result<(), SchemaError> {
        if self.activity_marker.trim().is_empty() {
            return Err(SchemaError::EmptyMarker);
        }
        let fields = self.fields();
        for (field, column) in fields {
            if column >= header.len() {
                return Err(SchemaError::OutOfRange {
                    field,
                    column,
                    width: header.len(),
                });
            }
        }
        for (i, &(first, a)) in fields.iter().enumerate() {
            for &(second, b) in &fields[i + 1..] {
                if a == b {
                    return Err(SchemaError::Collision {
                        first,
                        second,
                        column: a,
                    });
                }
            }
        }
        if self.activity_columns(header).is_empty() {
            return Err(SchemaError::NoActivities(self.activity_marker.clone()));
        }
        Ok(())
    }

    /// True for a header naming a writable activity slot.
    ///
    /// The name and derived columns never count, even if their header happens
    /// to contain the marker.
    pub fn is_activity(&self, column: usize, header: &str) -> bool {
        if self.fields().iter().any(|(_, c)| *c == column) {
            return false;
        }
        header
            .to_lowercase()
            .contains(&self.activity_marker.trim().to_lowercase())
    }

    pub fn activity_columns(&self, header: &[String]) -> Vec<usize> {
        header
            .iter()
            .enumerate()
            .filter(|(i, h)| self.is_activity(*i, h))
            .map(|(i, _)| i)
            .collect()
    }

    /// Activity labels in sheet order, for building the grant form.
    pub fn activity_labels(&self, header: &[String]) -> Vec<String> {
        self.activity_columns(header)
            .into_iter()
            .map(|i| header[i].trim().to_string())
            .collect()
    }
}
