use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column order of the audit worksheet.
pub const AUDIT_HEADER: [&str; 6] = ["timestamp", "admin", "student", "points", "activity", "status"];

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Granted,
    Override,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Granted => "granted",
            AuditStatus::Override => "override",
        }
    }

    fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("override") {
            AuditStatus::Override
        } else {
            AuditStatus::Granted
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuditRecord {
    pub timestamp: NaiveDateTime,
    pub admin: String,
    pub student: String,
    pub points: u64,
    pub activity: String,
    pub status: AuditStatus,
}

impl AuditRecord {
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.admin.clone(),
            self.student.clone(),
            self.points.to_string(),
            self.activity.clone(),
            self.status.to_string(),
        ]
    }

    /// Read a log row. Rows without a readable timestamp (the header, notes
    /// typed into the sheet by hand) yield `None`.
    pub fn from_row(row: &[String]) -> Option<Self> {
        let cell = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");
        let timestamp = parse_timestamp(cell(0))?;
        Some(Self {
            timestamp,
            admin: cell(1).to_string(),
            student: cell(2).to_string(),
            points: crate::score::cell_points(cell(3)),
            activity: cell(4).to_string(),
            status: AuditStatus::parse(cell(5)),
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Largest serial the spreadsheet can hold: 9999-12-31.
const MAX_SERIAL: f64 = 2_958_465.0;

/// Accepts the canonical format, the ISO `T` separator, and spreadsheet
/// date serials (days since 1899-12-30, fraction is time of day) for cells
/// the sheet stores as dates.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| from_serial(s.parse().ok()?))
}

fn from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > MAX_SERIAL {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

/// Decode every readable record of an audit worksheet, header included or not.
pub fn parse_log(rows: &[Vec<String>]) -> Vec<AuditRecord> {
    rows.iter().filter_map(|r| AuditRecord::from_row(r)).collect()
}

/// The first record crediting `student` for `activity` on `date`.
pub fn find_duplicate<'a>(
    log: &'a [AuditRecord],
    student: &str,
    activity: &str,
    date: NaiveDate,
) -> Option<&'a AuditRecord> {
    log.iter()
        .find(|r| r.student == student && r.activity == activity && r.date() == date)
}
