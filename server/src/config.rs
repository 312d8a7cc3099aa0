use shared::{schema::RosterSchema, score::ScorePolicy};
use std::{collections::HashMap, env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Backend {
    Google {
        api_base: String,
        spreadsheet_id: String,
        token: String,
    },
    Memory {
        seed: Option<PathBuf>,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub backend: Backend,
    pub roster_sheet: String,
    pub audit_sheet: String,
    pub schema: RosterSchema,
    pub score_policy: ScorePolicy,
    pub admins: HashMap<String, String>,
    pub override_code: Option<String>,
    pub session_ttl: Duration,
}

impl Config {
    /// Read configuration from the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; `from_env` passes the real environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match get("SHEET_BACKEND").as_deref().unwrap_or("google") {
            "google" => Backend::Google {
                api_base: get("SHEETS_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                spreadsheet_id: get("SPREADSHEET_ID").ok_or(ConfigError::Missing("SPREADSHEET_ID"))?,
                token: get("GOOGLE_SHEETS_TOKEN").ok_or(ConfigError::Missing("GOOGLE_SHEETS_TOKEN"))?,
            },
            "memory" => Backend::Memory {
                seed: get("MEMORY_SEED").map(PathBuf::from),
            },
            other => {
                return Err(ConfigError::Invalid {
                    name: "SHEET_BACKEND",
                    value: other.to_string(),
                    reason: "expected google or memory".to_string(),
                })
            }
        };

        let defaults = RosterSchema::default();
        let schema = RosterSchema {
            name_column: parse_or("NAME_COLUMN", get("NAME_COLUMN"), defaults.name_column)?,
            score_column: parse_or("SCORE_COLUMN", get("SCORE_COLUMN"), defaults.score_column)?,
            exp_column: parse_or("EXP_COLUMN", get("EXP_COLUMN"), defaults.exp_column)?,
            medal_column: parse_or("MEDAL_COLUMN", get("MEDAL_COLUMN"), defaults.medal_column)?,
            activity_marker: get("ACTIVITY_MARKER").unwrap_or(defaults.activity_marker),
        };

        let admins = parse_admins(&get("ADMIN_CREDENTIALS").ok_or(ConfigError::Missing("ADMIN_CREDENTIALS"))?)?;

        Ok(Self {
            bind_addr: parse_or(
                "BIND_ADDR",
                get("BIND_ADDR"),
                SocketAddr::from(([0, 0, 0, 0], 3000)),
            )?,
            static_dir: get("STATIC_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("web/dist")),
            backend,
            roster_sheet: get("ROSTER_WORKSHEET").unwrap_or_else(|| "Leaderboard".to_string()),
            audit_sheet: get("AUDIT_WORKSHEET").unwrap_or_else(|| "Log".to_string()),
            schema,
            score_policy: parse_or("SCORE_POLICY", get("SCORE_POLICY"), ScorePolicy::default())?,
            admins,
            override_code: get("OVERRIDE_CODE").map(|c| c.trim().to_string()),
            session_ttl: Duration::from_secs(
                parse_or("SESSION_TTL_MINUTES", get("SESSION_TTL_MINUTES"), 720u64)?.saturating_mul(60),
            ),
        })
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: v.clone(),
            reason: e.to_string(),
        }),
    }
}

/// `user:pass,user2:pass2`. Passwords may contain `:`; usernames may not.
fn parse_admins(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut admins = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match pair.split_once(':') {
            Some((user, pass)) if !user.trim().is_empty() && !pass.is_empty() => {
                admins.insert(user.trim().to_string(), pass.to_string());
            }
            _ => {
                return Err(ConfigError::Invalid {
                    name: "ADMIN_CREDENTIALS",
                    value: pair.split(':').next().unwrap_or_default().to_string(),
                    reason: "expected user:password".to_string(),
                })
            }
        }
    }
    if admins.is_empty() {
        return Err(ConfigError::Missing("ADMIN_CREDENTIALS"));
    }
    Ok(admins)
}
