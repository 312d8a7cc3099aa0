use crate::audit::AuditRecord;
use crate::gate::{GrantRequest, Refusal};
use crate::rank::RankEntry;
use serde::{Deserialize, Serialize};

/// The board as shown to viewers, plus what the grant form needs.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Standings {
    pub entries: Vec<RankEntry>,
    pub activities: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GrantOutcome {
    Applied {
        record: AuditRecord,
        previous: u64,
        updated: u64,
    },
    Refused {
        refusal: Refusal,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LoginResponse {
    pub token: String,
    pub admin: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum ClientMsg {
    Login { username: String, password: String },
    Logout,
    Refresh,
    Grant(GrantRequest),
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum ServerMsg {
    Standings(Standings),
    LoggedIn { admin: String },
    LoggedOut,
    GrantResult(GrantOutcome),
    Error { message: String },
}
