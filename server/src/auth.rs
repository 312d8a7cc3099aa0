use crate::{error::AppError, state::AppState};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use dashmap::DashMap;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use tracing::{info, warn};
use uuid::Uuid;

/// The admin a request or connection acts as. Handlers that change the
/// sheet take one of these explicitly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminContext {
    pub admin: String,
}

/// Static username -> password map from configuration.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    admins: HashMap<String, String>,
}

impl Credentials {
    pub fn new(admins: HashMap<String, String>) -> Self {
        Self { admins }
    }

    pub fn verify(&self, username: &str, password: &str) -> Option<AdminContext> {
        let username = username.trim();
        match self.admins.get(username) {
            Some(expected) if expected == password => {
                info!("Admin {} signed in", username);
                Some(AdminContext {
                    admin: username.to_string(),
                })
            }
            _ => {
                warn!("Rejected sign-in for {:?}", username);
                None
            }
        }
    }
}

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

struct Session {
    ctx: AdminContext,
    issued: Instant,
}

/// Bearer tokens handed out by `POST /api/login`. A token stops resolving
/// once it is older than the TTL; expired tokens are dropped on the next login.
pub struct Sessions {
    tokens: DashMap<String, Session>,
    ttl: Duration,
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl Sessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tokens: DashMap::new(),
            ttl,
        }
    }

    pub fn issue(&self, ctx: AdminContext) -> String {
        self.prune();
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(
            token.clone(),
            Session {
                ctx,
                issued: Instant::now(),
            },
        );
        token
    }

    pub fn resolve(&self, token: &str) -> Option<AdminContext> {
        let admin = {
            let session = self.tokens.get(token)?;
            if session.issued.elapsed() < self.ttl {
                return Some(session.ctx.clone());
            }
            session.ctx.admin.clone()
        };
        self.tokens.remove(token);
        info!("Session for {} expired", admin);
        None
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn prune(&self) {
        let ttl = self.ttl;
        self.tokens.retain(|_, s| s.issued.elapsed() < ttl);
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[async_trait]
impl FromRequestParts<AppState> for AdminContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        bearer_token(&parts.headers)
            .and_then(|token| state.sessions.resolve(token))
            .ok_or(AppError::Unauthorized)
    }
}
