use crate::{
    auth::{Credentials, Sessions},
    config::Config,
    service::LeaderboardService,
    store::SheetStore,
};
use shared::protocol::ServerMsg;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LeaderboardService>,
    pub credentials: Arc<Credentials>,
    pub sessions: Arc<Sessions>,
    /// Fresh standings pushed to every open socket after a grant lands.
    pub updates: broadcast::Sender<ServerMsg>,
}

impl AppState {
    pub fn new(service: LeaderboardService, credentials: Credentials) -> Self {
        let (updates, _) = broadcast::channel(100);
        Self {
            service: Arc::new(service),
            credentials: Arc::new(credentials),
            sessions: Arc::new(Sessions::default()),
            updates,
        }
    }

    pub fn from_config(store: Arc<dyn SheetStore>, config: &Config) -> Self {
        let mut state = Self::new(
            LeaderboardService::from_config(store, config),
            Credentials::new(config.admins.clone()),
        );
        state.sessions = Arc::new(Sessions::new(config.session_ttl));
        state
    }

    /// Re-read the roster and broadcast it.
    pub async fn publish_standings(&self) {
        match self.service.standings(None).await {
            Ok(standings) => {
                let receivers = self.updates.send(ServerMsg::Standings(standings)).unwrap_or(0);
                info!("Broadcast standings to {} connections", receivers);
            }
            Err(e) => warn!("Could not refresh standings after grant: {}", e),
        }
    }
}
