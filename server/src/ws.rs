use crate::{auth::AdminContext, error::AppError, state::AppState};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use shared::protocol::{ClientMsg, GrantOutcome, ServerMsg};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let conn_id = Uuid::new_v4();
    let mut updates = state.updates.subscribe();
    let mut session: Option<AdminContext> = None;

    info!("WebSocket connection {} opened", conn_id);

    for reply in handle_client_msg(&state, &mut session, ClientMsg::Refresh).await {
        if !send(&mut sender, &reply).await {
            return;
        }
    }

    loop {
        tokio::select! {
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        let replies = match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(msg) => handle_client_msg(&state, &mut session, msg).await,
                            Err(e) => {
                                warn!("Unreadable message on {}: {}", conn_id, e);
                                vec![ServerMsg::Error {
                                    message: format!("unreadable message: {}", e),
                                }]
                            }
                        };
                        let mut open = true;
                        for reply in &replies {
                            open = send(&mut sender, reply).await;
                            if !open {
                                break;
                            }
                        }
                        if !open {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }

            update = updates.recv() => {
                match update {
                    Ok(msg) => {
                        if !send(&mut sender, &msg).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Only the newest standings matter
                        info!("Connection {} skipped {} updates", conn_id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    if let Some(ctx) = session {
        info!("Admin {} disconnected", ctx.admin);
    }
    info!("WebSocket connection {} closed", conn_id);
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> bool {
    match serde_json::to_string(msg) {
        Ok(text) => sender.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            warn!("Could not encode {:?}: {}", msg, e);
            true
        }
    }
}

/// Apply one client message against the connection's session. Returns the
/// replies for this connection only; standings after a grant go out on the
/// broadcast channel.
pub async fn handle_client_msg(
    state: &AppState,
    session: &mut Option<AdminContext>,
    msg: ClientMsg,
) -> Vec<ServerMsg> {
    match msg {
        ClientMsg::Refresh => match state.service.standings(None).await {
            Ok(standings) => vec![ServerMsg::Standings(standings)],
            Err(e) => vec![error_msg(e)],
        },
        ClientMsg::Login { username, password } => match state.credentials.verify(&username, &password) {
            Some(ctx) => {
                let admin = ctx.admin.clone();
                *session = Some(ctx);
                vec![ServerMsg::LoggedIn { admin }]
            }
            None => vec![error_msg(AppError::Unauthorized)],
        },
        ClientMsg::Logout => {
            if let Some(ctx) = session.take() {
                info!("Admin {} signed out", ctx.admin);
            }
            vec![ServerMsg::LoggedOut]
        }
        ClientMsg::Grant(request) => {
            let Some(ctx) = session.as_ref() else {
                return vec![error_msg(AppError::Unauthorized)];
            };
            let now = chrono::Local::now().naive_local();
            match state.service.grant(ctx, &request, now).await {
                Ok(outcome) => {
                    if matches!(outcome, GrantOutcome::Applied { .. }) {
                        state.publish_standings().await;
                    }
                    vec![ServerMsg::GrantResult(outcome)]
                }
                Err(e) => vec![error_msg(e)],
            }
        }
    }
}

fn error_msg(err: AppError) -> ServerMsg {
    if err.status().is_server_error() {
        warn!("{}", err);
    }
    ServerMsg::Error {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{routes::router, state::testing::fixture};
    use shared::gate::GrantRequest;
    use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

    fn grant(student: &str, points: u64) -> ClientMsg {
        ClientMsg::Grant(GrantRequest {
            student: student.to_string(),
            activity: "Day 01".to_string(),
            points,
            override_code: None,
        })
    }

    #[tokio::test]
    async fn test_grant_needs_login() {
        let (state, store) = fixture();
        let mut session = None;
        let replies = handle_client_msg(&state, &mut session, grant("Beam", 3)).await;
        assert!(matches!(replies.as_slice(), [ServerMsg::Error { .. }]));
        assert_eq!(store.grid("Log").unwrap().len(), 1);

        let replies = handle_client_msg(
            &state,
            &mut session,
            ClientMsg::Login {
                username: "kru_a".to_string(),
                password: "wrong".to_string(),
            },
        )
        .await;
        assert!(matches!(replies.as_slice(), [ServerMsg::Error { .. }]));
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_session_is_per_connection() {
        let (state, store) = fixture();
        let mut alice = None;
        let mut bob = None;
        handle_client_msg(
            &state,
            &mut alice,
            ClientMsg::Login {
                username: "kru_a".to_string(),
                password: "secret".to_string(),
            },
        )
        .await;
        assert_eq!(alice.as_ref().map(|c| c.admin.as_str()), Some("kru_a"));

        let replies = handle_client_msg(&state, &mut bob, grant("Beam", 3)).await;
        assert!(matches!(replies.as_slice(), [ServerMsg::Error { .. }]));

        let replies = handle_client_msg(&state, &mut alice, grant("Beam", 3)).await;
        assert!(matches!(
            replies.as_slice(),
            [ServerMsg::GrantResult(GrantOutcome::Applied { updated: 3, .. })]
        ));
        assert_eq!(store.grid("Log").unwrap()[1][1], "kru_a");

        let replies = handle_client_msg(&state, &mut alice, ClientMsg::Logout).await;
        assert!(matches!(replies.as_slice(), [ServerMsg::LoggedOut]));
        assert!(alice.is_none());
    }

    async fn next_msg<S>(stream: &mut S) -> ServerMsg
    where
        S: futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("socket ended: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_socket_round_trip() {
        let (state, _) = fixture();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state, None)).await.unwrap();
        });

        let (mut admin, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        let (mut viewer, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();

        match next_msg(&mut admin).await {
            ServerMsg::Standings(s) => assert_eq!(s.entries.len(), 2),
            other => panic!("expected standings, got {:?}", other),
        }
        assert!(matches!(next_msg(&mut viewer).await, ServerMsg::Standings(_)));

        let login = serde_json::json!({"type": "Login", "username": "kru_a", "password": "secret"});
        admin.send(WsMessage::text(login.to_string())).await.unwrap();
        assert!(matches!(next_msg(&mut admin).await, ServerMsg::LoggedIn { admin } if admin == "kru_a"));

        let grant = serde_json::json!({"type": "Grant", "student": "Beam", "activity": "Day 01", "points": 7});
        admin.send(WsMessage::text(grant.to_string())).await.unwrap();
        assert!(matches!(
            next_msg(&mut admin).await,
            ServerMsg::GrantResult(GrantOutcome::Applied { previous: 0, updated: 7, .. })
        ));

        for socket in [&mut admin, &mut viewer] {
            match next_msg(socket).await {
                ServerMsg::Standings(s) => {
                    let beam = s.entries.iter().find(|e| e.name == "Beam").unwrap();
                    // The memory store has no formulas behind the score column
                    assert_eq!(beam.score, 4);
                }
                other => panic!("expected standings, got {:?}", other),
            }
        }
    }
}
