use crate::tennis_logic::config::Config;
use crate::tennis_logic::model::{ErrorDetail, MatchesResponse};
use crate::tennis_logic::state::AppState;
use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use futures_util::StreamExt;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

pub fn router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/tennis", get(get_all_matches))
        .route("/api/tennis/match/{match_id}", get(get_match))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(app_state)
}

pub async fn run(config: Config, app_state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port()));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Downstream server listening on {}", addr);

    axum::serve(listener, router(app_state))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            log::info!("Downstream server shutting down.");
        })
        .await?;

    Ok(())
}

async fn get_all_matches(State(state): State<AppState>) -> impl IntoResponse {
    let matches = state.lookup.all_matches();
    Json(MatchesResponse::now(&matches)).into_response()
}

async fn get_match(State(state): State<AppState>, Path(match_id): Path<String>) -> Response {
    match state.lookup.lookup(&match_id) {
        Ok(record) => Json(record).into_response(),
        Err(e) => {
            log::debug!("Lookup miss: {}", e);
            (StatusCode::NOT_FOUND, Json(ErrorDetail::new("Match not found"))).into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.sessions.clone();
    ws.on_upgrade(move |socket| sessions.track_future(handle_socket(socket, state)))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut subscription = match state.dispatcher.subscribe() {
        Ok(subscription) => subscription,
        Err(e) => {
            log::warn!("Rejecting WebSocket client: {}", e);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    let client_id = subscription.id;
    log::info!("Client {} connected", client_id);

    loop {
        tokio::select! {
            // Incoming messages only matter for detecting disconnects
            incoming = socket.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            frame = subscription.frames.recv() => {
                match frame {
                    Some(frame) => {
                        log::trace!("Sending {:?} frame to client {}", frame.kind(), client_id);
                        if socket.send(Message::Text(frame.payload().to_owned().into())).await.is_err() {
                            break; // client disconnected
                        }
                    }
                    None => {
                        // Dispatcher closed or dropped this client
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    state.dispatcher.unsubscribe(client_id);
    log::info!("Client {} disconnected", client_id);
}
