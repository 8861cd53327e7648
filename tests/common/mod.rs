#![allow(dead_code)]

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use bracket_auction_lib::types::{BidRequest, CreateGameRequest, JoinGameRequest, ViewGameRequest};
use serde_json::{json, Value};
use std::{
    net::{SocketAddr, TcpListener},
    sync::{mpsc, Arc, Mutex},
    thread,
    time::{Duration, Instant},
};
use tungstenite::{accept, Message};

/// Everything the mock house received, in order.
#[derive(Debug, Default)]
pub struct HouseLog {
    pub bids: Vec<BidRequest>,
    pub joins: Vec<JoinGameRequest>,
    pub views: Vec<String>,
    pub creators: Vec<String>,
}

pub type SharedHouseLog = Arc<Mutex<HouseLog>>;

pub const CLOSED_TEAM: &str = "Closed U";
pub const MISSING_GAME: &str = "missing";

async fn create(State(log): State<SharedHouseLog>, Json(req): Json<CreateGameRequest>) -> Json<Value> {
    let mut log = log.lock().unwrap();
    log.creators.push(req.player);
    Json(json!({ "id": format!("game-{}", log.creators.len()) }))
}

async fn join(State(log): State<SharedHouseLog>, Json(req): Json<JoinGameRequest>) -> (StatusCode, Json<Value>) {
    if req.game_id == MISSING_GAME {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Game not found" })));
    }
    log.lock().unwrap().joins.push(req);
    (StatusCode::OK, Json(json!({})))
}

async fn view(State(log): State<SharedHouseLog>, Json(req): Json<ViewGameRequest>) -> (StatusCode, Json<Value>) {
    log.lock().unwrap().views.push(req.game_id);
    (StatusCode::OK, Json(json!({})))
}

async fn bid(State(log): State<SharedHouseLog>, Json(req): Json<BidRequest>) -> (StatusCode, Json<Value>) {
    if req.team == CLOSED_TEAM {
        return (StatusCode::BAD_REQUEST, Json(json!({ "detail": "Bidding closed for this team" })));
    }
    log.lock().unwrap().bids.push(req);
    (StatusCode::OK, Json(json!({})))
}

/// Serves the house endpoints on an ephemeral port from a background runtime.
pub fn spawn_house() -> (SocketAddr, SharedHouseLog) {
    let log: SharedHouseLog = Arc::new(Mutex::new(HouseLog::default()));
    let state = log.clone();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let app = Router::new()
                .route("/create", post(create))
                .route("/join", post(join))
                .route("/view", post(view))
                .route("/bid", post(bid))
                .with_state(state);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    let addr = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    (addr, log)
}

/// Accepts one push-socket client, sends `frames` in order, then closes.
pub fn spawn_push_socket(frames: Vec<String>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut socket = accept(stream).unwrap();
        for frame in frames {
            socket.send(Message::Text(frame)).unwrap();
        }
        thread::sleep(Duration::from_millis(100));
        socket.close(None).ok();
        while socket.read().is_ok() {}
    });
    addr
}

/// Polls `check` until it holds or five seconds pass.
pub fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}
