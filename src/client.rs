use crate::bid::BidTransport;
use crate::config::backend_address;
use crate::types::*;
use serde::Serialize;
use tracing::{debug, info};

/// Blocking HTTP client for the house endpoints (create, join, view, bid).
#[derive(Clone, Debug)]
pub struct HouseClient {
    base_url: String,
    socket_base: String,
    client: reqwest::blocking::Client,
}

impl HouseClient {
    pub fn new(host: &str, port: u16) -> Self {
        HouseClient {
            base_url: format!("http://{host}:{port}"),
            socket_base: format!("ws://{host}:{port}"),
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let (host, port) = backend_address(config);
        HouseClient::new(&host, port)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Push socket for one game.
    pub fn socket_url(&self, game_id: &str) -> String {
        format!("{}/ws/{game_id}", self.socket_base)
    }

    pub fn create_game(&self, player: &str) -> Result<String, String> {
        let body = self.post_json("/create", &CreateGameRequest { player: player.to_string() })?;
        let created: CreateGameResponse =
            serde_json::from_str(&body).map_err(|e| format!("parse create response: {e}"))?;
        info!("Created game {} for {player}", created.id);
        Ok(created.id)
    }

    /// A rejected join carries the house's `detail` message.
    pub fn join_game(&self, game_id: &str, player: &str) -> Result<(), String> {
        let request = JoinGameRequest {
            game_id: game_id.to_string(),
            player: player.to_string(),
        };
        self.post_json("/join", &request)?;
        info!("{player} joined game {game_id}");
        Ok(())
    }

    pub fn view_game(&self, game_id: &str) -> Result<(), String> {
        self.post_json("/view", &ViewGameRequest { game_id: game_id.to_string() })?;
        Ok(())
    }

    fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<String, String> {
        let url = format!("{}{path}", self.base_url);
        debug!("POST {url}");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| format!("request {url}: {e}"))?;
        let status = resp.status();
        let text = resp.text().map_err(|e| format!("read {url}: {e}"))?;
        if !status.is_success() {
            return Err(failure_message(status, &text));
        }
        Ok(text)
    }
}

impl BidTransport for HouseClient {
    fn post_bid(&self, request: &BidRequest) -> Result<(), String> {
        self.post_json("/bid", request).map(|_| ())
    }
}

fn failure_message(status: reqwest::StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<FailureDetail>(body)
        .ok()
        .and_then(|failure| failure.detail)
        .filter(|detail| !detail.trim().is_empty());
    match detail {
        Some(detail) => detail,
        None if body.trim().is_empty() => format!("house returned {status}"),
        None => format!("house returned {status}: {}", body.trim()),
    }
}
