use crate::error::AuctionError;
use crate::types::{de_amount, PlayerMap, Team, GAME_STARTED};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

const SEQ_KEY: &str = "seq";
const PREVIEW_CHARS: usize = 120;

/// One push update. Each kind replaces its own slice of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionEvent {
    /// Always the complete player map, never a delta.
    Players(PlayerMap),
    Bid(#[serde(deserialize_with = "de_amount")] u32),
    Countdown(#[serde(deserialize_with = "de_amount")] u32),
    Team(Team),
    Log(String),
    Remaining(Vec<Team>),
    AllTeams(Vec<Team>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Players,
    Bid,
    Countdown,
    Team,
    Log,
    Remaining,
    AllTeams,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            EventKind::Players => "players",
            EventKind::Bid => "bid",
            EventKind::Countdown => "countdown",
            EventKind::Team => "team",
            EventKind::Log => "log",
            EventKind::Remaining => "remaining",
            EventKind::AllTeams => "all_teams",
        };
        f.write_str(key)
    }
}

impl AuctionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AuctionEvent::Players(_) => EventKind::Players,
            AuctionEvent::Bid(_) => EventKind::Bid,
            AuctionEvent::Countdown(_) => EventKind::Countdown,
            AuctionEvent::Team(_) => EventKind::Team,
            AuctionEvent::Log(_) => EventKind::Log,
            AuctionEvent::Remaining(_) => EventKind::Remaining,
            AuctionEvent::AllTeams(_) => EventKind::AllTeams,
        }
    }

    /// Wire form, e.g. `{"bid":5}`.
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A decoded push frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// The `gameStarted` signal: switch screens, nothing to fold.
    GameStarted,
    Event { event: AuctionEvent, seq: Option<u64> },
}

pub fn parse_frame(raw: &str) -> Result<Frame, AuctionError> {
    let trimmed = raw.trim();
    if trimmed == GAME_STARTED {
        return Ok(Frame::GameStarted);
    }

    let mut value: Value = serde_json::from_str(trimmed)
        .map_err(|e| AuctionError::MalformedEvent(format!("{e} in {}", preview(trimmed))))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| AuctionError::MalformedEvent(format!("not a JSON object: {}", preview(trimmed))))?;
    let seq = take_seq(object)?;
    if object.len() != 1 {
        let keys = object.keys().cloned().collect::<Vec<_>>().join(", ");
        return Err(AuctionError::MalformedEvent(format!(
            "expected exactly one event key, found [{keys}]"
        )));
    }

    let mut event: AuctionEvent = serde_json::from_value(value)
        .map_err(|e| AuctionError::MalformedEvent(format!("{e} in {}", preview(trimmed))))?;
    if let AuctionEvent::Players(players) = &mut event {
        for (name, player) in players.iter_mut() {
            if player.name.is_empty() {
                player.name = name.clone();
            }
        }
    }
    Ok(Frame::Event { event, seq })
}

fn take_seq(object: &mut Map<String, Value>) -> Result<Option<u64>, AuctionError> {
    match object.remove(SEQ_KEY) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| AuctionError::MalformedEvent(format!("seq must be a non-negative integer, got {value}"))),
    }
}

fn preview(raw: &str) -> String {
    if raw.chars().count() <= PREVIEW_CHARS {
        return raw.to_string();
    }
    let cut: String = raw.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}
