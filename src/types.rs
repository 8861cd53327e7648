use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::BTreeMap, fmt};

// ── Constants ──────────────────────────────────────────────────────────

pub const INITIAL_BID: u32 = 0;
pub const INITIAL_COUNTDOWN: u32 = 10;
pub const TEAMS_PER_REGION: usize = 16;
pub const ANNOUNCEMENT_HISTORY_LIMIT: usize = 50;
pub const SOCKET_POLL_INTERVAL_MS: u64 = 200;
pub const DEFAULT_BACKEND_HOST: &str = "127.0.0.1";
pub const DEFAULT_BACKEND_PORT: u16 = 8000;

/// Plain-text frame the house sends when bidding opens.
pub const GAME_STARTED: &str = "gameStarted";

// ── Team types ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Region {
    East,
    West,
    South,
    Midwest,
}

impl Region {
    /// Bracket order: East meets West and South meets Midwest in the Final Four.
    pub const ALL: [Region; 4] = [Region::East, Region::West, Region::South, Region::Midwest];

    pub fn parse(raw: &str) -> Option<Region> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "east" => Some(Region::East),
            "west" => Some(Region::West),
            "south" => Some(Region::South),
            "midwest" => Some(Region::Midwest),
            _ => None,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Region::East => "East",
            Region::West => "West",
            Region::South => "South",
            Region::Midwest => "Midwest",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub short_name: String,
    pub url_name: String,
    pub seed: u8,
    pub region: Region,
}

/// A bracket slot. Unresolved slots are never confused with a real team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Team>", into = "Option<Team>")]
pub enum Slot {
    Team(Team),
    #[default]
    Undetermined,
}

impl Slot {
    pub fn team(&self) -> Option<&Team> {
        match self {
            Slot::Team(team) => Some(team),
            Slot::Undetermined => None,
        }
    }

    pub fn is_determined(&self) -> bool {
        matches!(self, Slot::Team(_))
    }
}

impl From<Option<Team>> for Slot {
    fn from(value: Option<Team>) -> Self {
        value.map(Slot::Team).unwrap_or(Slot::Undetermined)
    }
}

impl From<Slot> for Option<Team> {
    fn from(value: Slot) -> Self {
        match value {
            Slot::Team(team) => Some(team),
            Slot::Undetermined => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: u32,
    pub next_match_id: Option<u32>,
    pub round_name: String,
    pub participants: [Slot; 2],
    /// Short name of the winning team.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
}

impl Match {
    pub fn is_determined(&self) -> bool {
        self.participants.iter().all(Slot::is_determined)
    }

    pub fn involves(&self, short_name: &str) -> bool {
        self.participants
            .iter()
            .filter_map(Slot::team)
            .any(|team| team.short_name == short_name)
    }

    /// The participant named as winner, if the match is fully determined.
    pub fn winning_team(&self) -> Option<&Team> {
        let winner = self.winner.as_deref()?;
        if !self.is_determined() {
            return None;
        }
        self.participants
            .iter()
            .filter_map(Slot::team)
            .find(|team| team.short_name == winner)
    }
}

// ── Player types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedTeam {
    #[serde(flatten)]
    pub team: Team,
    #[serde(deserialize_with = "de_amount")]
    pub purchase_price: u32,
    #[serde(default)]
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "de_amount")]
    pub balance: u32,
    #[serde(default)]
    pub teams: Vec<OwnedTeam>,
    #[serde(default)]
    pub points: u32,
}

pub type PlayerMap = BTreeMap<String, PlayerInfo>;

// ── Wire types ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRequest {
    pub game_id: String,
    pub player: String,
    pub bid: u32,
    pub team: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    pub player: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameRequest {
    pub game_id: String,
    pub player: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureDetail {
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewGameRequest {
    pub game_id: String,
}

// ── Config types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub backend_host: String,
    pub backend_port: u16,
    pub base_bid: u32,
    pub starting_countdown: u32,
    pub quick_bid_increments: Vec<u32>,
    pub socket_poll_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_host: String::new(),
            backend_port: 0,
            base_bid: INITIAL_BID,
            starting_countdown: INITIAL_COUNTDOWN,
            quick_bid_increments: vec![1, 5, 10],
            socket_poll_interval_ms: SOCKET_POLL_INTERVAL_MS,
        }
    }
}

// ── Serde helpers ──────────────────────────────────────────────────────

/// The house sends money and seconds as JSON numbers that may be floats.
/// Only whole, non-negative values fit: `5.0` is 5, while `12.9` or `-1`
/// make the whole frame malformed.
pub fn de_amount<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    amount_from_f64(raw).ok_or_else(|| serde::de::Error::custom(format!("invalid amount {raw}")))
}

pub fn amount_from_f64(raw: f64) -> Option<u32> {
    if !raw.is_finite() || raw < 0.0 || raw > f64::from(u32::MAX) || raw.fract() != 0.0 {
        return None;
    }
    Some(raw as u32)
}
