use crate::error::AuctionError;
use crate::events::{parse_frame, AuctionEvent, EventKind, Frame};
use crate::types::{AppConfig, PlayerInfo, PlayerMap, Team, ANNOUNCEMENT_HISTORY_LIMIT};
use chrono::{DateTime, Local};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// What every view renders. Only [`AuctionStore`] mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct AuctionSnapshot {
    pub current_team: Option<Team>,
    pub highest_bid: u32,
    pub countdown: u32,
    pub players: PlayerMap,
    pub remaining: Vec<Team>,
    pub all_teams: Vec<Team>,
    pub announcement: Option<String>,
}

impl AuctionSnapshot {
    pub fn new(base_bid: u32, countdown: u32) -> Self {
        AuctionSnapshot {
            current_team: None,
            highest_bid: base_bid,
            countdown,
            players: PlayerMap::new(),
            remaining: Vec::new(),
            all_teams: Vec::new(),
            announcement: None,
        }
    }

    pub fn player(&self, name: &str) -> Option<&PlayerInfo> {
        self.players.get(name)
    }

    /// Default amount offered in the bid box.
    pub fn suggested_bid(&self) -> u32 {
        self.highest_bid.saturating_add(1)
    }

    /// Players by points (highest first), ties broken by name.
    pub fn standings(&self) -> Vec<&PlayerInfo> {
        let mut players: Vec<&PlayerInfo> = self.players.values().collect();
        players.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.name.cmp(&b.name)));
        players
    }

    /// Best score of any owned team, used to scale the standings colours.
    pub fn top_team_points(&self) -> u32 {
        self
            .players
            .values()
            .flat_map(|p| p.teams.iter())
            .map(|t| t.points)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub text: String,
    pub received_at: DateTime<Local>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    Applied(EventKind),
    /// Sequenced frame not newer than the last one of its kind. Dropped.
    Stale(EventKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    GameStarted,
    Folded(FoldOutcome),
}

/// Folds push frames into one consistent [`AuctionSnapshot`].
#[derive(Debug)]
pub struct AuctionStore {
    snapshot: AuctionSnapshot,
    base_bid: u32,
    announcement_pending: bool,
    history: VecDeque<Announcement>,
    last_seq: HashMap<EventKind, u64>,
}

impl AuctionStore {
    pub fn new(base_bid: u32, starting_countdown: u32) -> Self {
        AuctionStore {
            snapshot: AuctionSnapshot::new(base_bid, starting_countdown),
            base_bid,
            announcement_pending: false,
            history: VecDeque::new(),
            last_seq: HashMap::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        AuctionStore::new(config.base_bid, config.starting_countdown)
    }

    pub fn snapshot(&self) -> &AuctionSnapshot {
        &self.snapshot
    }

    pub fn base_bid(&self) -> u32 {
        self.base_bid
    }

    /// Decodes and folds one raw frame. A malformed frame leaves the snapshot
    /// untouched.
    pub fn ingest(&mut self, raw: &str) -> Result<Ingested, AuctionError> {
        match parse_frame(raw) {
            Ok(Frame::GameStarted) => Ok(Ingested::GameStarted),
            Ok(Frame::Event { event, seq }) => Ok(Ingested::Folded(self.apply_sequenced(event, seq))),
            Err(err) => {
                warn!("Dropping push frame: {err}");
                Err(err)
            }
        }
    }

    /// Frames without a sequence number are applied in arrival order.
    pub fn apply_sequenced(&mut self, event: AuctionEvent, seq: Option<u64>) -> FoldOutcome {
        let kind = event.kind();
        if let Some(seq) = seq {
            if let Some(last) = self.last_seq.get(&kind) {
                if seq <= *last {
                    debug!("Dropping stale {kind} frame (seq {seq} <= {last})");
                    return FoldOutcome::Stale(kind);
                }
            }
            self.last_seq.insert(kind, seq);
        }
        self.apply(event);
        FoldOutcome::Applied(kind)
    }

    pub fn apply(&mut self, event: AuctionEvent) {
        match event {
            AuctionEvent::Players(players) => self.snapshot.players = players,
            AuctionEvent::Bid(bid) => self.snapshot.highest_bid = bid,
            AuctionEvent::Countdown(seconds) => self.snapshot.countdown = seconds,
            AuctionEvent::Team(team) => {
                debug!("{} is on the block", team.short_name);
                self.snapshot.current_team = Some(team);
                self.snapshot.highest_bid = self.base_bid;
            }
            AuctionEvent::Log(text) => {
                self.history.push_back(Announcement {
                    text: text.clone(),
                    received_at: Local::now(),
                });
                while self.history.len() > ANNOUNCEMENT_HISTORY_LIMIT {
                    self.history.pop_front();
                }
                self.snapshot.announcement = Some(text);
                self.announcement_pending = true;
            }
            AuctionEvent::Remaining(teams) => self.snapshot.remaining = teams,
            AuctionEvent::AllTeams(teams) => self.snapshot.all_teams = teams,
        }
    }

    /// Returns the latest announcement once per `log` frame, even when the
    /// text repeats.
    pub fn take_announcement(&mut self) -> Option<String> {
        if !self.announcement_pending {
            return None;
        }
        self.announcement_pending = false;
        self.snapshot.announcement.clone()
    }

    pub fn history(&self) -> impl Iterator<Item = &Announcement> {
        self.history.iter()
    }
}

/// `HH:MM:SS`, as shown next to the bid box.
pub fn format_countdown(seconds: u32) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}
