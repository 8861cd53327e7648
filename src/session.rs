use crate::auction::{AuctionSnapshot, AuctionStore, FoldOutcome, Ingested};
use crate::bracket::{build_from_roster, matches_for_team};
use crate::bid::{BidContext, BidDesk, BidTransport};
use crate::connection::FrameSource;
use crate::error::AuctionError;
use crate::events::EventKind;
use crate::types::{BidRequest, Match};
use std::sync::{
    mpsc::{self, Receiver, Sender},
    Arc,
};
use tracing::{info, warn};

pub type SharedTransport = Arc<dyn BidTransport + Send + Sync>;

type Completion = (BidRequest, Result<(), String>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Connected, waiting for the house to open bidding.
    Lobby,
    Auction,
    Closed,
}

/// Ambient audio may only start after the local user did something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ambience {
    NotStarted,
    Started,
}

/// Settled bid, reported back to whoever drives the session.
#[derive(Debug, Clone, PartialEq)]
pub enum BidOutcome {
    Accepted(BidRequest),
    Rejected(BidRequest, AuctionError),
}

/// One player's live view of one game: the push socket, the snapshot it
/// feeds, and the bids that player sends.
///
/// Everything runs on the caller's thread except the HTTP call of a bid,
/// which goes to a worker thread and comes back through [`Self::poll`].
pub struct AuctionSession<S: FrameSource> {
    game_id: String,
    player: String,
    store: AuctionStore,
    desk: BidDesk,
    source: S,
    transport: SharedTransport,
    completions_tx: Sender<Completion>,
    completions_rx: Option<Receiver<Completion>>,
    mode: SessionMode,
    ambience: Ambience,
    banner: Option<String>,
    bracket: Option<Vec<Match>>,
}

impl<S: FrameSource> AuctionSession<S> {
    pub fn new(game_id: &str, player: &str, store: AuctionStore, source: S, transport: SharedTransport) -> Self {
        let (completions_tx, completions_rx) = mpsc::channel();
        AuctionSession {
            game_id: game_id.to_string(),
            player: player.to_string(),
            store,
            desk: BidDesk::new(),
            source,
            transport,
            completions_tx,
            completions_rx: Some(completions_rx),
            mode: SessionMode::Lobby,
            ambience: Ambience::NotStarted,
            banner: None,
            bracket: None,
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn player(&self) -> &str {
        &self.player
    }

    pub fn snapshot(&self) -> &AuctionSnapshot {
        self.store.snapshot()
    }

    pub fn store(&self) -> &AuctionStore {
        &self.store
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn ambience(&self) -> Ambience {
        self.ambience
    }

    /// Non-fatal connection problem to show above the auction view.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    /// Skeleton built from the first non-empty roster the house pushed.
    pub fn bracket(&self) -> Option<&[Match]> {
        self.bracket.as_deref()
    }

    /// Matches of the team currently on the block.
    pub fn highlighted_matches(&self) -> Vec<&Match> {
        match (&self.bracket, &self.store.snapshot().current_team) {
            (Some(bracket), Some(team)) => matches_for_team(bracket, &team.short_name),
            _ => Vec::new(),
        }
    }

    pub fn bid_pending(&self) -> bool {
        self.desk.is_pending(&self.player)
    }

    pub fn take_announcement(&mut self) -> Option<String> {
        self.store.take_announcement()
    }

    /// Marks the first user interaction. Later calls change nothing.
    pub fn note_interaction(&mut self) {
        if self.ambience == Ambience::NotStarted {
            self.ambience = Ambience::Started;
        }
    }

    /// Settles finished bids, then reads and folds at most one frame.
    /// `Ok(None)` means no frame was waiting.
    pub fn poll(&mut self) -> (Vec<BidOutcome>, Result<Option<Ingested>, AuctionError>) {
        let outcomes = self.settle_completed();
        (outcomes, self.read_one())
    }

    fn read_one(&mut self) -> Result<Option<Ingested>, AuctionError> {
        if self.mode == SessionMode::Closed {
            return Ok(None);
        }
        if !self.source.is_open() {
            return Err(AuctionError::ConnectionError("not connected".to_string()));
        }
        let raw = match self.source.next_frame() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(err) => {
                if let AuctionError::ConnectionError(detail) = &err {
                    warn!("Live updates lost for game {}: {detail}", self.game_id);
                    self.banner = Some(format!("Live updates interrupted: {detail}"));
                }
                return Err(err);
            }
        };
        let ingested = self.store.ingest(&raw)?;
        if ingested == Ingested::Folded(FoldOutcome::Applied(EventKind::AllTeams)) {
            self.build_bracket();
        }
        if ingested == Ingested::GameStarted && self.mode == SessionMode::Lobby {
            info!("Bidding opened for game {}", self.game_id);
            self.mode = SessionMode::Auction;
        }
        Ok(Some(ingested))
    }

    /// Validates a typed amount and sends it in the background.
    pub fn submit_bid(&mut self, raw: &str) -> Result<u32, AuctionError> {
        self.note_interaction();
        let ctx = self.bid_context()?;
        let request = self.desk.prepare(raw, &ctx)?;
        Ok(self.dispatch(request))
    }

    /// Bids what the bid box starts at: one above the highest bid.
    pub fn submit_suggested(&mut self) -> Result<u32, AuctionError> {
        let amount = self.store.snapshot().suggested_bid();
        self.submit_bid(&amount.to_string())
    }

    pub fn quick_bid(&mut self, increment: u32) -> Result<u32, AuctionError> {
        self.note_interaction();
        let ctx = self.bid_context()?;
        let request = self.desk.prepare_quick(increment, &ctx)?;
        Ok(self.dispatch(request))
    }

    fn build_bracket(&mut self) {
        let roster = &self.store.snapshot().all_teams;
        if self.bracket.is_some() || roster.is_empty() {
            return;
        }
        match build_from_roster(roster) {
            Ok(bracket) => {
                info!("Bracket for game {} built from {} teams", self.game_id, roster.len());
                self.bracket = Some(bracket);
            }
            Err(e) => warn!("Roster for game {} does not form a bracket: {e}", self.game_id),
        }
    }

    fn bid_context(&self) -> Result<BidContext, AuctionError> {
        match self.mode {
            SessionMode::Closed => return Err(AuctionError::SubmissionFailed("session is closed".to_string())),
            SessionMode::Lobby => return Err(AuctionError::SubmissionFailed("bidding has not opened yet".to_string())),
            SessionMode::Auction => {}
        }
        if self.desk.is_pending(&self.player) {
            return Err(AuctionError::SubmissionInProgress);
        }
        BidContext::from_snapshot(self.store.snapshot(), &self.game_id, &self.player)
    }

    fn dispatch(&self, request: BidRequest) -> u32 {
        let amount = request.bid;
        let transport = Arc::clone(&self.transport);
        let tx = self.completions_tx.clone();
        std::thread::spawn(move || {
            let outcome = transport.post_bid(&request);
            // Receiver is gone once the session closed; the result is dropped.
            let _ = tx.send((request, outcome));
        });
        amount
    }

    /// Collects every bid whose request finished since the last call.
    pub fn settle_completed(&mut self) -> Vec<BidOutcome> {
        let finished: Vec<Completion> = match &self.completions_rx {
            Some(rx) => rx.try_iter().collect(),
            None => return Vec::new(),
        };
        finished
            .into_iter()
            .map(|(request, outcome)| match self.desk.settle(&request, outcome) {
                Ok(()) => BidOutcome::Accepted(request),
                Err(err) => BidOutcome::Rejected(request, err),
            })
            .collect()
    }

    /// Tears the session down. Bids still in flight are ignored when they land.
    pub fn close(&mut self) {
        if self.mode == SessionMode::Closed {
            return;
        }
        self.mode = SessionMode::Closed;
        self.completions_rx = None;
        self.source.close();
        info!("{} left game {}", self.player, self.game_id);
    }
}

impl<S: FrameSource> Drop for AuctionSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}
