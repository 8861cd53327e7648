use crate::auction::AuctionSnapshot;
use crate::error::AuctionError;
use crate::types::BidRequest;
use std::collections::HashSet;
use tracing::{info, warn};

/// Sends a validated bid to the house. Any error string means the bid was
/// not accepted.
pub trait BidTransport {
    fn post_bid(&self, request: &BidRequest) -> Result<(), String>;
}

/// Everything a bid is checked against, captured from the snapshot at the
/// moment the player hits submit.
#[derive(Debug, Clone, PartialEq)]
pub struct BidContext {
    pub game_id: String,
    pub player: String,
    pub team: String,
    pub highest_bid: u32,
    pub balance: u32,
}

impl BidContext {
    pub fn from_snapshot(snapshot: &AuctionSnapshot, game_id: &str, player: &str) -> Result<Self, AuctionError> {
        let team = snapshot
            .current_team
            .as_ref()
            .ok_or_else(|| AuctionError::SubmissionFailed("no team is up for bid".to_string()))?;
        let balance = snapshot.player(player).map(|p| p.balance).unwrap_or(0);
        Ok(BidContext {
            game_id: game_id.to_string(),
            player: player.to_string(),
            team: team.short_name.clone(),
            highest_bid: snapshot.highest_bid,
            balance,
        })
    }
}

pub fn parse_amount(raw: &str) -> Result<u32, AuctionError> {
    let trimmed = raw.trim();
    match trimmed.parse::<u32>() {
        Ok(amount) if amount > 0 => Ok(amount),
        _ => Err(AuctionError::InvalidAmount(trimmed.to_string())),
    }
}

pub fn validate_bid(amount: u32, ctx: &BidContext) -> Result<(), AuctionError> {
    if amount <= ctx.highest_bid {
        return Err(AuctionError::BidTooLow {
            bid: amount,
            highest: ctx.highest_bid,
        });
    }
    if amount > ctx.balance {
        return Err(AuctionError::InsufficientBalance {
            bid: amount,
            balance: ctx.balance,
        });
    }
    Ok(())
}

pub fn quick_bid_amount(increment: u32, highest_bid: u32) -> Result<u32, AuctionError> {
    if increment == 0 {
        return Err(AuctionError::InvalidAmount(increment.to_string()));
    }
    highest_bid
        .checked_add(increment)
        .ok_or_else(|| AuctionError::InvalidAmount(format!("{highest_bid}+{increment}")))
}

/// Tracks which players have a bid in flight. At most one per player.
#[derive(Debug, Default)]
pub struct BidDesk {
    pending: HashSet<String>,
}

impl BidDesk {
    pub fn new() -> Self {
        BidDesk::default()
    }

    pub fn is_pending(&self, player: &str) -> bool {
        self.pending.contains(player)
    }

    /// Validates a typed amount and marks the player as pending. The caller
    /// must hand the outcome of the request back through [`BidDesk::settle`].
    pub fn prepare(&mut self, raw: &str, ctx: &BidContext) -> Result<BidRequest, AuctionError> {
        if self.is_pending(&ctx.player) {
            return Err(AuctionError::SubmissionInProgress);
        }
        let amount = parse_amount(raw)?;
        validate_bid(amount, ctx)?;
        self.pending.insert(ctx.player.clone());
        Ok(BidRequest {
            game_id: ctx.game_id.clone(),
            player: ctx.player.clone(),
            bid: amount,
            team: ctx.team.clone(),
        })
    }

    pub fn prepare_quick(&mut self, increment: u32, ctx: &BidContext) -> Result<BidRequest, AuctionError> {
        if self.is_pending(&ctx.player) {
            return Err(AuctionError::SubmissionInProgress);
        }
        let amount = quick_bid_amount(increment, ctx.highest_bid)?;
        self.prepare(&amount.to_string(), ctx)
    }

    /// Clears the pending flag. No retry is attempted on failure.
    pub fn settle(&mut self, request: &BidRequest, outcome: Result<(), String>) -> Result<(), AuctionError> {
        self.pending.remove(&request.player);
        match outcome {
            Ok(()) => {
                info!("{} bid ${} on {}", request.player, request.bid, request.team);
                Ok(())
            }
            Err(err) => {
                warn!("Bid of ${} by {} failed: {err}", request.bid, request.player);
                Err(AuctionError::SubmissionFailed(err))
            }
        }
    }

    /// Validates, sends and settles in one blocking call.
    pub fn submit<T: BidTransport + ?Sized>(
        &mut self,
        raw: &str,
        ctx: &BidContext,
        transport: &T,
    ) -> Result<u32, AuctionError> {
        let request = self.prepare(raw, ctx)?;
        let outcome = transport.post_bid(&request);
        self.settle(&request, outcome)?;
        Ok(request.bid)
    }

    /// Bids `highest + increment` through the same path as a typed amount.
    pub fn quick_bid<T: BidTransport + ?Sized>(
        &mut self,
        increment: u32,
        ctx: &BidContext,
        transport: &T,
    ) -> Result<u32, AuctionError> {
        let request = self.prepare_quick(increment, ctx)?;
        let outcome = transport.post_bid(&request);
        self.settle(&request, outcome)?;
        Ok(request.bid)
    }
}
