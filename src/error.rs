use thiserror::Error;

/// Everything that can go wrong between the push socket, the fold and a bid.
/// None of these are fatal: the worst outcome is a stale snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    /// Unparseable or unrecognised push frame. Dropped; the fold is untouched.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// Transport failure or unexpected close of the push socket.
    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("'{0}' is not a valid bid amount")]
    InvalidAmount(String),

    #[error("bid ${bid} must be higher than the current highest bid ${highest}")]
    BidTooLow { bid: u32, highest: u32 },

    #[error("bid ${bid} exceeds your available balance ${balance}")]
    InsufficientBalance { bid: u32, balance: u32 },

    #[error("a bid is already being submitted")]
    SubmissionInProgress,

    /// The house rejected the bid, the request never made it, or bidding
    /// is not open.
    #[error("bid submission failed: {0}")]
    SubmissionFailed(String),
}

impl AuctionError {
    /// Local validation failures that are reported without touching the network.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AuctionError::InvalidAmount(_)
                | AuctionError::BidTooLow { .. }
                | AuctionError::InsufficientBalance { .. }
                | AuctionError::SubmissionInProgress
        )
    }
}
