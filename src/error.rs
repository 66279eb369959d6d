use crate::assets::Asset;
use crate::id::Address;
use crate::ledger::Amount;
use std::io;
use thiserror::Error;

/// Represents all possible errors that can occur while authorizing, executing
/// or settling DAO actions. Every error aborts the call frame it occurs in and
/// leaves the chain state as it was before that frame.
#[derive(Error, Debug)]
pub enum DaoError {
    /// A signature did not verify against the action digest for its claimed signer
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Two signatures recovered to the same identity
    #[error("Duplicate signer: {0}")]
    DuplicateSigner(Address),

    /// A signer with zero ownership weight, rejected under `SignerPolicy::RequireWeight`
    #[error("Signer {0} holds no ownership weight")]
    SignerWithoutWeight(Address),

    /// The signed weight is below the quorum percentage of the total supply
    #[error("Quorum not reached: {weight} of {total_supply} signed, {quorum}% required")]
    QuorumNotReached {
        weight: Amount,
        total_supply: Amount,
        quorum: u8,
    },

    /// The action digest was executed before
    #[error("Action already executed")]
    AlreadyExecuted,

    /// The action timestamp is older than the configured validity window
    #[error("Action expired: signed at {timestamp}, now {now}")]
    ActionExpired { timestamp: u64, now: i64 },

    /// The caller is not allowed to use this call path
    #[error("Not permitted: {0}")]
    NotPermitted(Address),

    #[error("Minting is disabled")]
    MintingDisabled,

    #[error("Burning is disabled")]
    BurningDisabled,

    /// A mintable/burnable status was frozen and can no longer change
    #[error("Status is frozen")]
    StatusFrozen,

    #[error("Offer is disabled")]
    OfferDisabled,

    #[error("Offer is already settled")]
    OfferAlreadySettled,

    /// The treasury could not pay a redemption share
    #[error("Insufficient treasury balance of {asset}: {requested} requested, {available} available")]
    InsufficientTreasury {
        asset: Asset,
        requested: Amount,
        available: Amount,
    },

    /// A holder does not own enough units for a transfer or burn
    #[error("Insufficient balance: {requested} requested, {available} available")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("Length mismatch: {partners} partners, {shares} shares")]
    LengthMismatch { partners: usize, shares: usize },

    #[error("GovToken already exists for DAO {0}")]
    GovTokenAlreadyExists(Address),

    #[error("No GovToken exists for DAO {0}")]
    GovTokenMissing(Address),

    #[error("Invalid quorum {0}, expected 1..=100")]
    InvalidQuorum(u8),

    #[error("Amount must be non-zero")]
    ZeroAmount,

    #[error("Asset {0} listed more than once")]
    DuplicateAsset(Address),

    /// An adapter still holds GovToken units and cannot be removed
    #[error("Adapter {0} still holds a redeemable claim")]
    AdapterHasClaim(Address),

    #[error("Already present: {0}")]
    AlreadyPresent(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A payload could not be decoded by its target
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// An external contract rejected the call
    #[error("Call reverted: {0}")]
    Reverted(String),

    #[error("Call depth {0} exceeded")]
    CallDepthExceeded(usize),

    /// A redemption was entered again while it was still paying out
    #[error("Re-entrant redemption of {0}")]
    Reentrant(Address),

    #[error("Arithmetic overflow")]
    Overflow,

    /// IO errors that occur when reading/writing snapshot files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors from the underlying database backend
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored snapshot failed its integrity check
    #[error("Corrupted snapshot: {0}")]
    Corrupted(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Anyhow error wrapper for error context
    #[error(transparent)]
    Context(#[from] anyhow::Error),
}

impl From<bincode::Error> for DaoError {
    fn from(err: bincode::Error) -> Self {
        DaoError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DaoError {
    fn from(err: serde_json::Error) -> Self {
        DaoError::Serialization(err.to_string())
    }
}

#[cfg(feature = "rocksdb")]
impl From<rocksdb::Error> for DaoError {
    fn from(err: rocksdb::Error) -> Self {
        DaoError::Database(err.to_string())
    }
}
