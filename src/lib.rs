pub mod action;
pub mod assets;
pub mod config;
pub mod dao;
pub mod error;
pub mod gov_token;
pub mod id;
pub mod ledger;
pub mod offer_book;
pub mod runtime;
pub mod signature;
pub mod storage;
pub mod storage_traits;

// Re-export the main types for convenience
pub use action::{decode_call, encode_call, Action, ChainEvent, ExecutedAction, PermittedCall};
pub use assets::{Asset, AssetToken, Bank, TokenCall};
pub use config::ChainConfig;
pub use dao::{Dao, DaoCall};
pub use error::DaoError;
pub use gov_token::{proportional_share, GovToken, GovTokenCall};
pub use id::Address;
pub use ledger::{Amount, OwnershipLedger, SupplyGate};
pub use offer_book::{OfferBook, OfferBookCall, OfferStatus, PrivateOffer, PublicOffer};
pub use runtime::{CallContext, Chain, ChainSnapshot, ChainState, Contract, Host};
pub use signature::{
    action_digest,
    quorum_reached,
    total_weight,
    ActionDigest,
    Approval,
    SignatureAuthorizer,
    SignerPolicy,
    WeightedSigner,
};
pub use storage::FileChainStore;
#[cfg(feature = "rocksdb")]
pub use storage::RocksDbChainStore;
pub use storage_traits::{ChainStore, MemoryChainStore};
