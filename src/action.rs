use crate::assets::Asset;
use crate::error::DaoError;
use crate::id::Address;
use crate::ledger::Amount;
use crate::signature::{ActionDigest, Approval};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A proposed call made on behalf of a DAO
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// The address receiving the call
    pub target: Address,

    /// Opaque call encoding interpreted by the target
    pub payload: Vec<u8>,

    /// Native currency sent from the DAO treasury along with the call
    pub value: Amount,

    /// Distinguishes otherwise identical actions
    pub nonce: u64,

    /// Unix seconds chosen by the signers
    pub timestamp: u64,
}

impl Action {
    pub fn new(target: Address, payload: Vec<u8>) -> Self {
        Self {
            target,
            payload,
            value: 0,
            nonce: 0,
            timestamp: 0,
        }
    }

    /// Create an action whose payload is a typed call for the target
    pub fn call<C: Serialize>(target: Address, call: &C) -> Result<Self, DaoError> {
        Ok(Self::new(target, encode_call(call)?))
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Audit record of an action executed through the quorum path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedAction {
    pub digest: ActionDigest,
    pub action: Action,
    pub approvals: Vec<Approval>,
    pub executed_at: DateTime<Utc>,
}

/// Audit record of a call made through the permitted fast path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermittedCall {
    pub sender: Address,
    pub target: Address,
    pub payload: Vec<u8>,
    pub value: Amount,
    pub executed_at: DateTime<Utc>,
}

/// Events appended to the chain by successful operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEvent {
    DaoCreated {
        dao: Address,
        name: String,
        symbol: String,
    },
    Executed {
        dao: Address,
        record: ExecutedAction,
    },
    ExecutedPermitted {
        dao: Address,
        call: PermittedCall,
    },
    GovTokenCreated {
        dao: Address,
        gov_token: Address,
    },
    PublicOfferInitialized {
        dao: Address,
        is_active: bool,
        currency: Asset,
        rate: Amount,
    },
    PrivateOfferCreated {
        dao: Address,
        index: usize,
        recipient: Address,
    },
    PrivateOfferStatusChanged {
        dao: Address,
        index: usize,
        is_active: bool,
    },
    PublicOfferBought {
        dao: Address,
        buyer: Address,
        paid: Amount,
        minted: Amount,
    },
    PrivateOfferBought {
        dao: Address,
        buyer: Address,
        index: usize,
    },
    Redeemed {
        gov_token: Address,
        holder: Address,
        amount: Amount,
        payouts: Vec<(Asset, Amount)>,
    },
}

/// Encode a typed call into an opaque payload
pub fn encode_call<C: Serialize>(call: &C) -> Result<Vec<u8>, DaoError> {
    Ok(bincode::serialize(call)?)
}

/// Decode an opaque payload into the typed call a target understands
pub fn decode_call<C: DeserializeOwned>(payload: &[u8]) -> Result<C, DaoError> {
    bincode::deserialize(payload).map_err(|e| DaoError::InvalidPayload(e.to_string()))
}
