//! Off-chain approval verification
//!
//! Members approve an action by signing its digest with their ed25519 key. The
//! digest binds every action field together with the DAO address and the chain
//! id, so an approval cannot be replayed against another DAO or another chain.
//! Verification is a pure function of the digest and the detached approvals.

use crate::action::Action;
use crate::error::DaoError;
use crate::id::Address;
use crate::ledger::{Amount, OwnershipLedger};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Canonical hash of an action; the unit of replay protection
pub type ActionDigest = [u8; 32];

const ACTION_DOMAIN: &[u8] = b"DAO_Action_v1";

#[derive(Serialize)]
struct DigestInput<'a> {
    dao: &'a Address,
    target: &'a Address,
    payload: &'a [u8],
    value: Amount,
    nonce: u64,
    timestamp: u64,
    chain_id: u64,
}

/// Compute the digest members sign to approve `action` for `dao` on `chain_id`
pub fn action_digest(dao: &Address, action: &Action, chain_id: u64) -> Result<ActionDigest, DaoError> {
    let encoded = bincode::serialize(&DigestInput {
        dao,
        target: &action.target,
        payload: &action.payload,
        value: action.value,
        nonce: action.nonce,
        timestamp: action.timestamp,
        chain_id,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(ACTION_DOMAIN);
    hasher.update(&encoded);
    Ok(hasher.finalize().into())
}

/// A detached signature over an action digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    /// The member address (verifying key) claimed to have signed
    pub signer: Address,
    /// Raw 64-byte ed25519 signature
    pub signature: Vec<u8>,
}

impl Approval {
    pub fn sign(key: &SigningKey, digest: &ActionDigest) -> Self {
        Self {
            signer: Address::from(&key.verifying_key()),
            signature: key.sign(digest).to_bytes().to_vec(),
        }
    }

    /// Recover the identity that produced this approval
    pub fn recover(&self, digest: &ActionDigest) -> Result<Address, DaoError> {
        let key = self
            .signer
            .verifying_key()
            .ok_or_else(|| DaoError::InvalidSignature(format!("{} is not a signing key", self.signer)))?;

        let signature = Signature::from_slice(&self.signature)
            .map_err(|e| DaoError::InvalidSignature(format!("malformed signature from {}: {}", self.signer, e)))?;

        key.verify(digest, &signature)
            .map_err(|_| DaoError::InvalidSignature(format!("signature from {} does not match digest", self.signer)))?;

        Ok(self.signer)
    }
}

/// Whether signers without ownership weight are accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerPolicy {
    /// Zero-weight signers contribute nothing but are not an error
    #[default]
    AllowZeroWeight,
    /// Every signer must hold a non-zero balance
    RequireWeight,
}

/// A recovered signer together with its ownership weight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedSigner {
    pub signer: Address,
    pub weight: Amount,
}

/// Verifies approval sets against an action digest
pub struct SignatureAuthorizer {
    policy: SignerPolicy,
}

impl SignatureAuthorizer {
    pub fn new(policy: SignerPolicy) -> Self {
        Self { policy }
    }

    /// Recover the distinct signers of `approvals`, in submission order
    ///
    /// # Returns
    /// The recovered identities, `InvalidSignature` when any approval fails to
    /// verify, or `DuplicateSigner` when two approvals recover to the same identity
    pub fn recover_signers(
        &self,
        digest: &ActionDigest,
        approvals: &[Approval],
    ) -> Result<Vec<Address>, DaoError> {
        let mut seen = BTreeSet::new();
        let mut signers = Vec::with_capacity(approvals.len());

        for approval in approvals {
            let signer = approval.recover(digest)?;
            if !seen.insert(signer) {
                return Err(DaoError::DuplicateSigner(signer));
            }
            signers.push(signer);
        }

        Ok(signers)
    }

    /// Recover the signers and attach their current weight in `ledger`
    pub fn authorize(
        &self,
        digest: &ActionDigest,
        approvals: &[Approval],
        ledger: &OwnershipLedger,
    ) -> Result<Vec<WeightedSigner>, DaoError> {
        self.recover_signers(digest, approvals)?
            .into_iter()
            .map(|signer| {
                let weight = ledger.balance_of(&signer);
                if weight == 0 && self.policy == SignerPolicy::RequireWeight {
                    return Err(DaoError::SignerWithoutWeight(signer));
                }
                Ok(WeightedSigner { signer, weight })
            })
            .collect()
    }
}

/// Total weight of a signer set. Distinct holders never sum past the total supply.
pub fn total_weight(signers: &[WeightedSigner]) -> Result<Amount, DaoError> {
    signers
        .iter()
        .try_fold(0 as Amount, |sum, signer| sum.checked_add(signer.weight))
        .ok_or(DaoError::Overflow)
}

/// `weight * 100 >= quorum * total_supply`. An empty ledger never reaches quorum.
pub fn quorum_reached(weight: Amount, total_supply: Amount, quorum: u8) -> Result<bool, DaoError> {
    if total_supply == 0 {
        return Ok(false);
    }
    let signed = weight.checked_mul(100).ok_or(DaoError::Overflow)?;
    let required = total_supply
        .checked_mul(Amount::from(quorum))
        .ok_or(DaoError::Overflow)?;
    Ok(signed >= required)
}
