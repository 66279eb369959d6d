//! The DAO: an ownership ledger, a treasury address and two ways to act.
//!
//! The quorum path runs an action once a weighted quorum of owners signed its
//! digest off-chain. The permitted path lets allow-listed delegates (adapters,
//! the GovToken) call through the DAO without signatures. Administrative
//! calls are only honored when the DAO calls itself, i.e. when they arrive as
//! an executed action.

use crate::action::{Action, ChainEvent, ExecutedAction, PermittedCall};
use crate::error::DaoError;
use crate::id::Address;
use crate::ledger::{Amount, OwnershipLedger, SupplyGate};
use crate::runtime::{CallContext, Chain};
use crate::signature::{self, quorum_reached, total_weight, ActionDigest, Approval, SignatureAuthorizer};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub(crate) const DAO_SEED: &[u8] = b"dao";

/// Calls understood by a DAO address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaoCall {
    Mint { to: Address, amount: Amount },
    Burn { from: Address, amount: Amount },
    Move { from: Address, to: Address, amount: Amount },
    ChangeQuorum { quorum: u8 },
    ChangeMintable { enabled: bool },
    ChangeBurnable { enabled: bool },
    FreezeMintingStatus,
    FreezeBurningStatus,
    AddAdapter { adapter: Address },
    RemoveAdapter { adapter: Address },
    AddPermitted { member: Address },
    RemovePermitted { member: Address },
    /// Sent by the offer book when it deploys the DAO's GovToken
    SetGovToken { gov_token: Address },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dao {
    pub(crate) address: Address,
    pub(crate) name: String,
    pub(crate) symbol: String,
    pub(crate) ledger: OwnershipLedger,
    pub(crate) quorum: u8,
    pub(crate) executed_digests: BTreeSet<ActionDigest>,
    pub(crate) executed_actions: Vec<ExecutedAction>,
    pub(crate) executed_permitted: Vec<PermittedCall>,
    pub(crate) adapters: BTreeSet<Address>,
    pub(crate) permitted: BTreeSet<Address>,
    pub(crate) minting: SupplyGate,
    pub(crate) burning: SupplyGate,
    pub(crate) gov_token: Option<Address>,
    pub(crate) offer_book: Address,
}

impl Dao {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn ledger(&self) -> &OwnershipLedger {
        &self.ledger
    }

    pub fn balance_of(&self, holder: &Address) -> Amount {
        self.ledger.balance_of(holder)
    }

    pub fn total_supply(&self) -> Amount {
        self.ledger.total_supply()
    }

    /// Percentage of the total supply that must sign an action
    pub fn quorum(&self) -> u8 {
        self.quorum
    }

    pub fn is_executed(&self, digest: &ActionDigest) -> bool {
        self.executed_digests.contains(digest)
    }

    pub fn executed_actions(&self) -> &[ExecutedAction] {
        &self.executed_actions
    }

    pub fn executed_permitted(&self) -> &[PermittedCall] {
        &self.executed_permitted
    }

    pub fn adapters(&self) -> impl Iterator<Item = &Address> {
        self.adapters.iter()
    }

    pub fn is_adapter(&self, address: &Address) -> bool {
        self.adapters.contains(address)
    }

    pub fn number_of_adapters(&self) -> usize {
        self.adapters.len()
    }

    /// Delegates allowed on the permitted path, adapters and the GovToken included
    pub fn permitted(&self) -> impl Iterator<Item = &Address> {
        self.permitted.iter()
    }

    pub fn is_permitted(&self, address: &Address) -> bool {
        self.permitted.contains(address)
    }

    pub fn number_of_permitted(&self) -> usize {
        self.permitted.len()
    }

    pub fn minting(&self) -> SupplyGate {
        self.minting
    }

    pub fn burning(&self) -> SupplyGate {
        self.burning
    }

    pub fn gov_token(&self) -> Option<Address> {
        self.gov_token
    }

    pub fn offer_book(&self) -> Address {
        self.offer_book
    }

    pub(crate) fn checkpoint(&self) -> DaoCheckpoint {
        DaoCheckpoint {
            ledger: self.ledger.clone(),
            quorum: self.quorum,
            adapters: self.adapters.clone(),
            permitted: self.permitted.clone(),
            minting: self.minting,
            burning: self.burning,
            gov_token: self.gov_token,
            executed_actions: self.executed_actions.len(),
            executed_permitted: self.executed_permitted.len(),
        }
    }

    pub(crate) fn restore(&mut self, saved: DaoCheckpoint) {
        // Every digest entered together with its record
        let kept = saved.executed_actions.min(self.executed_actions.len());
        for record in self.executed_actions.drain(kept..) {
            self.executed_digests.remove(&record.digest);
        }
        self.executed_permitted.truncate(saved.executed_permitted);

        self.ledger = saved.ledger;
        self.quorum = saved.quorum;
        self.adapters = saved.adapters;
        self.permitted = saved.permitted;
        self.minting = saved.minting;
        self.burning = saved.burning;
        self.gov_token = saved.gov_token;
    }
}

/// What a call frame needs to undo a DAO: its mutable settings and the
/// lengths of its execution histories
pub(crate) struct DaoCheckpoint {
    ledger: OwnershipLedger,
    quorum: u8,
    adapters: BTreeSet<Address>,
    permitted: BTreeSet<Address>,
    minting: SupplyGate,
    burning: SupplyGate,
    gov_token: Option<Address>,
    executed_actions: usize,
    executed_permitted: usize,
}

fn validate_quorum(quorum: u8) -> Result<u8, DaoError> {
    if quorum == 0 || quorum > 100 {
        return Err(DaoError::InvalidQuorum(quorum));
    }
    Ok(quorum)
}

impl Chain {
    /// Deploy a new DAO
    ///
    /// # Parameters
    /// * `quorum` - Percentage of the total supply that must approve actions, 1..=100
    /// * `partners` - Initial owners
    /// * `shares` - Ownership units for the partner at the same index
    ///
    /// # Returns
    /// The DAO address, `LengthMismatch` or `InvalidQuorum`
    pub fn create_dao(
        &mut self,
        name: &str,
        symbol: &str,
        quorum: u8,
        partners: &[Address],
        shares: &[Amount],
    ) -> Result<Address, DaoError> {
        self.atomically(|chain| {
            let quorum = validate_quorum(quorum)?;
            let ledger = OwnershipLedger::with_allocations(partners, shares)?;

            let index = chain.state.daos.len();
            let index_bytes = (index as u64).to_le_bytes();
            let address = Address::find(&[DAO_SEED, index_bytes.as_slice()])?;

            chain.state.daos.push(Dao {
                address,
                name: name.to_string(),
                symbol: symbol.to_string(),
                ledger,
                quorum,
                executed_digests: BTreeSet::new(),
                executed_actions: Vec::new(),
                executed_permitted: Vec::new(),
                adapters: BTreeSet::new(),
                permitted: BTreeSet::new(),
                minting: SupplyGate::default(),
                burning: SupplyGate::default(),
                gov_token: None,
                offer_book: chain.state.offer_book.address(),
            });
            chain.state.dao_index.insert(address, index);
            chain.state.events.push(ChainEvent::DaoCreated {
                dao: address,
                name: name.to_string(),
                symbol: symbol.to_string(),
            });

            info!("Created DAO {} ({}) at {} with quorum {}%", name, symbol, address, quorum);
            Ok(address)
        })
    }

    pub fn dao(&self, address: &Address) -> Result<&Dao, DaoError> {
        self.state.dao(address)
    }

    /// DAOs in creation order
    pub fn dao_at(&self, index: usize) -> Option<&Dao> {
        self.state.daos.get(index)
    }

    pub fn dao_count(&self) -> usize {
        self.state.daos.len()
    }

    /// The digest owners sign to approve `action` for `dao` on this chain
    pub fn action_digest(&self, dao: &Address, action: &Action) -> Result<ActionDigest, DaoError> {
        signature::action_digest(dao, action, self.config().chain_id)
    }

    /// Execute an action approved by a weighted quorum of owners.
    ///
    /// The digest is recorded before the external call is made, so a target
    /// that re-enters with the same approvals is rejected as `AlreadyExecuted`.
    /// If anything fails, including the target call, nothing is recorded.
    ///
    /// # Parameters
    /// * `sender` - Whoever submits the approvals; it needs no weight itself,
    ///   but outside the chain it must be a member rather than a contract
    /// * `dao` - The DAO acting
    /// * `action` - Target, payload, value, nonce and timestamp
    /// * `approvals` - Detached signatures over the action digest
    ///
    /// # Returns
    /// Whatever the target call returned
    pub fn execute(
        &mut self,
        sender: Address,
        dao: Address,
        action: Action,
        approvals: Vec<Approval>,
    ) -> Result<Vec<u8>, DaoError> {
        self.check_entry_caller(&sender)?;
        self.atomically(|chain| chain.execute_action(sender, dao, action, approvals))
    }

    fn execute_action(
        &mut self,
        sender: Address,
        dao: Address,
        action: Action,
        approvals: Vec<Approval>,
    ) -> Result<Vec<u8>, DaoError> {
        let digest = self.action_digest(&dao, &action)?;
        self.check_action_age(&action)?;

        let org = self.state.dao(&dao)?;
        if org.is_executed(&digest) {
            warn!("Replay of action {} on DAO {}", hex::encode(digest), dao);
            return Err(DaoError::AlreadyExecuted);
        }

        let authorizer = SignatureAuthorizer::new(self.config().signer_policy);
        let signers = authorizer.authorize(&digest, &approvals, &org.ledger)?;
        let weight = total_weight(&signers)?;
        let total_supply = org.ledger.total_supply();
        let quorum = org.quorum;
        if !quorum_reached(weight, total_supply, quorum)? {
            return Err(DaoError::QuorumNotReached {
                weight,
                total_supply,
                quorum,
            });
        }

        let record = ExecutedAction {
            digest,
            action,
            approvals,
            executed_at: self.now(),
        };

        // Recorded before the call: a re-entrant replay must see it
        let org = self.state.dao_mut(&dao)?;
        org.executed_digests.insert(digest);
        org.executed_actions.push(record.clone());
        info!(
            "DAO {} executing action {} submitted by {}: {} signers, weight {} of {}",
            dao,
            hex::encode(digest),
            sender,
            signers.len(),
            weight,
            total_supply
        );

        let action = &record.action;
        let output = self.invoke(dao, action.target, &action.payload, action.value)?;
        self.state.events.push(ChainEvent::Executed { dao, record });
        Ok(output)
    }

    fn check_action_age(&self, action: &Action) -> Result<(), DaoError> {
        let Some(max_age) = self.config().max_action_age_secs else {
            return Ok(());
        };

        let now = self.now().timestamp();
        let signed_at = i64::try_from(action.timestamp).unwrap_or(i64::MAX);
        let max_age = i64::try_from(max_age).unwrap_or(i64::MAX);
        if now.saturating_sub(signed_at) > max_age {
            return Err(DaoError::ActionExpired {
                timestamp: action.timestamp,
                now,
            });
        }
        Ok(())
    }

    /// Call through the DAO as an allow-listed delegate, without signatures
    pub fn execute_permitted(
        &mut self,
        sender: Address,
        dao: Address,
        target: Address,
        payload: Vec<u8>,
        value: Amount,
    ) -> Result<Vec<u8>, DaoError> {
        self.check_entry_caller(&sender)?;
        self.atomically(|chain| chain.permitted_call(sender, dao, target, payload, value))
    }

    pub(crate) fn permitted_call(
        &mut self,
        sender: Address,
        dao: Address,
        target: Address,
        payload: Vec<u8>,
        value: Amount,
    ) -> Result<Vec<u8>, DaoError> {
        let executed_at = self.now();
        let org = self.state.dao_mut(&dao)?;
        if !org.is_permitted(&sender) {
            return Err(DaoError::NotPermitted(sender));
        }

        let call = PermittedCall {
            sender,
            target,
            payload,
            value,
            executed_at,
        };
        org.executed_permitted.push(call.clone());
        debug!("DAO {} permitted call from {} to {} with value {}", dao, sender, target, value);

        let output = self.invoke(dao, target, &call.payload, value)?;
        self.state.events.push(ChainEvent::ExecutedPermitted { dao, call });
        Ok(output)
    }

    pub(crate) fn handle_dao_call(&mut self, context: CallContext, call: DaoCall) -> Result<Vec<u8>, DaoError> {
        let dao = context.address;
        match call {
            DaoCall::SetGovToken { gov_token } => self.set_gov_token(context.caller, dao, gov_token)?,
            admin => {
                if context.caller != dao {
                    return Err(DaoError::NotPermitted(context.caller));
                }
                self.apply_admin_call(dao, admin)?;
            }
        }
        Ok(Vec::new())
    }

    fn apply_admin_call(&mut self, dao: Address, call: DaoCall) -> Result<(), DaoError> {
        debug!("DAO {} applying {:?}", dao, call);

        if let DaoCall::RemoveAdapter { adapter } = &call {
            let claim = self.gov_token_claim(&dao, adapter)?;
            if claim > 0 {
                return Err(DaoError::AdapterHasClaim(*adapter));
            }
        }

        let org = self.state.dao_mut(&dao)?;
        match call {
            DaoCall::Mint { to, amount } => {
                if !org.minting.is_enabled() {
                    return Err(DaoError::MintingDisabled);
                }
                org.ledger.mint(&to, amount)
            }
            DaoCall::Burn { from, amount } => {
                if !org.burning.is_enabled() {
                    return Err(DaoError::BurningDisabled);
                }
                org.ledger.burn(&from, amount)
            }
            DaoCall::Move { from, to, amount } => org.ledger.move_units(&from, &to, amount),
            DaoCall::ChangeQuorum { quorum } => {
                org.quorum = validate_quorum(quorum)?;
                Ok(())
            }
            DaoCall::ChangeMintable { enabled } => org.minting.set(enabled),
            DaoCall::ChangeBurnable { enabled } => org.burning.set(enabled),
            DaoCall::FreezeMintingStatus => org.minting.freeze(),
            DaoCall::FreezeBurningStatus => org.burning.freeze(),
            DaoCall::AddAdapter { adapter } => {
                if !org.adapters.insert(adapter) {
                    return Err(DaoError::AlreadyPresent(format!("adapter {}", adapter)));
                }
                org.permitted.insert(adapter);
                Ok(())
            }
            DaoCall::RemoveAdapter { adapter } => {
                if !org.adapters.remove(&adapter) {
                    return Err(DaoError::NotFound(format!("adapter {}", adapter)));
                }
                org.permitted.remove(&adapter);
                Ok(())
            }
            DaoCall::AddPermitted { member } => {
                if !org.permitted.insert(member) {
                    return Err(DaoError::AlreadyPresent(format!("permitted {}", member)));
                }
                Ok(())
            }
            DaoCall::RemovePermitted { member } => {
                if !org.permitted.remove(&member) {
                    return Err(DaoError::NotFound(format!("permitted {}", member)));
                }
                Ok(())
            }
            DaoCall::SetGovToken { .. } => Err(DaoError::NotPermitted(dao)),
        }
    }

    fn set_gov_token(&mut self, caller: Address, dao: Address, gov_token: Address) -> Result<(), DaoError> {
        let org = self.state.dao_mut(&dao)?;
        if caller != org.offer_book {
            return Err(DaoError::NotPermitted(caller));
        }
        if org.gov_token.is_some() {
            return Err(DaoError::GovTokenAlreadyExists(dao));
        }

        org.gov_token = Some(gov_token);
        org.permitted.insert(gov_token);
        Ok(())
    }

    /// GovToken units `holder` owns against the DAO treasury
    fn gov_token_claim(&self, dao: &Address, holder: &Address) -> Result<Amount, DaoError> {
        match self.state.dao(dao)?.gov_token {
            Some(gov_token) => Ok(self.state.gov_token(&gov_token)?.ledger().balance_of(holder)),
            None => Ok(0),
        }
    }
}
