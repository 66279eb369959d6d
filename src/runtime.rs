use crate::action::{decode_call, encode_call, Action, ChainEvent};
use crate::assets::{Asset, Bank, TokenCall};
use crate::config::ChainConfig;
use crate::dao::{Dao, DaoCheckpoint};
use crate::error::DaoError;
use crate::gov_token::GovToken;
use crate::id::Address;
use crate::ledger::Amount;
use crate::offer_book::{OfferBook, OFFER_BOOK_SEED};
use crate::signature::Approval;
use crate::storage_traits::ChainStore;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

const CONTRACT_SEED: &[u8] = b"contract";
const TOKEN_SEED: &[u8] = b"token";

/// Who is calling which address, and with how much native value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub address: Address,
    pub value: Amount,
}

/// Code behind an external call target.
///
/// Contracts keep no state of their own; everything they need to remember goes
/// through `Host::write`, so it is rolled back together with a failed frame.
pub trait Contract: Send + Sync {
    fn call(&self, host: &mut Host<'_>, payload: &[u8]) -> Result<Vec<u8>, DaoError>;
}

/// Everything a chain persists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainState {
    pub(crate) daos: Vec<Dao>,
    pub(crate) dao_index: BTreeMap<Address, usize>,
    pub(crate) gov_tokens: Vec<GovToken>,
    pub(crate) gov_token_index: BTreeMap<Address, usize>,
    pub(crate) offer_book: OfferBook,
    pub(crate) bank: Bank,
    pub(crate) contract_storage: BTreeMap<Address, BTreeMap<Vec<u8>, Vec<u8>>>,
    pub(crate) events: Vec<ChainEvent>,
    pub(crate) now: DateTime<Utc>,
}

impl ChainState {
    fn new(offer_book: OfferBook, now: DateTime<Utc>) -> Self {
        Self {
            daos: Vec::new(),
            dao_index: BTreeMap::new(),
            gov_tokens: Vec::new(),
            gov_token_index: BTreeMap::new(),
            offer_book,
            bank: Bank::new(),
            contract_storage: BTreeMap::new(),
            events: Vec::new(),
            now,
        }
    }

    pub(crate) fn dao(&self, address: &Address) -> Result<&Dao, DaoError> {
        self.dao_index
            .get(address)
            .and_then(|index| self.daos.get(*index))
            .ok_or_else(|| DaoError::NotFound(format!("DAO {}", address)))
    }

    pub(crate) fn dao_mut(&mut self, address: &Address) -> Result<&mut Dao, DaoError> {
        let index = *self
            .dao_index
            .get(address)
            .ok_or_else(|| DaoError::NotFound(format!("DAO {}", address)))?;
        self.daos
            .get_mut(index)
            .ok_or_else(|| DaoError::NotFound(format!("DAO {}", address)))
    }

    pub(crate) fn gov_token(&self, address: &Address) -> Result<&GovToken, DaoError> {
        self.gov_token_index
            .get(address)
            .and_then(|index| self.gov_tokens.get(*index))
            .ok_or_else(|| DaoError::NotFound(format!("GovToken {}", address)))
    }

    pub(crate) fn gov_token_mut(&mut self, address: &Address) -> Result<&mut GovToken, DaoError> {
        let index = *self
            .gov_token_index
            .get(address)
            .ok_or_else(|| DaoError::NotFound(format!("GovToken {}", address)))?;
        self.gov_tokens
            .get_mut(index)
            .ok_or_else(|| DaoError::NotFound(format!("GovToken {}", address)))
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            daos: self.daos.iter().map(Dao::checkpoint).collect(),
            gov_tokens: self.gov_tokens.clone(),
            gov_token_index: self.gov_token_index.clone(),
            offer_book: self.offer_book.clone(),
            bank: self.bank.clone(),
            contract_storage: self.contract_storage.clone(),
            events: self.events.len(),
            now: self.now,
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        // DAOs created inside the frame go away with their index entries
        let kept = checkpoint.daos.len().min(self.daos.len());
        for dao in self.daos.drain(kept..) {
            self.dao_index.remove(&dao.address);
        }
        for (dao, saved) in self.daos.iter_mut().zip(checkpoint.daos) {
            dao.restore(saved);
        }

        self.gov_tokens = checkpoint.gov_tokens;
        self.gov_token_index = checkpoint.gov_token_index;
        self.offer_book = checkpoint.offer_book;
        self.bank = checkpoint.bank;
        self.contract_storage = checkpoint.contract_storage;
        self.events.truncate(checkpoint.events);
        self.now = checkpoint.now;
    }
}

/// State of the chain when a call frame opened.
///
/// Append-only histories (events, executed actions, permitted calls) are kept
/// as lengths and truncated on rollback, so a frame never copies them.
struct Checkpoint {
    daos: Vec<DaoCheckpoint>,
    gov_tokens: Vec<GovToken>,
    gov_token_index: BTreeMap<Address, usize>,
    offer_book: OfferBook,
    bank: Bank,
    contract_storage: BTreeMap<Address, BTreeMap<Vec<u8>, Vec<u8>>>,
    events: usize,
    now: DateTime<Utc>,
}

/// Serializable image of a chain; external contract code is not included
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub config: ChainConfig,
    pub state: ChainState,
}

/// Deterministic single-threaded host for DAOs, GovTokens, the offer book,
/// asset tokens and external contracts.
///
/// Every call frame runs against a checkpoint of the state and is rolled back
/// as a whole when it fails, so a failed operation leaves no trace.
pub struct Chain {
    config: ChainConfig,
    pub(crate) state: ChainState,
    contracts: HashMap<Address, Arc<dyn Contract>>,
    call_depth: usize,
    /// GovTokens with a redemption paying out right now
    pub(crate) redeeming: BTreeSet<Address>,
}

impl Chain {
    pub fn new(config: ChainConfig) -> Result<Self, DaoError> {
        config.validate()?;
        let offer_book = OfferBook::new(Address::find(&[OFFER_BOOK_SEED])?);

        Ok(Self {
            config,
            state: ChainState::new(offer_book, Utc::now()),
            contracts: HashMap::new(),
            call_depth: 0,
            redeeming: BTreeSet::new(),
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.state.now
    }

    pub fn set_time(&mut self, now: DateTime<Utc>) {
        self.state.now = now;
    }

    pub fn advance_time(&mut self, duration: Duration) {
        self.state.now += duration;
    }

    /// Events appended by successful operations, oldest first
    pub fn events(&self) -> &[ChainEvent] {
        &self.state.events
    }

    pub fn balance_of(&self, asset: &Asset, holder: &Address) -> Result<Amount, DaoError> {
        self.state.bank.balance_of(asset, holder)
    }

    /// Read a value from a contract's private storage
    pub fn contract_storage(&self, contract: &Address, key: &[u8]) -> Option<&[u8]> {
        self.state
            .contract_storage
            .get(contract)
            .and_then(|storage| storage.get(key))
            .map(Vec::as_slice)
    }

    /// The address a contract deployed under `name` receives
    pub fn contract_address(name: &str) -> Result<Address, DaoError> {
        Address::find(&[CONTRACT_SEED, name.as_bytes()])
    }

    pub fn deploy_contract(&mut self, name: &str, contract: Arc<dyn Contract>) -> Result<Address, DaoError> {
        let address = Self::contract_address(name)?;
        if self.contracts.contains_key(&address) {
            return Err(DaoError::AlreadyPresent(format!("contract {}", name)));
        }

        self.contracts.insert(address, contract);
        debug!("Deployed contract {} at {}", name, address);
        Ok(address)
    }

    /// Issue native currency to an address (genesis allocation)
    pub fn fund_native(&mut self, to: &Address, amount: Amount) -> Result<(), DaoError> {
        self.atomically(|chain| chain.state.bank.issue_native(to, amount))
    }

    /// Deploy an ERC20-like asset token with its whole supply held by `holder`
    pub fn create_token(
        &mut self,
        name: &str,
        symbol: &str,
        holder: &Address,
        supply: Amount,
    ) -> Result<Address, DaoError> {
        let address = Address::find(&[TOKEN_SEED, name.as_bytes(), symbol.as_bytes()])?;
        self.atomically(|chain| {
            chain
                .state
                .bank
                .register_token(address, name.to_string(), symbol.to_string(), holder, supply)
        })?;

        info!("Created asset token {} ({}) at {}", name, symbol, address);
        Ok(address)
    }

    /// Move an asset from `caller` to `to`
    pub fn transfer(&mut self, caller: Address, asset: &Asset, to: Address, amount: Amount) -> Result<(), DaoError> {
        match asset {
            Asset::Native => self.call(caller, to, &[], amount)?,
            Asset::Token(token) => {
                let payload = encode_call(&TokenCall::Transfer { to, amount })?;
                self.call(caller, *token, &payload, 0)?
            }
        };
        Ok(())
    }

    /// Make a call from `caller` to `target`, sending `value` native units.
    ///
    /// The frame is atomic: on error every state change made inside it,
    /// including nested calls, is discarded. Outside the chain only members
    /// may call; contract addresses act through their own code.
    pub fn call(
        &mut self,
        caller: Address,
        target: Address,
        payload: &[u8],
        value: Amount,
    ) -> Result<Vec<u8>, DaoError> {
        self.check_entry_caller(&caller)?;
        self.invoke(caller, target, payload, value)
    }

    /// Contract addresses have no key, so a top-level frame can never be theirs
    pub(crate) fn check_entry_caller(&self, caller: &Address) -> Result<(), DaoError> {
        if self.call_depth == 0 && caller.is_contract() {
            warn!("Rejected top-level call on behalf of contract {}", caller);
            return Err(DaoError::NotPermitted(*caller));
        }
        Ok(())
    }

    /// Open a call frame without checking who the caller is
    pub(crate) fn invoke(
        &mut self,
        caller: Address,
        target: Address,
        payload: &[u8],
        value: Amount,
    ) -> Result<Vec<u8>, DaoError> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(DaoError::CallDepthExceeded(self.config.max_call_depth));
        }

        let context = CallContext {
            caller,
            address: target,
            value,
        };

        self.call_depth += 1;
        let result = self.atomically(|chain| chain.dispatch(context, payload));
        self.call_depth -= 1;
        result
    }

    /// Run `op` against a checkpoint of the state, restoring it on failure
    pub(crate) fn atomically<T, F>(&mut self, op: F) -> Result<T, DaoError>
    where
        F: FnOnce(&mut Chain) -> Result<T, DaoError>,
    {
        let checkpoint = self.state.checkpoint();
        let result = op(self);
        if let Err(err) = &result {
            debug!("Rolling back frame: {}", err);
            self.state.restore(checkpoint);
        }
        result
    }

    fn dispatch(&mut self, context: CallContext, payload: &[u8]) -> Result<Vec<u8>, DaoError> {
        if context.value > 0 {
            self.state
                .bank
                .transfer(&Asset::Native, &context.caller, &context.address, context.value)?;
        }

        let target = context.address;
        let builtin = self.state.dao_index.contains_key(&target)
            || self.state.gov_token_index.contains_key(&target)
            || target == self.state.offer_book.address()
            || self.state.bank.is_token(&target);

        // An empty payload to a built-in target is a plain deposit
        if builtin && payload.is_empty() {
            return Ok(Vec::new());
        }

        if self.state.dao_index.contains_key(&target) {
            return self.handle_dao_call(context, decode_call(payload)?);
        }
        if self.state.gov_token_index.contains_key(&target) {
            return self.handle_gov_token_call(context, decode_call(payload)?);
        }
        if target == self.state.offer_book.address() {
            return self.handle_offer_book_call(context, decode_call(payload)?);
        }
        if self.state.bank.is_token(&target) {
            return self.handle_token_call(context, decode_call(payload)?);
        }
        if let Some(contract) = self.contracts.get(&target).cloned() {
            let mut host = Host {
                chain: self,
                context,
            };
            return contract.call(&mut host, payload);
        }

        // Plain accounts only receive value
        Ok(Vec::new())
    }

    fn handle_token_call(&mut self, context: CallContext, call: TokenCall) -> Result<Vec<u8>, DaoError> {
        match call {
            TokenCall::Transfer { to, amount } => {
                self.state
                    .bank
                    .transfer(&Asset::Token(context.address), &context.caller, &to, amount)?;
            }
        }
        Ok(Vec::new())
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            config: self.config.clone(),
            state: self.state.clone(),
        }
    }

    /// Rebuild a chain from a snapshot. External contracts must be deployed again.
    pub fn from_snapshot(snapshot: ChainSnapshot) -> Result<Self, DaoError> {
        snapshot.config.validate()?;
        Ok(Self {
            config: snapshot.config,
            state: snapshot.state,
            contracts: HashMap::new(),
            call_depth: 0,
            redeeming: BTreeSet::new(),
        })
    }

    pub fn save<S: ChainStore + ?Sized>(&self, store: &S) -> Result<(), DaoError> {
        store.save(&self.snapshot())?;
        info!("Saved chain snapshot with {} DAOs", self.state.daos.len());
        Ok(())
    }

    pub fn load<S: ChainStore + ?Sized>(store: &S) -> Result<Option<Self>, DaoError> {
        store.load()?.map(Self::from_snapshot).transpose()
    }
}

/// Handle through which an external contract reaches the chain while it runs
pub struct Host<'a> {
    chain: &'a mut Chain,
    context: CallContext,
}

impl<'a> Host<'a> {
    /// The address of the running contract
    pub fn address(&self) -> Address {
        self.context.address
    }

    pub fn caller(&self) -> Address {
        self.context.caller
    }

    pub fn value(&self) -> Amount {
        self.context.value
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.chain.now()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain.config.chain_id
    }

    pub fn read(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.chain
            .contract_storage(&self.context.address, key)
            .map(<[u8]>::to_vec)
    }

    pub fn write(&mut self, key: &[u8], value: Vec<u8>) {
        self.chain
            .state
            .contract_storage
            .entry(self.context.address)
            .or_default()
            .insert(key.to_vec(), value);
    }

    pub fn balance_of(&self, asset: &Asset, holder: &Address) -> Result<Amount, DaoError> {
        self.chain.balance_of(asset, holder)
    }

    /// Call another address from this contract
    pub fn call(&mut self, target: Address, payload: &[u8], value: Amount) -> Result<Vec<u8>, DaoError> {
        self.chain.call(self.context.address, target, payload, value)
    }

    /// Submit a quorum-approved action to a DAO from this contract
    pub fn execute(&mut self, dao: Address, action: Action, approvals: Vec<Approval>) -> Result<Vec<u8>, DaoError> {
        self.chain.execute(self.context.address, dao, action, approvals)
    }

    /// Use the permitted fast path of a DAO from this contract
    pub fn execute_permitted(
        &mut self,
        dao: Address,
        target: Address,
        payload: Vec<u8>,
        value: Amount,
    ) -> Result<Vec<u8>, DaoError> {
        self.chain
            .execute_permitted(self.context.address, dao, target, payload, value)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::dao::DaoCall;
    use crate::gov_token::GovTokenCall;
    use crate::offer_book::OfferBookCall;
    use ed25519_dalek::SigningKey;

    pub fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    pub fn addr(key: &SigningKey) -> Address {
        Address::from(&key.verifying_key())
    }

    pub fn new_chain() -> Chain {
        Chain::new(ChainConfig::default()).unwrap()
    }

    /// Create a DAO owned by the given keys
    pub fn dao_with(chain: &mut Chain, partners: &[&SigningKey], shares: &[Amount], quorum: u8) -> Address {
        let partners: Vec<Address> = partners.iter().map(|key| addr(key)).collect();
        chain
            .create_dao("TestDAO", "TDAO", quorum, &partners, shares)
            .unwrap()
    }

    pub fn approve(chain: &Chain, dao: &Address, action: &Action, signers: &[&SigningKey]) -> Vec<Approval> {
        let digest = chain.action_digest(dao, action).unwrap();
        signers
            .iter()
            .map(|key| Approval::sign(key, &digest))
            .collect()
    }

    /// Sign `action` with `signers` and submit it
    pub fn run(
        chain: &mut Chain,
        dao: Address,
        action: Action,
        signers: &[&SigningKey],
    ) -> Result<Vec<u8>, DaoError> {
        let approvals = approve(chain, &dao, &action, signers);
        let sender = signers.first().map(|key| addr(key)).unwrap_or_default();
        chain.execute(sender, dao, action, approvals)
    }

    pub fn dao_action(dao: Address, call: DaoCall) -> Action {
        Action::call(dao, &call).unwrap()
    }

    pub fn offer_action(call: OfferBookCall) -> Action {
        Action::call(Address::find(&[OFFER_BOOK_SEED]).unwrap(), &call).unwrap()
    }

    pub fn gov_token_action(gov_token: Address, call: GovTokenCall) -> Action {
        Action::call(gov_token, &call).unwrap()
    }

    /// Create the DAO's GovToken through an approved action
    pub fn create_gov_token(chain: &mut Chain, dao: Address, signers: &[&SigningKey]) -> Address {
        let action = offer_action(OfferBookCall::CreateGovToken {
            name: "GovToken".to_string(),
            symbol: "GT".to_string(),
        });
        run(chain, dao, action, signers).unwrap();
        chain.dao(&dao).unwrap().gov_token().unwrap()
    }

    /// Remembers the last payload, value and caller it received
    pub struct Recorder;

    impl Contract for Recorder {
        fn call(&self, host: &mut Host<'_>, payload: &[u8]) -> Result<Vec<u8>, DaoError> {
            host.write(b"payload", payload.to_vec());
            host.write(b"value", host.value().to_le_bytes().to_vec());
            host.write(b"caller", host.caller().to_vec());
            Ok(Vec::new())
        }
    }

    /// Writes to its storage, then fails
    pub struct Reverter;

    impl Contract for Reverter {
        fn call(&self, host: &mut Host<'_>, _payload: &[u8]) -> Result<Vec<u8>, DaoError> {
            host.write(b"dirty", vec![1]);
            Err(DaoError::Reverted("always reverts".to_string()))
        }
    }

    /// Calls the target given at deployment and keeps going when it fails
    struct Catcher {
        target: Address,
    }

    impl Contract for Catcher {
        fn call(&self, host: &mut Host<'_>, _payload: &[u8]) -> Result<Vec<u8>, DaoError> {
            let outcome = match host.call(self.target, &[], 0) {
                Ok(_) => b"ok".to_vec(),
                Err(_) => b"caught".to_vec(),
            };
            host.write(b"outcome", outcome);
            Ok(Vec::new())
        }
    }

    /// Calls itself until the chain refuses
    struct Recursive;

    impl Contract for Recursive {
        fn call(&self, host: &mut Host<'_>, payload: &[u8]) -> Result<Vec<u8>, DaoError> {
            host.write(b"entered", vec![1]);
            let me = host.address();
            host.call(me, payload, 0)
        }
    }

    #[test]
    fn test_native_transfer_to_plain_account() {
        let mut chain = new_chain();
        let alice = addr(&key(1));
        let bob = addr(&key(2));
        chain.fund_native(&alice, 100).unwrap();

        chain.transfer(alice, &Asset::Native, bob, 40).unwrap();

        assert_eq!(chain.balance_of(&Asset::Native, &alice).unwrap(), 60);
        assert_eq!(chain.balance_of(&Asset::Native, &bob).unwrap(), 40);
    }

    #[test]
    fn test_token_transfer_through_call() {
        let mut chain = new_chain();
        let alice = addr(&key(1));
        let bob = addr(&key(2));
        let gold = chain.create_token("Gold", "GLD", &alice, 30).unwrap();

        chain.transfer(alice, &Asset::Token(gold), bob, 12).unwrap();
        assert_eq!(chain.balance_of(&Asset::Token(gold), &bob).unwrap(), 12);

        let overdraw = chain.transfer(bob, &Asset::Token(gold), alice, 13);
        assert!(matches!(overdraw, Err(DaoError::InsufficientBalance { .. })));
        assert_eq!(chain.balance_of(&Asset::Token(gold), &bob).unwrap(), 12);
    }

    #[test]
    fn test_contract_receives_payload_and_value() {
        let mut chain = new_chain();
        let alice = addr(&key(1));
        chain.fund_native(&alice, 10).unwrap();
        let recorder = chain.deploy_contract("recorder", Arc::new(Recorder)).unwrap();

        chain.call(alice, recorder, b"hello", 3).unwrap();

        assert_eq!(chain.contract_storage(&recorder, b"payload"), Some(&b"hello"[..]));
        assert_eq!(
            chain.contract_storage(&recorder, b"value"),
            Some(&3u128.to_le_bytes()[..])
        );
        assert_eq!(chain.contract_storage(&recorder, b"caller"), Some(&alice[..]));
        assert_eq!(chain.balance_of(&Asset::Native, &recorder).unwrap(), 3);
    }

    #[test]
    fn test_failed_call_leaves_no_trace() {
        let mut chain = new_chain();
        let alice = addr(&key(1));
        chain.fund_native(&alice, 10).unwrap();
        let reverter = chain.deploy_contract("reverter", Arc::new(Reverter)).unwrap();

        let result = chain.call(alice, reverter, &[], 5);

        assert!(matches!(result, Err(DaoError::Reverted(_))));
        assert_eq!(chain.contract_storage(&reverter, b"dirty"), None);
        assert_eq!(chain.balance_of(&Asset::Native, &alice).unwrap(), 10);
    }

    #[test]
    fn test_caught_failure_rolls_back_only_inner_frame() {
        let mut chain = new_chain();
        let alice = addr(&key(1));
        let reverter = chain.deploy_contract("reverter", Arc::new(Reverter)).unwrap();
        let catcher = chain
            .deploy_contract("catcher", Arc::new(Catcher { target: reverter }))
            .unwrap();

        chain.call(alice, catcher, &[], 0).unwrap();

        assert_eq!(chain.contract_storage(&catcher, b"outcome"), Some(&b"caught"[..]));
        assert_eq!(chain.contract_storage(&reverter, b"dirty"), None);
    }

    #[test]
    fn test_call_depth_is_bounded() {
        let mut chain = new_chain();
        let alice = addr(&key(1));
        let recursive = chain.deploy_contract("recursive", Arc::new(Recursive)).unwrap();

        let result = chain.call(alice, recursive, &[], 0);

        assert!(matches!(result, Err(DaoError::CallDepthExceeded(64))));
        assert_eq!(chain.contract_storage(&recursive, b"entered"), None);
    }

    #[test]
    fn test_deploy_twice_rejected() {
        let mut chain = new_chain();
        chain.deploy_contract("recorder", Arc::new(Recorder)).unwrap();

        let again = chain.deploy_contract("recorder", Arc::new(Recorder));
        assert!(matches!(again, Err(DaoError::AlreadyPresent(_))));
    }

    #[test]
    fn test_undecodable_payload_to_builtin() {
        let mut chain = new_chain();
        let alice = addr(&key(1));
        let gold = chain.create_token("Gold", "GLD", &alice, 30).unwrap();

        let result = chain.call(alice, gold, &[0xff; 5], 0);
        assert!(matches!(result, Err(DaoError::InvalidPayload(_))));
    }

    #[test]
    fn test_clock_moves() {
        let mut chain = new_chain();
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        chain.set_time(start);

        chain.advance_time(Duration::seconds(90));
        assert_eq!(chain.now().timestamp(), 1_700_000_090);
    }
    #[test]
    fn test_contract_addresses_cannot_call_from_outside() {
        let mut chain = new_chain();
        let owner = key(1);
        let thief = addr(&key(9));
        let dao = dao_with(&mut chain, &[&owner], &[10], 51);
        chain.fund_native(&dao, 50).unwrap();
        let payload = encode_call(&DaoCall::ChangeQuorum { quorum: 1 }).unwrap();

        let result = chain.call(dao, dao, &payload, 0);
        assert!(matches!(result, Err(DaoError::NotPermitted(caller)) if caller == dao));

        let result = chain.call(dao, thief, &[], 50);
        assert!(matches!(result, Err(DaoError::NotPermitted(_))));

        let result = chain.transfer(dao, &Asset::Native, thief, 50);
        assert!(matches!(result, Err(DaoError::NotPermitted(_))));

        assert_eq!(chain.dao(&dao).unwrap().quorum(), 51);
        assert_eq!(chain.balance_of(&Asset::Native, &dao).unwrap(), 50);
        assert_eq!(chain.balance_of(&Asset::Native, &thief).unwrap(), 0);
    }

    #[test]
    fn test_rollback_truncates_histories() {
        let mut chain = new_chain();
        let owner = key(1);
        let dao = dao_with(&mut chain, &[&owner], &[10], 51);
        let events = chain.events().len();
        let change = dao_action(dao, DaoCall::ChangeQuorum { quorum: 60 });

        let result: Result<(), DaoError> = chain.atomically(|chain| {
            chain.create_dao("Doomed", "DMD", 51, &[addr(&owner)], &[5])?;
            run(chain, dao, change.clone(), &[&owner])?;
            Err(DaoError::Reverted("abort".to_string()))
        });
        assert!(matches!(result, Err(DaoError::Reverted(_))));

        assert_eq!(chain.dao_count(), 1);
        assert!(chain.dao_at(1).is_none());
        assert_eq!(chain.events().len(), events);
        let org = chain.dao(&dao).unwrap();
        assert_eq!(org.quorum(), 51);
        assert!(org.executed_actions().is_empty());

        // The digest was dropped with its record, so the same action runs again
        run(&mut chain, dao, change, &[&owner]).unwrap();
        assert_eq!(chain.dao(&dao).unwrap().quorum(), 60);
        let doomed = chain.create_dao("Again", "AGN", 51, &[addr(&owner)], &[5]).unwrap();
        assert_eq!(chain.dao_at(1).unwrap().address(), doomed);
    }

    #[test]
    fn test_token_names_do_not_collide() {
        let mut chain = new_chain();
        let alice = addr(&key(1));

        let gold = chain.create_token("Gold", "GLD", &alice, 30).unwrap();
        let other = chain.create_token("Go", "ldGLD", &alice, 5).unwrap();

        assert_ne!(gold, other);
        assert_eq!(chain.balance_of(&Asset::Token(gold), &alice).unwrap(), 30);
        assert_eq!(chain.balance_of(&Asset::Token(other), &alice).unwrap(), 5);
    }
}
