use crate::action::{decode_call, encode_call, ChainEvent};
use crate::assets::{Asset, TokenCall};
use crate::error::DaoError;
use crate::id::Address;
use crate::ledger::{Amount, OwnershipLedger, SupplyGate};
use crate::runtime::{CallContext, Chain};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub(crate) const GOV_TOKEN_SEED: &[u8] = b"gov_token";

/// Calls understood by a GovToken address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovTokenCall {
    /// Offer book only
    Mint { to: Address, amount: Amount },
    /// Burn the caller's units and pay out its share of native currency plus `tokens`
    Burn { amount: Amount, tokens: Vec<Address> },
    Transfer { to: Address, amount: Amount },
    ChangeMintable { enabled: bool },
    ChangeBurnable { enabled: bool },
    FreezeMintingStatus,
    FreezeBurningStatus,
}

/// A redeemable claim on one DAO's treasury
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovToken {
    pub(crate) address: Address,
    pub(crate) name: String,
    pub(crate) symbol: String,
    pub(crate) dao: Address,
    pub(crate) offer_book: Address,
    pub(crate) ledger: OwnershipLedger,
    pub(crate) minting: SupplyGate,
    pub(crate) burning: SupplyGate,
}

impl GovToken {
    pub(crate) fn new(address: Address, name: String, symbol: String, dao: Address, offer_book: Address) -> Self {
        Self {
            address,
            name,
            symbol,
            dao,
            offer_book,
            ledger: OwnershipLedger::new(),
            minting: SupplyGate::default(),
            burning: SupplyGate::default(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The DAO whose treasury backs this token
    pub fn dao(&self) -> Address {
        self.dao
    }

    pub fn offer_book(&self) -> Address {
        self.offer_book
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

    pub fn minting(&self) -> SupplyGate {
        self.minting
    }

    pub fn burning(&self) -> SupplyGate {
        self.burning
    }
}

/// `floor(treasury_balance * amount / total_supply)`; nothing when the supply is empty
pub fn proportional_share(
    treasury_balance: Amount,
    amount: Amount,
    total_supply: Amount,
) -> Result<Amount, DaoError> {
    if total_supply == 0 {
        return Ok(0);
    }
    let scaled = treasury_balance.checked_mul(amount).ok_or(DaoError::Overflow)?;
    Ok(scaled / total_supply)
}

impl Chain {
    pub fn gov_token(&self, address: &Address) -> Result<&GovToken, DaoError> {
        self.state.gov_token(address)
    }

    /// Burn `amount` of the holder's GovToken units and receive the matching
    /// share of the DAO's native currency and of each listed asset token
    ///
    /// # Returns
    /// The share computed for every asset, native first, zero shares included
    pub fn burn_gov_token(
        &mut self,
        holder: Address,
        gov_token: Address,
        amount: Amount,
        tokens: &[Address],
    ) -> Result<Vec<(Asset, Amount)>, DaoError> {
        let payload = encode_call(&GovTokenCall::Burn {
            amount,
            tokens: tokens.to_vec(),
        })?;
        let output = self.call(holder, gov_token, &payload, 0)?;
        decode_call(&output)
    }

    pub fn transfer_gov_token(
        &mut self,
        holder: Address,
        gov_token: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), DaoError> {
        let payload = encode_call(&GovTokenCall::Transfer { to, amount })?;
        self.call(holder, gov_token, &payload, 0)?;
        Ok(())
    }

    pub(crate) fn handle_gov_token_call(
        &mut self,
        context: CallContext,
        call: GovTokenCall,
    ) -> Result<Vec<u8>, DaoError> {
        let address = context.address;
        let caller = context.caller;

        if let GovTokenCall::Burn { amount, tokens } = call {
            let payouts = self.redeem(caller, address, amount, tokens)?;
            return encode_call(&payouts);
        }

        let token = self.state.gov_token_mut(&address)?;
        match call {
            GovTokenCall::Mint { to, amount } => {
                if caller != token.offer_book {
                    return Err(DaoError::NotPermitted(caller));
                }
                if !token.minting.is_enabled() {
                    return Err(DaoError::MintingDisabled);
                }
                token.ledger.mint(&to, amount)?;
                debug!("GovToken {} minted {} to {}", address, amount, to);
            }
            GovTokenCall::Transfer { to, amount } => token.ledger.move_units(&caller, &to, amount)?,
            admin => {
                if caller != token.dao {
                    return Err(DaoError::NotPermitted(caller));
                }
                match admin {
                    GovTokenCall::ChangeMintable { enabled } => token.minting.set(enabled)?,
                    GovTokenCall::ChangeBurnable { enabled } => token.burning.set(enabled)?,
                    GovTokenCall::FreezeMintingStatus => token.minting.freeze()?,
                    GovTokenCall::FreezeBurningStatus => token.burning.freeze()?,
                    other => return Err(DaoError::InvalidPayload(format!("{:?}", other))),
                }
            }
        }
        Ok(Vec::new())
    }

    /// Burn first, then pay. Shares are taken against the supply before the burn.
    ///
    /// Payouts may run holder code, so the GovToken refuses another burn until
    /// this one has paid every share.
    fn redeem(
        &mut self,
        holder: Address,
        gov_token: Address,
        amount: Amount,
        tokens: Vec<Address>,
    ) -> Result<Vec<(Asset, Amount)>, DaoError> {
        if !self.redeeming.insert(gov_token) {
            warn!("{} re-entered redemption of GovToken {}", holder, gov_token);
            return Err(DaoError::Reentrant(gov_token));
        }
        let result = self.settle_redemption(holder, gov_token, amount, tokens);
        self.redeeming.remove(&gov_token);
        result
    }

    fn settle_redemption(
        &mut self,
        holder: Address,
        gov_token: Address,
        amount: Amount,
        tokens: Vec<Address>,
    ) -> Result<Vec<(Asset, Amount)>, DaoError> {
        if amount == 0 {
            return Err(DaoError::ZeroAmount);
        }

        let token = self.state.gov_token(&gov_token)?;
        if !token.burning.is_enabled() {
            return Err(DaoError::BurningDisabled);
        }
        let dao = token.dao;
        let total_supply = token.ledger.total_supply();

        let mut seen = BTreeSet::new();
        let mut assets = vec![Asset::Native];
        for token in tokens {
            if !seen.insert(token) {
                return Err(DaoError::DuplicateAsset(token));
            }
            assets.push(Asset::Token(token));
        }

        let mut payouts = Vec::with_capacity(assets.len());
        for asset in assets {
            let treasury_balance = self.state.bank.balance_of(&asset, &dao)?;
            payouts.push((asset, proportional_share(treasury_balance, amount, total_supply)?));
        }

        self.state.gov_token_mut(&gov_token)?.ledger.burn(&holder, amount)?;

        for (asset, share) in &payouts {
            if *share > 0 {
                self.pay_out(gov_token, dao, holder, *asset, *share)?;
            }
        }

        info!("{} redeemed {} units of GovToken {}", holder, amount, gov_token);
        self.state.events.push(ChainEvent::Redeemed {
            gov_token,
            holder,
            amount,
            payouts: payouts.clone(),
        });
        Ok(payouts)
    }

    /// Move one share out of the treasury through the DAO's permitted path
    fn pay_out(
        &mut self,
        gov_token: Address,
        dao: Address,
        holder: Address,
        asset: Asset,
        share: Amount,
    ) -> Result<(), DaoError> {
        let (target, payload, value) = match asset {
            Asset::Native => (holder, Vec::new(), share),
            Asset::Token(token) => (token, encode_call(&TokenCall::Transfer { to: holder, amount: share })?, 0),
        };

        // Only the treasury's own shortfall is reported as such
        let available = self.state.bank.balance_of(&asset, &dao)?;
        if available < share {
            return Err(DaoError::InsufficientTreasury {
                asset,
                requested: share,
                available,
            });
        }

        self.permitted_call(gov_token, dao, target, payload, value)?;
        Ok(())
    }
}
