//! Treasury assets: the native currency and ERC20-like asset tokens.
//!
//! Both kinds expose the same minimal capability set, a balance lookup and a
//! transfer, which is all the redemption and offer paths need.

use crate::error::DaoError;
use crate::id::Address;
use crate::ledger::{Amount, OwnershipLedger};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An asset a treasury can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// The chain's native currency, moved as call value
    Native,
    /// An asset token living at the given address
    Token(Address),
}

impl Default for Asset {
    fn default() -> Self {
        Asset::Native
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Token(address) => write!(f, "token {}", address),
        }
    }
}

/// Calls understood by asset token contracts. The caller is the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenCall {
    Transfer { to: Address, amount: Amount },
}

/// An ERC20-like asset token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetToken {
    pub name: String,
    pub symbol: String,
    pub ledger: OwnershipLedger,
}

/// Balances of every asset on the chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    native: OwnershipLedger,
    tokens: BTreeMap<Address, AssetToken>,
}

impl Bank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_token(&self, address: &Address) -> bool {
        self.tokens.contains_key(address)
    }

    pub fn token(&self, address: &Address) -> Option<&AssetToken> {
        self.tokens.get(address)
    }

    pub fn balance_of(&self, asset: &Asset, holder: &Address) -> Result<Amount, DaoError> {
        match asset {
            Asset::Native => Ok(self.native.balance_of(holder)),
            Asset::Token(address) => Ok(self.token_ledger(address)?.balance_of(holder)),
        }
    }

    /// Total amount of an asset in circulation
    pub fn supply_of(&self, asset: &Asset) -> Result<Amount, DaoError> {
        match asset {
            Asset::Native => Ok(self.native.total_supply()),
            Asset::Token(address) => Ok(self.token_ledger(address)?.total_supply()),
        }
    }

    pub fn transfer(
        &mut self,
        asset: &Asset,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), DaoError> {
        let ledger = match asset {
            Asset::Native => &mut self.native,
            Asset::Token(address) => self.token_ledger_mut(address)?,
        };
        ledger.move_units(from, to, amount)
    }

    /// Create native currency out of thin air (genesis allocation)
    pub fn issue_native(&mut self, to: &Address, amount: Amount) -> Result<(), DaoError> {
        self.native.mint(to, amount)
    }

    pub fn register_token(
        &mut self,
        address: Address,
        name: String,
        symbol: String,
        holder: &Address,
        supply: Amount,
    ) -> Result<(), DaoError> {
        if self.tokens.contains_key(&address) {
            return Err(DaoError::AlreadyPresent(format!("asset token {}", address)));
        }

        let mut ledger = OwnershipLedger::new();
        ledger.mint(holder, supply)?;
        self.tokens.insert(
            address,
            AssetToken {
                name,
                symbol,
                ledger,
            },
        );
        Ok(())
    }

    fn token_ledger(&self, address: &Address) -> Result<&OwnershipLedger, DaoError> {
        self.tokens
            .get(address)
            .map(|token| &token.ledger)
            .ok_or_else(|| DaoError::NotFound(format!("asset token {}", address)))
    }

    fn token_ledger_mut(&mut self, address: &Address) -> Result<&mut OwnershipLedger, DaoError> {
        self.tokens
            .get_mut(address)
            .map(|token| &mut token.ledger)
            .ok_or_else(|| DaoError::NotFound(format!("asset token {}", address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::tests::member_address;

    fn gold_address() -> Address {
        Address::find(&[&b"token"[..], &b"Gold"[..]]).unwrap()
    }

    #[test]
    fn test_native_and_token_balances_are_separate() {
        let alice = member_address(1);
        let gold = gold_address();
        let mut bank = Bank::new();

        bank.issue_native(&alice, 50).unwrap();
        bank.register_token(gold, "Gold".into(), "GLD".into(), &alice, 100)
            .unwrap();

        assert_eq!(bank.balance_of(&Asset::Native, &alice).unwrap(), 50);
        assert_eq!(bank.balance_of(&Asset::Token(gold), &alice).unwrap(), 100);
        assert_eq!(bank.supply_of(&Asset::Token(gold)).unwrap(), 100);
    }

    #[test]
    fn test_transfer_moves_balance() {
        let alice = member_address(1);
        let bob = member_address(2);
        let gold = gold_address();
        let mut bank = Bank::new();
        bank.register_token(gold, "Gold".into(), "GLD".into(), &alice, 30)
            .unwrap();

        bank.transfer(&Asset::Token(gold), &alice, &bob, 12).unwrap();

        assert_eq!(bank.balance_of(&Asset::Token(gold), &alice).unwrap(), 18);
        assert_eq!(bank.balance_of(&Asset::Token(gold), &bob).unwrap(), 12);
    }

    #[test]
    fn test_overdrawn_transfer_fails() {
        let alice = member_address(1);
        let bob = member_address(2);
        let mut bank = Bank::new();
        bank.issue_native(&alice, 5).unwrap();

        let result = bank.transfer(&Asset::Native, &alice, &bob, 6);
        assert!(matches!(
            result,
            Err(DaoError::InsufficientBalance { requested: 6, available: 5 })
        ));
    }

    #[test]
    fn test_unknown_token() {
        let alice = member_address(1);
        let bank = Bank::new();

        let result = bank.balance_of(&Asset::Token(gold_address()), &alice);
        assert!(matches!(result, Err(DaoError::NotFound(_))));
    }

    #[test]
    fn test_token_registered_once() {
        let alice = member_address(1);
        let gold = gold_address();
        let mut bank = Bank::new();
        bank.register_token(gold, "Gold".into(), "GLD".into(), &alice, 1)
            .unwrap();

        let again = bank.register_token(gold, "Gold".into(), "GLD".into(), &alice, 1);
        assert!(matches!(again, Err(DaoError::AlreadyPresent(_))));
    }
}
