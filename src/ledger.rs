use crate::error::DaoError;
use crate::id::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unsigned unit count used for every balance, supply and payment
pub type Amount = u128;

/// Balance mapping shared by DAO ownership, GovToken claims and asset tokens.
///
/// `total_supply` always equals the sum of all balances: every mutation goes
/// through `mint`, `burn` or `move_units`, each of which keeps both sides in step.
/// Holders whose balance drops to zero are removed from the map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipLedger {
    balances: BTreeMap<Address, Amount>,
    total_supply: Amount,
}

impl OwnershipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from a starting holder → share assignment
    ///
    /// # Parameters
    /// * `holders` - Initial holders, in order
    /// * `shares` - Units assigned to the holder at the same index
    ///
    /// # Returns
    /// The populated ledger, or `LengthMismatch` when the slices differ in length
    pub fn with_allocations(holders: &[Address], shares: &[Amount]) -> Result<Self, DaoError> {
        if holders.len() != shares.len() {
            return Err(DaoError::LengthMismatch {
                partners: holders.len(),
                shares: shares.len(),
            });
        }

        let mut ledger = Self::new();
        for (holder, share) in holders.iter().zip(shares) {
            ledger.mint(holder, *share)?;
        }
        Ok(ledger)
    }

    pub fn balance_of(&self, holder: &Address) -> Amount {
        self.balances.get(holder).copied().unwrap_or_default()
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Holders with a non-zero balance, in address order
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    pub fn mint(&mut self, to: &Address, amount: Amount) -> Result<(), DaoError> {
        if amount == 0 {
            return Ok(());
        }
        let total_supply = self.total_supply.checked_add(amount).ok_or(DaoError::Overflow)?;
        let balance = self.balance_of(to).checked_add(amount).ok_or(DaoError::Overflow)?;

        self.balances.insert(*to, balance);
        self.total_supply = total_supply;
        Ok(())
    }

    pub fn burn(&mut self, from: &Address, amount: Amount) -> Result<(), DaoError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(DaoError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        self.set_balance(from, available - amount);
        self.total_supply -= amount;
        Ok(())
    }

    /// Move units between holders without touching the total supply
    pub fn move_units(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<(), DaoError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(DaoError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }

        // Cannot overflow: the receiver's balance is bounded by the total supply
        let received = self.balance_of(to) + amount;
        self.set_balance(from, available - amount);
        self.set_balance(to, received);
        Ok(())
    }

    fn set_balance(&mut self, holder: &Address, balance: Amount) {
        if balance == 0 {
            self.balances.remove(holder);
        } else {
            self.balances.insert(*holder, balance);
        }
    }
}

/// A mintable or burnable switch with a one-way freeze.
///
/// Once frozen the switch keeps its current value forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyGate {
    enabled: bool,
    frozen: bool,
}

impl Default for SupplyGate {
    fn default() -> Self {
        Self {
            enabled: true,
            frozen: false,
        }
    }
}

impl SupplyGate {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set(&mut self, enabled: bool) -> Result<(), DaoError> {
        if self.frozen {
            return Err(DaoError::StatusFrozen);
        }
        self.enabled = enabled;
        Ok(())
    }

    pub fn freeze(&mut self) -> Result<(), DaoError> {
        if self.frozen {
            return Err(DaoError::StatusFrozen);
        }
        self.frozen = true;
        Ok(())
    }
}
