use crate::error::DaoError;
use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::ops::Deref;

// Address identifies every participant on the chain: members, DAOs, GovTokens,
// the offer book, asset tokens and external contracts.
// Member addresses are ed25519 verifying keys. Contract addresses are derived
// from seeds and always lie off the curve, so nobody holds a key for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address([u8; 32]);

impl Default for Address {
    fn default() -> Self {
        Address([0; 32])
    }
}

impl Deref for Address {
    type Target = [u8; 32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<&VerifyingKey> for Address {
    fn from(key: &VerifyingKey) -> Self {
        Address(key.to_bytes())
    }
}

impl Address {
    pub fn new(bytes: [u8; 32]) -> Self {
        Address(bytes)
    }

    pub fn derive(seeds: &[&[u8]], bump: u8) -> [u8; 32] {
        let mut hasher = Sha256::new();

        // Domain separator
        hasher.update(b"DAO_Address");

        // Length-prefixed so seed boundaries cannot shift
        for seed in seeds {
            hasher.update((seed.len() as u64).to_le_bytes());
            hasher.update(seed);
        }

        hasher.update([bump]);

        hasher.finalize().into()
    }

    /// Whether 32 bytes fail to decode as a point on the ed25519 curve
    pub fn is_off_curve(bytes: &[u8; 32]) -> bool {
        let Ok(compressed_edwards_y) = CompressedEdwardsY::from_slice(bytes.as_ref()) else {
            return true;
        };
        compressed_edwards_y.decompress().is_none()
    }

    /// Try to find a contract address for the given seeds
    pub fn try_find(seeds: &[&[u8]]) -> Option<(Address, u8)> {
        for bump in 0..=u8::MAX {
            let candidate = Address::derive(seeds, bump);
            if Address::is_off_curve(&candidate) {
                return Some((Address(candidate), bump));
            }
        }
        None
    }

    /// Find a contract address for the given seeds
    pub fn find(seeds: &[&[u8]]) -> Result<Address, DaoError> {
        Address::try_find(seeds)
            .map(|(address, _)| address)
            .ok_or_else(|| DaoError::NotFound("no off-curve address for seeds".to_string()))
    }

    /// The verifying key behind a member address, if it is one
    pub fn verifying_key(&self) -> Option<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).ok()
    }

    pub fn is_contract(&self) -> bool {
        Address::is_off_curve(&self.0)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    /// Deterministic member address for tests
    pub fn member_address(seed: u8) -> Address {
        let key = SigningKey::from_bytes(&[seed; 32]);
        Address::from(&key.verifying_key())
    }

    #[test]
    fn test_default_address() {
        let default_address = Address::default();
        assert_eq!(*default_address, [0u8; 32]);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let seed1: &[u8] = b"dao";
        let seed2: &[u8] = b"0";

        let first = Address::derive(&[seed1, seed2], 3);
        let second = Address::derive(&[seed1, seed2], 3);
        assert_eq!(first, second);

        // A different bump or seed order gives a different address
        assert_ne!(first, Address::derive(&[seed1, seed2], 4));
        assert_ne!(first, Address::derive(&[seed2, seed1], 3));
    }

    #[test]
    fn test_seed_boundaries_matter() {
        let split: [&[u8]; 3] = [b"token", b"Go", b"ldGLD"];
        let joined: [&[u8]; 3] = [b"token", b"Gold", b"GLD"];

        assert_ne!(Address::derive(&split, 0), Address::derive(&joined, 0));
        assert_ne!(Address::find(&split).unwrap(), Address::find(&joined).unwrap());
    }

    #[test]
    fn test_found_addresses_are_contracts() {
        let address = Address::find(&[b"offer_book"]).unwrap();
        assert!(address.is_contract());
        assert!(address.verifying_key().is_none());

        // Searching again yields the same address and bump
        let (again, bump) = Address::try_find(&[b"offer_book"]).unwrap();
        assert_eq!(address, again);
        assert_eq!(*again, Address::derive(&[b"offer_book"], bump));
    }

    #[test]
    fn test_member_addresses_are_keys() {
        let member = member_address(7);
        assert!(!member.is_contract());
        assert!(member.verifying_key().is_some());
        assert_ne!(member, member_address(8));
    }

    #[test]
    fn test_display_is_hex() {
        let address = Address::new([0xab; 32]);
        let rendered = address.to_string();
        assert!(rendered.starts_with("0xabab"));
        assert_eq!(rendered.len(), 66);
    }
}
