//! Offer book: deploys GovTokens and sells them for treasury contributions.
//!
//! Each DAO configures at most one public offer (anyone can buy at a fixed
//! rate) and any number of private offers (one recipient, one fixed exchange,
//! single use). Payment is pulled from the buyer's own call and lands in the
//! DAO treasury; GovToken units are minted to the buyer in the same frame.

use crate::action::{decode_call, encode_call, ChainEvent};
use crate::assets::{Asset, TokenCall};
use crate::dao::DaoCall;
use crate::error::DaoError;
use crate::gov_token::{GovToken, GovTokenCall, GOV_TOKEN_SEED};
use crate::id::Address;
use crate::ledger::Amount;
use crate::runtime::{CallContext, Chain};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub(crate) const OFFER_BOOK_SEED: &[u8] = b"offer_book";

/// Standing offer to sell GovToken units at `rate` per unit of `currency`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicOffer {
    pub is_active: bool,
    pub currency: Asset,
    pub rate: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferStatus {
    Active,
    Disabled,
    /// Bought; can never be bought or re-enabled again
    Settled,
}

/// One-off exchange reserved for a single recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateOffer {
    pub status: OfferStatus,
    pub recipient: Address,
    pub currency: Asset,
    /// Amount of `currency` the recipient pays
    pub give_amount: Amount,
    /// GovToken units the recipient receives
    pub receive_amount: Amount,
}

impl PrivateOffer {
    pub fn is_active(&self) -> bool {
        self.status == OfferStatus::Active
    }
}

/// Calls understood by the offer book. Configuration calls must come from a DAO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferBookCall {
    CreateGovToken {
        name: String,
        symbol: String,
    },
    InitPublicOffer {
        is_active: bool,
        currency: Asset,
        rate: Amount,
    },
    CreatePrivateOffer {
        recipient: Address,
        currency: Asset,
        give_amount: Amount,
        receive_amount: Amount,
    },
    DisablePrivateOffer {
        index: usize,
    },
    EnablePrivateOffer {
        index: usize,
    },
    BuyPublicOffer {
        dao: Address,
        amount: Amount,
    },
    BuyPrivateOffer {
        dao: Address,
        index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferBook {
    address: Address,
    public_offers: BTreeMap<Address, PublicOffer>,
    private_offers: BTreeMap<Address, Vec<PrivateOffer>>,
    gov_tokens: BTreeSet<Address>,
}

impl OfferBook {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            public_offers: BTreeMap::new(),
            private_offers: BTreeMap::new(),
            gov_tokens: BTreeSet::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The DAO's public offer; inactive with zero rate until configured
    pub fn public_offer(&self, dao: &Address) -> PublicOffer {
        self.public_offers.get(dao).copied().unwrap_or_default()
    }

    pub fn private_offers(&self, dao: &Address) -> &[PrivateOffer] {
        self.private_offers
            .get(dao)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn private_offer(&self, dao: &Address, index: usize) -> Option<&PrivateOffer> {
        self.private_offers(dao).get(index)
    }

    pub fn number_of_private_offers(&self, dao: &Address) -> usize {
        self.private_offers(dao).len()
    }

    /// Whether `address` is a GovToken this offer book deployed
    pub fn is_gov_token(&self, address: &Address) -> bool {
        self.gov_tokens.contains(address)
    }

    fn private_offer_mut(&mut self, dao: &Address, index: usize) -> Result<&mut PrivateOffer, DaoError> {
        self.private_offers
            .get_mut(dao)
            .and_then(|offers| offers.get_mut(index))
            .ok_or_else(|| DaoError::NotFound(format!("private offer {} of DAO {}", index, dao)))
    }
}

impl Chain {
    pub fn offer_book(&self) -> &OfferBook {
        &self.state.offer_book
    }

    /// Pay `amount` of the public offer's currency and receive `amount * rate` GovToken units
    ///
    /// # Returns
    /// The number of GovToken units minted to the buyer
    pub fn buy_public_offer(&mut self, buyer: Address, dao: Address, amount: Amount) -> Result<Amount, DaoError> {
        let payload = encode_call(&OfferBookCall::BuyPublicOffer { dao, amount })?;
        let output = self.call(buyer, self.state.offer_book.address(), &payload, 0)?;
        decode_call(&output)
    }

    pub fn buy_private_offer(&mut self, buyer: Address, dao: Address, index: usize) -> Result<(), DaoError> {
        let payload = encode_call(&OfferBookCall::BuyPrivateOffer { dao, index })?;
        self.call(buyer, self.state.offer_book.address(), &payload, 0)?;
        Ok(())
    }

    pub(crate) fn handle_offer_book_call(
        &mut self,
        context: CallContext,
        call: OfferBookCall,
    ) -> Result<Vec<u8>, DaoError> {
        let caller = context.caller;
        match call {
            OfferBookCall::BuyPublicOffer { dao, amount } => {
                let minted = self.buy_public(caller, dao, amount)?;
                encode_call(&minted)
            }
            OfferBookCall::BuyPrivateOffer { dao, index } => {
                self.buy_private(caller, dao, index)?;
                Ok(Vec::new())
            }
            config => {
                // The calling DAO configures its own offers
                if !self.state.dao_index.contains_key(&caller) {
                    return Err(DaoError::NotPermitted(caller));
                }
                self.configure(caller, config)
            }
        }
    }

    fn configure(&mut self, dao: Address, call: OfferBookCall) -> Result<Vec<u8>, DaoError> {
        match call {
            OfferBookCall::CreateGovToken { name, symbol } => {
                let gov_token = self.deploy_gov_token(dao, name, symbol)?;
                return encode_call(&gov_token);
            }
            OfferBookCall::InitPublicOffer {
                is_active,
                currency,
                rate,
            } => {
                let offer = PublicOffer {
                    is_active,
                    currency,
                    rate,
                };
                self.state.offer_book.public_offers.insert(dao, offer);
                self.state.events.push(ChainEvent::PublicOfferInitialized {
                    dao,
                    is_active,
                    currency,
                    rate,
                });
                debug!("DAO {} set public offer {:?}", dao, offer);
            }
            OfferBookCall::CreatePrivateOffer {
                recipient,
                currency,
                give_amount,
                receive_amount,
            } => {
                let offers = self.state.offer_book.private_offers.entry(dao).or_default();
                offers.push(PrivateOffer {
                    status: OfferStatus::Active,
                    recipient,
                    currency,
                    give_amount,
                    receive_amount,
                });
                let index = offers.len() - 1;
                self.state.events.push(ChainEvent::PrivateOfferCreated {
                    dao,
                    index,
                    recipient,
                });
                debug!("DAO {} created private offer {} for {}", dao, index, recipient);
            }
            OfferBookCall::DisablePrivateOffer { index } => self.set_private_offer_status(dao, index, false)?,
            OfferBookCall::EnablePrivateOffer { index } => self.set_private_offer_status(dao, index, true)?,
            buy => return Err(DaoError::InvalidPayload(format!("{:?}", buy))),
        }
        Ok(Vec::new())
    }

    fn deploy_gov_token(&mut self, dao: Address, name: String, symbol: String) -> Result<Address, DaoError> {
        if self.state.dao(&dao)?.gov_token.is_some() {
            return Err(DaoError::GovTokenAlreadyExists(dao));
        }

        let offer_book = self.state.offer_book.address();
        let address = Address::find(&[GOV_TOKEN_SEED, dao.as_ref()])?;
        let index = self.state.gov_tokens.len();
        self.state
            .gov_tokens
            .push(GovToken::new(address, name, symbol, dao, offer_book));
        self.state.gov_token_index.insert(address, index);
        self.state.offer_book.gov_tokens.insert(address);

        // Links the token to the DAO and makes it a permitted delegate
        let link = encode_call(&DaoCall::SetGovToken { gov_token: address })?;
        self.call(offer_book, dao, &link, 0)?;

        self.state.events.push(ChainEvent::GovTokenCreated { dao, gov_token: address });
        info!("Deployed GovToken {} for DAO {}", address, dao);
        Ok(address)
    }

    fn set_private_offer_status(&mut self, dao: Address, index: usize, is_active: bool) -> Result<(), DaoError> {
        let offer = self.state.offer_book.private_offer_mut(&dao, index)?;
        if offer.status == OfferStatus::Settled {
            return Err(DaoError::OfferAlreadySettled);
        }

        offer.status = if is_active {
            OfferStatus::Active
        } else {
            OfferStatus::Disabled
        };
        self.state.events.push(ChainEvent::PrivateOfferStatusChanged {
            dao,
            index,
            is_active,
        });
        Ok(())
    }

    fn buy_public(&mut self, buyer: Address, dao: Address, amount: Amount) -> Result<Amount, DaoError> {
        let offer = self.state.offer_book.public_offer(&dao);
        if !offer.is_active {
            return Err(DaoError::OfferDisabled);
        }
        if amount == 0 {
            return Err(DaoError::ZeroAmount);
        }
        let minted = amount.checked_mul(offer.rate).ok_or(DaoError::Overflow)?;

        self.collect_payment(buyer, dao, offer.currency, amount)?;
        self.mint_gov_token(dao, buyer, minted)?;

        self.state.events.push(ChainEvent::PublicOfferBought {
            dao,
            buyer,
            paid: amount,
            minted,
        });
        info!("{} bought {} GovToken units of DAO {} for {} {}", buyer, minted, dao, amount, offer.currency);
        Ok(minted)
    }

    fn buy_private(&mut self, buyer: Address, dao: Address, index: usize) -> Result<(), DaoError> {
        let offer = self.state.offer_book.private_offer_mut(&dao, index)?;
        match offer.status {
            OfferStatus::Active => {}
            OfferStatus::Disabled => return Err(DaoError::OfferDisabled),
            OfferStatus::Settled => return Err(DaoError::OfferAlreadySettled),
        }
        if offer.recipient != buyer {
            return Err(DaoError::NotPermitted(buyer));
        }

        // Settled before any transfer happens
        offer.status = OfferStatus::Settled;
        let (currency, give_amount, receive_amount) = (offer.currency, offer.give_amount, offer.receive_amount);

        self.collect_payment(buyer, dao, currency, give_amount)?;
        self.mint_gov_token(dao, buyer, receive_amount)?;

        self.state
            .events
            .push(ChainEvent::PrivateOfferBought { dao, buyer, index });
        info!("{} bought private offer {} of DAO {}", buyer, index, dao);
        Ok(())
    }

    /// Move the buyer's payment into the DAO treasury
    fn collect_payment(&mut self, buyer: Address, dao: Address, currency: Asset, amount: Amount) -> Result<(), DaoError> {
        if amount == 0 {
            return Ok(());
        }
        match currency {
            Asset::Native => self.call(buyer, dao, &[], amount)?,
            Asset::Token(token) => {
                let payload = encode_call(&TokenCall::Transfer { to: dao, amount })?;
                self.call(buyer, token, &payload, 0)?
            }
        };
        Ok(())
    }

    fn mint_gov_token(&mut self, dao: Address, to: Address, amount: Amount) -> Result<(), DaoError> {
        let gov_token = self
            .state
            .dao(&dao)?
            .gov_token
            .ok_or(DaoError::GovTokenMissing(dao))?;

        let payload = encode_call(&GovTokenCall::Mint { to, amount })?;
        self.call(self.state.offer_book.address(), gov_token, &payload, 0)?;
        Ok(())
    }
}
