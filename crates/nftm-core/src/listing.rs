//! Marketplace listing ledger.
//!
//! Tracks standing offers to sell one token at a fixed price, splits every
//! payment between seller proceeds and the accumulated marketplace fee, and
//! leans on the supply ledger for ownership and approval truth. A listing
//! moves `Active -> Sold | Cancelled`; both terminal states are final and
//! the cause is kept for audit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::supply::{SupplyError, SupplyLedger};
use crate::{AccountId, Amount, CollectionId, ListingId, TokenId, FEE_DENOMINATOR};

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("{caller} does not own token {token_id} (owner is {owner})")]
    NotTokenOwner {
        caller: AccountId,
        token_id: TokenId,
        owner: AccountId,
    },
    #[error("{seller} has not approved the marketplace operator {operator}")]
    NotApproved {
        seller: AccountId,
        operator: AccountId,
    },
    #[error("listing price must be positive")]
    InvalidPrice,
    #[error("token {token_id} already has an active listing ({listing_id})")]
    AlreadyListed {
        token_id: TokenId,
        listing_id: ListingId,
    },
    #[error("listing {listing_id} is not active")]
    ListingNotActive { listing_id: ListingId },
    #[error("payment of {offered} is below the listing price {price}")]
    InsufficientPayment { offered: Amount, price: Amount },
    #[error("{seller} cannot buy their own listing")]
    SelfPurchase { seller: AccountId },
    #[error("{caller} is not the seller of listing {listing_id}")]
    NotSeller {
        caller: AccountId,
        listing_id: ListingId,
    },
    #[error("listing {listing_id} was never created")]
    NonexistentListing { listing_id: ListingId },
    #[error("{caller} is not the marketplace owner")]
    NotMarketOwner { caller: AccountId },
    #[error("listing {listing_id} belongs to collection {expected}, got {got}")]
    CollectionMismatch {
        listing_id: ListingId,
        expected: CollectionId,
        got: CollectionId,
    },
    #[error(transparent)]
    Supply(#[from] SupplyError),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Sold,
    Cancelled,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    pub token_id: TokenId,
    pub nft_contract: CollectionId,
    pub seller: AccountId,
    pub price: Amount,
    pub status: ListingStatus,
    pub created_at: u64,
}

impl Listing {
    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }
}

/// Everything a successful purchase moved: the fee split and the refund of
/// any overpayment. `seller_proceeds + fee == price` always.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub listing_id: ListingId,
    pub token_id: TokenId,
    pub nft_contract: CollectionId,
    pub seller: AccountId,
    pub buyer: AccountId,
    pub price: Amount,
    pub fee: Amount,
    pub seller_proceeds: Amount,
    pub refund: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListingEvent {
    Listed {
        listing_id: ListingId,
        nft_contract: CollectionId,
        token_id: TokenId,
        seller: AccountId,
        price: Amount,
    },
    Sold {
        listing_id: ListingId,
        buyer: AccountId,
        price: Amount,
        fee: Amount,
        seller_proceeds: Amount,
    },
    Cancelled {
        listing_id: ListingId,
    },
    PriceUpdated {
        listing_id: ListingId,
        old_price: Amount,
        new_price: Amount,
    },
    FeesWithdrawn {
        to: AccountId,
        amount: Amount,
    },
}

/// Listing state for the whole marketplace.
///
/// `operator` is the identity sellers approve on the supply ledger and the
/// identity this ledger transfers custody with during a sale. `owner` is
/// the fee collector. Listing ids are 0-indexed;
/// [`total_listings`](Self::total_listings) counts every listing ever
/// created, active or not.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingLedger {
    operator: AccountId,
    owner: AccountId,
    fee_bps: u64,
    accumulated_fees: Amount,
    listings: BTreeMap<ListingId, Listing>,
    active_by_token: BTreeMap<CollectionId, BTreeMap<TokenId, ListingId>>,
    by_seller: BTreeMap<AccountId, Vec<ListingId>>,
    next_listing_id: ListingId,
    events: Vec<ListingEvent>,
}

impl ListingLedger {
    /// `fee_bps` must not exceed [`FEE_DENOMINATOR`].
    pub fn new(operator: impl Into<AccountId>, owner: impl Into<AccountId>, fee_bps: u64) -> Self {
        assert!(fee_bps <= FEE_DENOMINATOR, "fee rate above 100%");
        Self {
            operator: operator.into(),
            owner: owner.into(),
            fee_bps,
            accumulated_fees: 0,
            listings: BTreeMap::new(),
            active_by_token: BTreeMap::new(),
            by_seller: BTreeMap::new(),
            next_listing_id: 0,
            events: Vec::new(),
        }
    }

    pub fn operator(&self) -> &AccountId {
        &self.operator
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn fee_bps(&self) -> u64 {
        self.fee_bps
    }

    pub fn fees_balance(&self) -> Amount {
        self.accumulated_fees
    }

    pub fn total_listings(&self) -> u64 {
        self.next_listing_id
    }

    /// Put a token up for sale. The seller must own it per the supply
    /// ledger and must already have approved the marketplace operator.
    pub fn list_nft(
        &mut self,
        supply: &SupplyLedger,
        seller: &AccountId,
        token_id: TokenId,
        price: Amount,
        now: u64,
    ) -> Result<ListingId, ListingError> {
        if price == 0 {
            return Err(ListingError::InvalidPrice);
        }
        let owner = supply.owner_of(token_id)?;
        if owner != seller {
            return Err(ListingError::NotTokenOwner {
                caller: seller.clone(),
                token_id,
                owner: owner.clone(),
            });
        }
        if !supply.is_approved_for_all(seller, &self.operator) {
            return Err(ListingError::NotApproved {
                seller: seller.clone(),
                operator: self.operator.clone(),
            });
        }
        let nft_contract = supply.collection_id().clone();
        if let Some(&listing_id) = self
            .active_by_token
            .get(&nft_contract)
            .and_then(|tokens| tokens.get(&token_id))
        {
            return Err(ListingError::AlreadyListed {
                token_id,
                listing_id,
            });
        }

        let listing_id = self.next_listing_id;
        self.next_listing_id += 1;
        self.listings.insert(
            listing_id,
            Listing {
                token_id,
                nft_contract: nft_contract.clone(),
                seller: seller.clone(),
                price,
                status: ListingStatus::Active,
                created_at: now,
            },
        );
        self.active_by_token
            .entry(nft_contract.clone())
            .or_default()
            .insert(token_id, listing_id);
        self.by_seller
            .entry(seller.clone())
            .or_default()
            .push(listing_id);
        self.events.push(ListingEvent::Listed {
            listing_id,
            nft_contract,
            token_id,
            seller: seller.clone(),
            price,
        });
        Ok(listing_id)
    }

    /// Buy an active listing with `amount` attached.
    ///
    /// The fee is `price * fee_bps / 10_000` rounded down; the remainder of
    /// the split favours the seller, and anything above the price is
    /// refunded to the buyer. Custody moves through the supply ledger's
    /// approval-gated transfer before any listing state is touched, so a
    /// failed transfer leaves both ledgers exactly as they were.
    pub fn buy_nft(
        &mut self,
        supply: &mut SupplyLedger,
        buyer: &AccountId,
        listing_id: ListingId,
        amount: Amount,
    ) -> Result<PurchaseReceipt, ListingError> {
        let listing = self.listing(listing_id)?;
        if !listing.is_active() {
            return Err(ListingError::ListingNotActive { listing_id });
        }
        if supply.collection_id() != &listing.nft_contract {
            return Err(ListingError::CollectionMismatch {
                listing_id,
                expected: listing.nft_contract.clone(),
                got: supply.collection_id().clone(),
            });
        }
        if amount < listing.price {
            return Err(ListingError::InsufficientPayment {
                offered: amount,
                price: listing.price,
            });
        }
        if buyer == &listing.seller {
            return Err(ListingError::SelfPurchase {
                seller: listing.seller.clone(),
            });
        }

        let token_id = listing.token_id;
        let nft_contract = listing.nft_contract.clone();
        let seller = listing.seller.clone();
        let price = listing.price;
        let fee = self.fee_for(price);
        let seller_proceeds = price - fee;
        let refund = amount - price;

        // The one fallible cross-ledger step. Everything after it commits.
        supply.transfer(&self.operator, &seller, buyer, token_id)?;

        let listing = self
            .listings
            .get_mut(&listing_id)
            .expect("listing validated above");
        listing.status = ListingStatus::Sold;
        self.clear_active(&nft_contract, token_id);
        self.accumulated_fees += fee;
        self.events.push(ListingEvent::Sold {
            listing_id,
            buyer: buyer.clone(),
            price,
            fee,
            seller_proceeds,
        });
        Ok(PurchaseReceipt {
            listing_id,
            token_id,
            nft_contract,
            seller,
            buyer: buyer.clone(),
            price,
            fee,
            seller_proceeds,
            refund,
        })
    }

    /// Take an active listing off the market. Only the seller may cancel;
    /// no funds move.
    pub fn cancel_listing(
        &mut self,
        caller: &AccountId,
        listing_id: ListingId,
    ) -> Result<(), ListingError> {
        let listing = self
            .listings
            .get_mut(&listing_id)
            .ok_or(ListingError::NonexistentListing { listing_id })?;
        if &listing.seller != caller {
            return Err(ListingError::NotSeller {
                caller: caller.clone(),
                listing_id,
            });
        }
        if !listing.is_active() {
            return Err(ListingError::ListingNotActive { listing_id });
        }
        listing.status = ListingStatus::Cancelled;
        let nft_contract = listing.nft_contract.clone();
        let token_id = listing.token_id;
        self.clear_active(&nft_contract, token_id);
        self.events.push(ListingEvent::Cancelled { listing_id });
        Ok(())
    }

    /// Change the price of an active listing. Only the seller may do so.
    pub fn update_price(
        &mut self,
        caller: &AccountId,
        listing_id: ListingId,
        new_price: Amount,
    ) -> Result<(), ListingError> {
        let listing = self
            .listings
            .get_mut(&listing_id)
            .ok_or(ListingError::NonexistentListing { listing_id })?;
        if &listing.seller != caller {
            return Err(ListingError::NotSeller {
                caller: caller.clone(),
                listing_id,
            });
        }
        if !listing.is_active() {
            return Err(ListingError::ListingNotActive { listing_id });
        }
        if new_price == 0 {
            return Err(ListingError::InvalidPrice);
        }
        let old_price = listing.price;
        listing.price = new_price;
        self.events.push(ListingEvent::PriceUpdated {
            listing_id,
            old_price,
            new_price,
        });
        Ok(())
    }

    /// Drain the accumulated fees to the marketplace owner.
    pub fn withdraw_fees(&mut self, caller: &AccountId) -> Result<Amount, ListingError> {
        if caller != &self.owner {
            return Err(ListingError::NotMarketOwner {
                caller: caller.clone(),
            });
        }
        let amount = std::mem::take(&mut self.accumulated_fees);
        self.events.push(ListingEvent::FeesWithdrawn {
            to: self.owner.clone(),
            amount,
        });
        Ok(amount)
    }

    pub fn listing(&self, listing_id: ListingId) -> Result<&Listing, ListingError> {
        self.listings
            .get(&listing_id)
            .ok_or(ListingError::NonexistentListing { listing_id })
    }

    /// Ids of all currently active listings, in creation order.
    ///
    /// A linear scan; fine for the sets a single market holds. An embedder
    /// with a very large active set would maintain its own index.
    pub fn active_listings(&self) -> Vec<ListingId> {
        self.listings
            .iter()
            .filter(|(_, listing)| listing.is_active())
            .map(|(&listing_id, _)| listing_id)
            .collect()
    }

    /// Every listing id the seller ever created, active or terminal.
    pub fn seller_listings(&self, seller: &AccountId) -> Vec<ListingId> {
        self.by_seller.get(seller).cloned().unwrap_or_default()
    }

    pub fn events(&self) -> &[ListingEvent] {
        &self.events
    }

    fn fee_for(&self, price: Amount) -> Amount {
        (u128::from(price) * u128::from(self.fee_bps) / u128::from(FEE_DENOMINATOR)) as Amount
    }

    fn clear_active(&mut self, nft_contract: &CollectionId, token_id: TokenId) {
        if let Some(tokens) = self.active_by_token.get_mut(nft_contract) {
            tokens.remove(&token_id);
            if tokens.is_empty() {
                self.active_by_token.remove(nft_contract);
            }
        }
    }

    pub(crate) fn digest_leaves(&self, leaves: &mut Vec<[u8; 32]>) {
        let mut hasher = Sha256::new();
        hasher.update(b"market");
        hasher.update(self.operator.as_bytes());
        hasher.update(self.owner.as_bytes());
        hasher.update(self.fee_bps.to_le_bytes());
        hasher.update(self.accumulated_fees.to_le_bytes());
        hasher.update(self.next_listing_id.to_le_bytes());
        leaves.push(hasher.finalize().into());

        for (listing_id, listing) in &self.listings {
            let mut hasher = Sha256::new();
            hasher.update(b"listing");
            hasher.update(listing_id.to_le_bytes());
            hasher.update(listing.nft_contract.as_bytes());
            hasher.update(listing.token_id.to_le_bytes());
            hasher.update(listing.seller.as_bytes());
            hasher.update(listing.price.to_le_bytes());
            hasher.update([listing.status as u8]);
            hasher.update(listing.created_at.to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
    }
}
