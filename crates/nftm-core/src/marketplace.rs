//! Top-level aggregate pairing the listing ledger with its collections.
//!
//! The listing ledger references tokens by `(collection, token id)`; this
//! type owns the registry that resolves a collection reference to the
//! actual supply ledger and routes the cross-ledger operations, so a
//! caller can never pair a listing with the wrong collection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::digest::merkle_root;
use crate::listing::{ListingError, ListingLedger, PurchaseReceipt};
use crate::supply::{SupplyError, SupplyLedger};
use crate::{AccountId, Amount, CollectionId, ListingId, TokenId};

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("unknown collection {0}")]
    UnknownCollection(CollectionId),
    #[error("collection {0} is already registered")]
    CollectionExists(CollectionId),
    #[error(transparent)]
    Listing(#[from] ListingError),
    #[error(transparent)]
    Supply(#[from] SupplyError),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Marketplace {
    collections: BTreeMap<CollectionId, SupplyLedger>,
    listings: ListingLedger,
}

impl Marketplace {
    /// `operator` is the marketplace's own identity (what sellers approve);
    /// `owner` collects the fees; `fee_bps` must not exceed 10 000.
    pub fn new(operator: impl Into<AccountId>, owner: impl Into<AccountId>, fee_bps: u64) -> Self {
        Self {
            collections: BTreeMap::new(),
            listings: ListingLedger::new(operator, owner, fee_bps),
        }
    }

    pub fn register_collection(&mut self, supply: SupplyLedger) -> Result<(), MarketError> {
        let collection_id = supply.collection_id().clone();
        if self.collections.contains_key(&collection_id) {
            return Err(MarketError::CollectionExists(collection_id));
        }
        self.collections.insert(collection_id, supply);
        Ok(())
    }

    pub fn collection(&self, collection_id: &str) -> Result<&SupplyLedger, MarketError> {
        self.collections
            .get(collection_id)
            .ok_or_else(|| MarketError::UnknownCollection(collection_id.to_string()))
    }

    pub fn collection_mut(&mut self, collection_id: &str) -> Result<&mut SupplyLedger, MarketError> {
        self.collections
            .get_mut(collection_id)
            .ok_or_else(|| MarketError::UnknownCollection(collection_id.to_string()))
    }

    pub fn collections(&self) -> impl Iterator<Item = &SupplyLedger> {
        self.collections.values()
    }

    pub fn listings(&self) -> &ListingLedger {
        &self.listings
    }

    pub fn list_nft(
        &mut self,
        seller: &AccountId,
        collection_id: &str,
        token_id: TokenId,
        price: Amount,
        now: u64,
    ) -> Result<ListingId, MarketError> {
        let supply = self
            .collections
            .get(collection_id)
            .ok_or_else(|| MarketError::UnknownCollection(collection_id.to_string()))?;
        Ok(self.listings.list_nft(supply, seller, token_id, price, now)?)
    }

    pub fn buy_nft(
        &mut self,
        buyer: &AccountId,
        listing_id: ListingId,
        amount: Amount,
    ) -> Result<PurchaseReceipt, MarketError> {
        let collection_id = self.listings.listing(listing_id)?.nft_contract.clone();
        let supply = self
            .collections
            .get_mut(&collection_id)
            .ok_or(MarketError::UnknownCollection(collection_id))?;
        Ok(self.listings.buy_nft(supply, buyer, listing_id, amount)?)
    }

    pub fn cancel_listing(
        &mut self,
        caller: &AccountId,
        listing_id: ListingId,
    ) -> Result<(), MarketError> {
        Ok(self.listings.cancel_listing(caller, listing_id)?)
    }

    pub fn update_price(
        &mut self,
        caller: &AccountId,
        listing_id: ListingId,
        new_price: Amount,
    ) -> Result<(), MarketError> {
        Ok(self.listings.update_price(caller, listing_id, new_price)?)
    }

    pub fn withdraw_fees(&mut self, caller: &AccountId) -> Result<Amount, MarketError> {
        Ok(self.listings.withdraw_fees(caller)?)
    }

    /// Merkle root over the whole marketplace state. Equal states commit to
    /// equal roots; any mutation changes the root.
    pub fn state_digest(&self) -> [u8; 32] {
        let mut leaves = Vec::new();
        for supply in self.collections.values() {
            supply.digest_leaves(&mut leaves);
        }
        self.listings.digest_leaves(&mut leaves);
        merkle_root(leaves)
    }
}
