//! Capped sequential minting ledger.
//!
//! Owns token identity for a single collection: ids are assigned
//! sequentially from zero up to a hard supply cap, every token carries an
//! opaque metadata URI, and ownership only moves through approval-gated
//! transfers. Side effects never leave the ledger's own state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AccountId, CollectionId, TokenId};

#[derive(Debug, thiserror::Error)]
pub enum SupplyError {
    #[error("minting {requested} token(s) would exceed the supply cap, {remaining} remaining")]
    SupplyExhausted { requested: u64, remaining: u64 },
    #[error("batch of {requested} exceeds the maximum batch size {max}")]
    BatchTooLarge { requested: usize, max: usize },
    #[error("token {token_id} has not been minted")]
    NonexistentToken { token_id: TokenId },
    #[error("{caller} is neither the owner of token {token_id} nor an approved operator")]
    NotOwnerOrApproved { caller: AccountId, token_id: TokenId },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupplyEvent {
    Minted {
        minter: AccountId,
        to: AccountId,
        token_id: TokenId,
        metadata_uri: String,
    },
    Transferred {
        from: AccountId,
        to: AccountId,
        token_id: TokenId,
    },
    ApprovalForAll {
        owner: AccountId,
        operator: AccountId,
        approved: bool,
    },
}

/// Minting and ownership state for one collection.
///
/// Token ids are 0-indexed; [`total_minted`](Self::total_minted) equals the
/// next id to be assigned. Minted tokens are never destroyed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupplyLedger {
    collection_id: CollectionId,
    max_supply: u64,
    max_batch_size: usize,
    owners: BTreeMap<TokenId, AccountId>,
    token_uris: BTreeMap<TokenId, String>,
    operators: BTreeMap<AccountId, BTreeSet<AccountId>>,
    next_token_id: TokenId,
    events: Vec<SupplyEvent>,
}

impl SupplyLedger {
    pub fn new(collection_id: impl Into<CollectionId>, max_supply: u64, max_batch_size: usize) -> Self {
        Self {
            collection_id: collection_id.into(),
            max_supply,
            max_batch_size,
            owners: BTreeMap::new(),
            token_uris: BTreeMap::new(),
            operators: BTreeMap::new(),
            next_token_id: 0,
            events: Vec::new(),
        }
    }

    pub fn collection_id(&self) -> &CollectionId {
        &self.collection_id
    }

    pub fn max_supply(&self) -> u64 {
        self.max_supply
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn total_minted(&self) -> u64 {
        self.next_token_id
    }

    pub fn remaining_supply(&self) -> u64 {
        self.max_supply - self.next_token_id
    }

    /// Mint one token to `to`, recording `metadata_uri` verbatim.
    pub fn mint_single(
        &mut self,
        minter: &AccountId,
        to: &AccountId,
        metadata_uri: impl Into<String>,
    ) -> Result<TokenId, SupplyError> {
        self.ensure_capacity(1)?;
        Ok(self.assign_next(minter, to, metadata_uri.into()))
    }

    /// Mint one token per URI, all or nothing.
    pub fn mint_batch(
        &mut self,
        minter: &AccountId,
        to: &AccountId,
        metadata_uris: Vec<String>,
    ) -> Result<Vec<TokenId>, SupplyError> {
        if metadata_uris.len() > self.max_batch_size {
            return Err(SupplyError::BatchTooLarge {
                requested: metadata_uris.len(),
                max: self.max_batch_size,
            });
        }
        self.ensure_capacity(metadata_uris.len() as u64)?;
        Ok(metadata_uris
            .into_iter()
            .map(|uri| self.assign_next(minter, to, uri))
            .collect())
    }

    /// Mint `quantity` tokens whose URIs are `base_uri` suffixed with the
    /// token id, so off-chain lookups can rebuild the URI from the id alone.
    pub fn mint_batch_with_base_uri(
        &mut self,
        minter: &AccountId,
        to: &AccountId,
        quantity: u64,
        base_uri: &str,
    ) -> Result<Vec<TokenId>, SupplyError> {
        if quantity > self.max_batch_size as u64 {
            return Err(SupplyError::BatchTooLarge {
                requested: quantity as usize,
                max: self.max_batch_size,
            });
        }
        self.ensure_capacity(quantity)?;
        let mut token_ids = Vec::with_capacity(quantity as usize);
        for _ in 0..quantity {
            let uri = format!("{base_uri}{}", self.next_token_id);
            token_ids.push(self.assign_next(minter, to, uri));
        }
        Ok(token_ids)
    }

    pub fn owner_of(&self, token_id: TokenId) -> Result<&AccountId, SupplyError> {
        self.owners
            .get(&token_id)
            .ok_or(SupplyError::NonexistentToken { token_id })
    }

    pub fn token_uri(&self, token_id: TokenId) -> Result<&str, SupplyError> {
        self.token_uris
            .get(&token_id)
            .map(String::as_str)
            .ok_or(SupplyError::NonexistentToken { token_id })
    }

    /// Grant or revoke `operator`'s right to move any token owned by
    /// `owner`. `owner` is the authenticated caller.
    pub fn set_approval_for_all(&mut self, owner: &AccountId, operator: &AccountId, approved: bool) {
        if approved {
            self.operators
                .entry(owner.clone())
                .or_default()
                .insert(operator.clone());
        } else if let Some(granted) = self.operators.get_mut(owner) {
            granted.remove(operator);
            if granted.is_empty() {
                self.operators.remove(owner);
            }
        }
        self.events.push(SupplyEvent::ApprovalForAll {
            owner: owner.clone(),
            operator: operator.clone(),
            approved,
        });
    }

    pub fn is_approved_for_all(&self, owner: &AccountId, operator: &AccountId) -> bool {
        self.operators
            .get(owner)
            .is_some_and(|granted| granted.contains(operator))
    }

    /// Reassign ownership of `token_id` from `from` to `to`.
    ///
    /// `caller` must be `from` itself or an operator approved by `from`,
    /// and `from` must be the current owner.
    pub fn transfer(
        &mut self,
        caller: &AccountId,
        from: &AccountId,
        to: &AccountId,
        token_id: TokenId,
    ) -> Result<(), SupplyError> {
        let owner = self.owner_of(token_id)?;
        if owner != from || (caller != from && !self.is_approved_for_all(from, caller)) {
            return Err(SupplyError::NotOwnerOrApproved {
                caller: caller.clone(),
                token_id,
            });
        }
        self.owners.insert(token_id, to.clone());
        self.events.push(SupplyEvent::Transferred {
            from: from.clone(),
            to: to.clone(),
            token_id,
        });
        Ok(())
    }

    pub fn events(&self) -> &[SupplyEvent] {
        &self.events
    }

    fn ensure_capacity(&self, requested: u64) -> Result<(), SupplyError> {
        let remaining = self.remaining_supply();
        if requested > remaining {
            return Err(SupplyError::SupplyExhausted {
                requested,
                remaining,
            });
        }
        Ok(())
    }

    fn assign_next(&mut self, minter: &AccountId, to: &AccountId, metadata_uri: String) -> TokenId {
        let token_id = self.next_token_id;
        self.next_token_id += 1;
        self.owners.insert(token_id, to.clone());
        self.token_uris.insert(token_id, metadata_uri.clone());
        self.events.push(SupplyEvent::Minted {
            minter: minter.clone(),
            to: to.clone(),
            token_id,
            metadata_uri,
        });
        token_id
    }

    pub(crate) fn digest_leaves(&self, leaves: &mut Vec<[u8; 32]>) {
        let mut hasher = Sha256::new();
        hasher.update(b"collection");
        hasher.update(self.collection_id.as_bytes());
        hasher.update(self.max_supply.to_le_bytes());
        hasher.update(self.next_token_id.to_le_bytes());
        leaves.push(hasher.finalize().into());

        for (token_id, owner) in &self.owners {
            let mut hasher = Sha256::new();
            hasher.update(b"token");
            hasher.update(self.collection_id.as_bytes());
            hasher.update(token_id.to_le_bytes());
            hasher.update(owner.as_bytes());
            if let Some(uri) = self.token_uris.get(token_id) {
                hasher.update(uri.as_bytes());
            }
            leaves.push(hasher.finalize().into());
        }
        for (owner, granted) in &self.operators {
            for operator in granted {
                let mut hasher = Sha256::new();
                hasher.update(b"operator");
                hasher.update(self.collection_id.as_bytes());
                hasher.update(owner.as_bytes());
                hasher.update(operator.as_bytes());
                leaves.push(hasher.finalize().into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> SupplyLedger {
        SupplyLedger::new("nft-main", 10, 5)
    }

    fn acct(name: &str) -> AccountId {
        name.to_string()
    }

    #[test]
    fn single_mints_assign_sequential_ids() {
        let mut supply = ledger();
        let alice = acct("alice");
        let id0 = supply.mint_single(&alice, &alice, "ipfs://a").unwrap();
        let id1 = supply.mint_single(&alice, &acct("bob"), "ipfs://b").unwrap();
        assert_eq!((id0, id1), (0, 1));
        assert_eq!(supply.owner_of(0).unwrap(), "alice");
        assert_eq!(supply.owner_of(1).unwrap(), "bob");
        assert_eq!(supply.token_uri(1).unwrap(), "ipfs://b");
        assert_eq!(supply.total_minted(), 2);
        assert_eq!(supply.remaining_supply(), 8);
    }

    #[test]
    fn mint_fails_once_cap_is_reached() {
        let mut supply = SupplyLedger::new("nft-main", 1, 5);
        let alice = acct("alice");
        supply.mint_single(&alice, &alice, "ipfs://only").unwrap();
        assert_eq!(supply.remaining_supply(), 0);
        let err = supply.mint_single(&alice, &alice, "ipfs://extra").unwrap_err();
        assert!(matches!(
            err,
            SupplyError::SupplyExhausted {
                requested: 1,
                remaining: 0
            }
        ));
        assert_eq!(supply.total_minted(), 1);
    }

    #[test]
    fn batch_mint_is_all_or_nothing() {
        let mut supply = SupplyLedger::new("nft-main", 3, 5);
        let alice = acct("alice");
        supply.mint_single(&alice, &alice, "ipfs://0").unwrap();

        let before = supply.clone();
        let uris: Vec<String> = (0..3).map(|i| format!("ipfs://batch/{i}")).collect();
        let err = supply.mint_batch(&alice, &alice, uris).unwrap_err();
        assert!(matches!(
            err,
            SupplyError::SupplyExhausted {
                requested: 3,
                remaining: 2
            }
        ));
        // Nothing minted, nothing recorded.
        assert_eq!(supply, before);
    }

    #[test]
    fn batch_mint_respects_the_batch_limit() {
        let mut supply = ledger();
        let alice = acct("alice");
        let uris: Vec<String> = (0..6).map(|i| format!("ipfs://{i}")).collect();
        let err = supply.mint_batch(&alice, &alice, uris).unwrap_err();
        assert!(matches!(
            err,
            SupplyError::BatchTooLarge {
                requested: 6,
                max: 5
            }
        ));
    }

    #[test]
    fn batch_mint_returns_one_id_per_uri() {
        let mut supply = ledger();
        let alice = acct("alice");
        let uris: Vec<String> = (0..4).map(|i| format!("ipfs://{i}")).collect();
        let ids = supply.mint_batch(&alice, &alice, uris).unwrap();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        for id in ids {
            assert_eq!(supply.owner_of(id).unwrap(), "alice");
            assert_eq!(supply.token_uri(id).unwrap(), format!("ipfs://{id}"));
        }
    }

    #[test]
    fn base_uri_suffix_is_the_token_id() {
        let mut supply = ledger();
        let alice = acct("alice");
        supply.mint_single(&alice, &alice, "ipfs://first").unwrap();
        supply.mint_single(&alice, &alice, "ipfs://second").unwrap();

        let ids = supply
            .mint_batch_with_base_uri(&alice, &alice, 3, "https://meta.example/")
            .unwrap();
        assert_eq!(ids, vec![2, 3, 4]);
        for id in ids {
            assert_eq!(
                supply.token_uri(id).unwrap(),
                format!("https://meta.example/{id}")
            );
        }
    }

    #[test]
    fn unminted_ids_are_rejected() {
        let supply = ledger();
        assert!(matches!(
            supply.owner_of(7),
            Err(SupplyError::NonexistentToken { token_id: 7 })
        ));
        assert!(matches!(
            supply.token_uri(7),
            Err(SupplyError::NonexistentToken { token_id: 7 })
        ));
    }

    #[test]
    fn owner_can_transfer_directly() {
        let mut supply = ledger();
        let (alice, bob) = (acct("alice"), acct("bob"));
        supply.mint_single(&alice, &alice, "ipfs://t").unwrap();
        supply.transfer(&alice, &alice, &bob, 0).unwrap();
        assert_eq!(supply.owner_of(0).unwrap(), "bob");
    }

    #[test]
    fn approved_operator_can_transfer_until_revoked() {
        let mut supply = ledger();
        let (alice, bob, market) = (acct("alice"), acct("bob"), acct("market"));
        supply.mint_single(&alice, &alice, "ipfs://t").unwrap();

        assert!(!supply.is_approved_for_all(&alice, &market));
        let err = supply.transfer(&market, &alice, &bob, 0).unwrap_err();
        assert!(matches!(err, SupplyError::NotOwnerOrApproved { .. }));

        supply.set_approval_for_all(&alice, &market, true);
        assert!(supply.is_approved_for_all(&alice, &market));
        supply.transfer(&market, &alice, &bob, 0).unwrap();
        assert_eq!(supply.owner_of(0).unwrap(), "bob");

        supply.set_approval_for_all(&bob, &market, true);
        supply.set_approval_for_all(&bob, &market, false);
        let err = supply.transfer(&market, &bob, &alice, 0).unwrap_err();
        assert!(matches!(err, SupplyError::NotOwnerOrApproved { .. }));
        assert_eq!(supply.owner_of(0).unwrap(), "bob");
    }

    #[test]
    fn transfer_from_non_owner_is_rejected() {
        let mut supply = ledger();
        let (alice, bob, carol) = (acct("alice"), acct("bob"), acct("carol"));
        supply.mint_single(&alice, &alice, "ipfs://t").unwrap();
        // bob is not the owner, even though he names himself as `from`.
        let err = supply.transfer(&bob, &bob, &carol, 0).unwrap_err();
        assert!(matches!(err, SupplyError::NotOwnerOrApproved { .. }));
        assert_eq!(supply.owner_of(0).unwrap(), "alice");
    }

    #[test]
    fn failed_calls_leave_state_untouched() {
        let mut supply = SupplyLedger::new("nft-main", 2, 1);
        let alice = acct("alice");
        supply.mint_single(&alice, &alice, "ipfs://t").unwrap();

        let before = supply.clone();
        let uris = vec!["ipfs://a".to_string(), "ipfs://b".to_string()];
        assert!(supply.mint_batch(&alice, &alice, uris).is_err());
        assert!(supply
            .transfer(&acct("mallory"), &alice, &acct("mallory"), 0)
            .is_err());
        assert!(supply.mint_batch_with_base_uri(&alice, &alice, 2, "x/").is_err());
        assert_eq!(supply, before);
    }

    #[test]
    fn mints_and_transfers_are_recorded_as_events() {
        let mut supply = ledger();
        let (alice, bob) = (acct("alice"), acct("bob"));
        supply.mint_single(&alice, &alice, "ipfs://t").unwrap();
        supply.set_approval_for_all(&alice, &bob, true);
        supply.transfer(&bob, &alice, &bob, 0).unwrap();

        assert_eq!(supply.events().len(), 3);
        assert!(matches!(
            &supply.events()[0],
            SupplyEvent::Minted { token_id: 0, .. }
        ));
        assert!(matches!(
            &supply.events()[2],
            SupplyEvent::Transferred { token_id: 0, .. }
        ));
    }
}
