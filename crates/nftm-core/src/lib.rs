//! Core ledgers for the NFTM marketplace.
//!
//! Two deterministic state machines sit at the centre of the system:
//!
//! * [`supply`] — the capped sequential minting ledger: token identity,
//!   ownership, metadata URIs, and operator approvals for one collection.
//! * [`listing`] — the marketplace listing ledger: fixed-price offers,
//!   the fee split on every sale, and the accumulated-fee account.
//!
//! [`marketplace`] pairs the two behind a collection registry, and
//! [`digest`] commits the whole state to a single SHA-256 merkle root so
//! embedders can detect corrupted snapshots. [`metadata`] models the
//! off-chain JSON documents that token URIs resolve to; the ledgers
//! themselves never interpret a URI.
//!
//! Every mutating operation takes the authenticated caller explicitly and
//! runs as one all-or-nothing transition: a call that fails any validation
//! leaves every queryable value exactly as it was. The types are plain
//! owned data; embedders running ledger calls from several threads
//! serialize them behind a single mutex.

pub mod digest;
pub mod listing;
pub mod marketplace;
pub mod metadata;
pub mod supply;

/// Opaque authenticated principal. Signature checking belongs to the
/// execution environment, never to the ledgers.
pub type AccountId = String;
/// Reference to one token collection.
pub type CollectionId = String;
pub type TokenId = u64;
pub type ListingId = u64;
/// Payment amount in the smallest currency unit.
pub type Amount = u64;

/// Basis-point denominator: 10 000 = 100 %.
pub const FEE_DENOMINATOR: u64 = 10_000;

/// Defaults mirroring the reference deployment.
pub const DEFAULT_MAX_SUPPLY: u64 = 10_000;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 20;
pub const DEFAULT_FEE_BPS: u64 = 250;

pub use listing::{
    Listing, ListingError, ListingEvent, ListingLedger, ListingStatus, PurchaseReceipt,
};
pub use marketplace::{MarketError, Marketplace};
pub use metadata::{AttributeValue, TokenAttribute, TokenMetadata};
pub use supply::{SupplyError, SupplyEvent, SupplyLedger};
