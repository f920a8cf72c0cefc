//! `nftm`: command-line client for the NFTM marketplace ledgers.
//!
//! Every invocation loads the state file, performs one ledger call as
//! `--caller`, prints the result, and persists the state back under a
//! fresh digest. Composed metadata documents are pinned into a local
//! content-addressed store before minting.

mod state;
mod store;

use std::path::PathBuf;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};

use nftm_core::{
    digest, AccountId, ListingStatus, Marketplace, SupplyLedger, TokenAttribute, TokenMetadata,
    DEFAULT_FEE_BPS, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_SUPPLY,
};

#[derive(Parser)]
#[command(name = "nftm", version, about = "Client for the NFTM marketplace ledgers")]
struct Cli {
    /// Marketplace state file.
    #[arg(long, global = true, default_value = "nftm-state.json")]
    state: PathBuf,
    /// Directory of the content-addressed metadata store.
    #[arg(long, global = true, default_value = "nftm-store")]
    store: PathBuf,
    /// Authenticated account performing the call.
    #[arg(long, global = true)]
    caller: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a fresh marketplace state file.
    Init {
        /// Marketplace identity that sellers approve as operator.
        #[arg(long, default_value = "market")]
        market_id: String,
        /// Account allowed to withdraw accumulated fees.
        #[arg(long)]
        owner: String,
        /// Marketplace fee in basis points (250 = 2.5 %).
        #[arg(long, default_value_t = DEFAULT_FEE_BPS)]
        fee_bps: u64,
    },
    /// Register a token collection.
    CreateCollection {
        collection: String,
        #[arg(long, default_value_t = DEFAULT_MAX_SUPPLY)]
        max_supply: u64,
        #[arg(long, default_value_t = DEFAULT_MAX_BATCH_SIZE)]
        max_batch_size: usize,
    },
    /// Mint one token. Metadata comes from --uri, or is composed from
    /// --name/--description/--image and pinned into the local store.
    Mint {
        collection: String,
        /// Recipient; defaults to the caller.
        #[arg(long)]
        to: Option<String>,
        /// Already-pinned metadata URI.
        #[arg(long, conflicts_with_all = ["name", "description", "image", "attr"])]
        uri: Option<String>,
        #[arg(long, required_unless_present = "uri")]
        name: Option<String>,
        #[arg(long, required_unless_present = "uri")]
        description: Option<String>,
        /// Image URL recorded in the composed document.
        #[arg(long, required_unless_present = "uri")]
        image: Option<String>,
        /// Extra attribute as TRAIT=VALUE; repeatable.
        #[arg(long = "attr", value_name = "TRAIT=VALUE")]
        attr: Vec<String>,
    },
    /// Mint one token per --uri, all or nothing.
    MintBatch {
        collection: String,
        /// Recipient; defaults to the caller.
        #[arg(long)]
        to: Option<String>,
        #[arg(long = "uri", required = true)]
        uris: Vec<String>,
    },
    /// Mint a batch whose metadata URIs are the base URI + token id.
    MintBaseUri {
        collection: String,
        quantity: u64,
        base_uri: String,
        /// Recipient; defaults to the caller.
        #[arg(long)]
        to: Option<String>,
    },
    /// Grant (or revoke) an operator's right to move the caller's tokens.
    Approve {
        collection: String,
        /// Operator account; defaults to the marketplace operator.
        operator: Option<String>,
        #[arg(long)]
        revoke: bool,
    },
    /// Transfer a token; the caller must be the owner or an approved
    /// operator.
    Transfer {
        collection: String,
        token_id: u64,
        to: String,
        /// Current owner; defaults to the caller.
        #[arg(long)]
        from: Option<String>,
    },
    /// List a token for sale.
    List {
        collection: String,
        token_id: u64,
        price: u64,
    },
    /// Buy an active listing with the given payment attached.
    Buy { listing_id: u64, amount: u64 },
    /// Cancel an active listing.
    Cancel { listing_id: u64 },
    /// Change the price of an active listing.
    UpdatePrice { listing_id: u64, new_price: u64 },
    /// Withdraw the accumulated marketplace fees (owner only).
    WithdrawFees,
    /// Show one token: owner, URI, and the pinned document if available.
    Token { collection: String, token_id: u64 },
    /// Show one listing.
    Listing { listing_id: u64 },
    /// Show all active listings.
    Listings,
    /// Show every listing a seller ever created; defaults to the caller.
    MyListings {
        #[arg(long)]
        seller: Option<String>,
    },
    /// Show marketplace and collection statistics.
    Stats,
    /// Recompute the state digest and compare it with the stored one.
    Verify,
}

type CliError = Box<dyn std::error::Error>;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        state: state_path,
        store: store_dir,
        caller,
        command,
    } = cli;

    match command {
        Command::Init {
            market_id,
            owner,
            fee_bps,
        } => {
            let marketplace = Marketplace::new(market_id.clone(), owner.clone(), fee_bps);
            state::create(&state_path, &marketplace)?;
            println!(
                "initialized {} (operator {market_id}, owner {owner}, fee {fee_bps} bp)",
                state_path.display()
            );
        }
        Command::CreateCollection {
            collection,
            max_supply,
            max_batch_size,
        } => {
            let mut marketplace = state::load(&state_path)?;
            marketplace.register_collection(SupplyLedger::new(
                collection.clone(),
                max_supply,
                max_batch_size,
            ))?;
            state::save(&state_path, &marketplace)?;
            println!(
                "registered collection {collection} (max supply {max_supply}, max batch {max_batch_size})"
            );
        }
        Command::Mint {
            collection,
            to,
            uri,
            name,
            description,
            image,
            attr,
        } => {
            let caller = require_caller(&caller)?;
            let mut marketplace = state::load(&state_path)?;
            let metadata_uri = match uri {
                Some(uri) => uri,
                None => {
                    let document = compose_document(name, description, image, &attr, &caller)?;
                    store::put(&store_dir, &document)?
                }
            };
            let to = to.unwrap_or_else(|| caller.clone());
            let token_id = marketplace
                .collection_mut(&collection)?
                .mint_single(&caller, &to, metadata_uri.clone())?;
            state::save(&state_path, &marketplace)?;
            println!("minted token {token_id} in {collection} to {to} ({metadata_uri})");
        }
        Command::MintBatch {
            collection,
            to,
            uris,
        } => {
            let caller = require_caller(&caller)?;
            let mut marketplace = state::load(&state_path)?;
            let to = to.unwrap_or_else(|| caller.clone());
            let token_ids = marketplace
                .collection_mut(&collection)?
                .mint_batch(&caller, &to, uris)?;
            state::save(&state_path, &marketplace)?;
            println!(
                "minted {} token(s) in {collection} to {to}: {token_ids:?}",
                token_ids.len()
            );
        }
        Command::MintBaseUri {
            collection,
            quantity,
            base_uri,
            to,
        } => {
            let caller = require_caller(&caller)?;
            let mut marketplace = state::load(&state_path)?;
            let to = to.unwrap_or_else(|| caller.clone());
            let token_ids = marketplace
                .collection_mut(&collection)?
                .mint_batch_with_base_uri(&caller, &to, quantity, &base_uri)?;
            state::save(&state_path, &marketplace)?;
            println!(
                "minted {} token(s) in {collection} to {to}: {token_ids:?}",
                token_ids.len()
            );
        }
        Command::Approve {
            collection,
            operator,
            revoke,
        } => {
            let caller = require_caller(&caller)?;
            let mut marketplace = state::load(&state_path)?;
            let operator = operator.unwrap_or_else(|| marketplace.listings().operator().clone());
            let approved = !revoke;
            marketplace
                .collection_mut(&collection)?
                .set_approval_for_all(&caller, &operator, approved);
            state::save(&state_path, &marketplace)?;
            if approved {
                println!("approved {operator} to manage {caller}'s tokens in {collection}");
            } else {
                println!("revoked {operator}'s approval over {caller}'s tokens in {collection}");
            }
        }
        Command::Transfer {
            collection,
            token_id,
            to,
            from,
        } => {
            let caller = require_caller(&caller)?;
            let mut marketplace = state::load(&state_path)?;
            let from = from.unwrap_or_else(|| caller.clone());
            marketplace
                .collection_mut(&collection)?
                .transfer(&caller, &from, &to, token_id)?;
            state::save(&state_path, &marketplace)?;
            println!("transferred token {token_id} in {collection} from {from} to {to}");
        }
        Command::List {
            collection,
            token_id,
            price,
        } => {
            let caller = require_caller(&caller)?;
            let mut marketplace = state::load(&state_path)?;
            let listing_id = marketplace.list_nft(&caller, &collection, token_id, price, now())?;
            state::save(&state_path, &marketplace)?;
            println!("listed token {token_id} in {collection} at {price} (listing {listing_id})");
        }
        Command::Buy { listing_id, amount } => {
            let caller = require_caller(&caller)?;
            let mut marketplace = state::load(&state_path)?;
            let receipt = marketplace.buy_nft(&caller, listing_id, amount)?;
            state::save(&state_path, &marketplace)?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
        Command::Cancel { listing_id } => {
            let caller = require_caller(&caller)?;
            let mut marketplace = state::load(&state_path)?;
            marketplace.cancel_listing(&caller, listing_id)?;
            state::save(&state_path, &marketplace)?;
            println!("cancelled listing {listing_id}");
        }
        Command::UpdatePrice {
            listing_id,
            new_price,
        } => {
            let caller = require_caller(&caller)?;
            let mut marketplace = state::load(&state_path)?;
            marketplace.update_price(&caller, listing_id, new_price)?;
            state::save(&state_path, &marketplace)?;
            println!("listing {listing_id} price is now {new_price}");
        }
        Command::WithdrawFees => {
            let caller = require_caller(&caller)?;
            let mut marketplace = state::load(&state_path)?;
            let amount = marketplace.withdraw_fees(&caller)?;
            state::save(&state_path, &marketplace)?;
            println!("withdrew {amount} in fees to {caller}");
        }
        Command::Token {
            collection,
            token_id,
        } => {
            let marketplace = state::load(&state_path)?;
            let supply = marketplace.collection(&collection)?;
            let owner = supply.owner_of(token_id)?;
            let uri = supply.token_uri(token_id)?;
            println!("token {token_id} in {collection}");
            println!("  owner: {owner}");
            println!("  metadata: {uri}");
            if uri.starts_with(store::URI_SCHEME) {
                match store::get(&store_dir, uri) {
                    Ok(document) => println!("{}", serde_json::to_string_pretty(&document)?),
                    Err(err) => eprintln!("warning: {err}"),
                }
            }
        }
        Command::Listing { listing_id } => {
            let marketplace = state::load(&state_path)?;
            let listing = marketplace.listings().listing(listing_id)?;
            println!("{}", serde_json::to_string_pretty(listing)?);
        }
        Command::Listings => {
            let marketplace = state::load(&state_path)?;
            let active = marketplace.listings().active_listings();
            if active.is_empty() {
                println!("no active listings");
            }
            for listing_id in active {
                let listing = marketplace.listings().listing(listing_id)?;
                println!(
                    "#{listing_id}: token {} in {} by {} at {}",
                    listing.token_id, listing.nft_contract, listing.seller, listing.price
                );
            }
        }
        Command::MyListings { seller } => {
            let seller = match seller {
                Some(seller) => seller,
                None => require_caller(&caller)?,
            };
            let marketplace = state::load(&state_path)?;
            let ids = marketplace.listings().seller_listings(&seller);
            if ids.is_empty() {
                println!("no listings by {seller}");
            }
            for listing_id in ids {
                let listing = marketplace.listings().listing(listing_id)?;
                println!(
                    "#{listing_id}: token {} in {} at {} [{}]",
                    listing.token_id,
                    listing.nft_contract,
                    listing.price,
                    status_label(listing.status)
                );
            }
        }
        Command::Stats => {
            let marketplace = state::load(&state_path)?;
            let listings = marketplace.listings();
            println!("marketplace");
            println!("  total listings: {}", listings.total_listings());
            println!("  active listings: {}", listings.active_listings().len());
            println!("  fee: {} bp", listings.fee_bps());
            println!("  fees balance: {}", listings.fees_balance());
            for supply in marketplace.collections() {
                println!("collection {}", supply.collection_id());
                println!(
                    "  minted: {} / {} ({} remaining)",
                    supply.total_minted(),
                    supply.max_supply(),
                    supply.remaining_supply()
                );
                println!("  max batch: {}", supply.max_batch_size());
            }
        }
        Command::Verify => {
            // `load` already recomputes and compares the digest.
            let marketplace = state::load(&state_path)?;
            println!("state digest ok: {}", digest::to_hex(&marketplace.state_digest()));
        }
    }
    Ok(())
}

fn require_caller(caller: &Option<String>) -> Result<AccountId, CliError> {
    caller
        .clone()
        .ok_or_else(|| CliError::from("this command requires --caller <account>"))
}

fn compose_document(
    name: Option<String>,
    description: Option<String>,
    image: Option<String>,
    attrs: &[String],
    creator: &str,
) -> Result<TokenMetadata, CliError> {
    let (Some(name), Some(description), Some(image)) = (name, description, image) else {
        return Err("provide --uri, or --name, --description and --image".into());
    };
    let mut attributes = vec![TokenAttribute::new("Creator", creator)];
    for raw in attrs {
        let Some((trait_type, value)) = raw.split_once('=') else {
            return Err(format!("bad --attr {raw:?}, expected TRAIT=VALUE").into());
        };
        attributes.push(TokenAttribute::new(trait_type, value));
    }
    Ok(TokenMetadata {
        name,
        description,
        image,
        attributes,
    })
}

fn status_label(status: ListingStatus) -> &'static str {
    match status {
        ListingStatus::Active => "active",
        ListingStatus::Sold => "sold",
        ListingStatus::Cancelled => "cancelled",
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_arguments_are_parsed() {
        let document = compose_document(
            Some("Sunset #1".into()),
            Some("desc".into()),
            Some("https://img.example/1.png".into()),
            &["Edition=1 of 5".to_string()],
            "alice",
        )
        .unwrap();
        assert_eq!(document.attributes.len(), 2);
        assert_eq!(document.attributes[0].trait_type, "Creator");
        assert_eq!(document.attributes[1].trait_type, "Edition");
    }

    #[test]
    fn malformed_attributes_are_rejected() {
        let err = compose_document(
            Some("n".into()),
            Some("d".into()),
            Some("i".into()),
            &["no-equals".to_string()],
            "alice",
        )
        .unwrap_err();
        assert!(err.to_string().contains("TRAIT=VALUE"));
    }
}
