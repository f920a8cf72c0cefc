//! Persistent CLI state.
//!
//! One JSON document holds the whole marketplace, stored next to its state
//! merkle root. `load` recomputes the root and refuses a file whose digest
//! no longer matches, so a corrupted or hand-edited state is surfaced
//! instead of silently trusted.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use nftm_core::{digest, Marketplace};

pub const STATE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StateFile {
    version: u32,
    digest: String,
    marketplace: Marketplace,
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("no state file at {path}, run `nftm init` first")]
    Missing { path: String },
    #[error("state file {path} already exists")]
    Exists { path: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("state file {path} is not valid JSON: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("state file version {found} is not supported (expected {})", STATE_VERSION)]
    Version { found: u32 },
    #[error("state digest mismatch (stored {stored}, recomputed {computed}), refusing to load")]
    DigestMismatch { stored: String, computed: String },
}

pub fn load(path: &Path) -> Result<Marketplace, StateError> {
    let raw = std::fs::read(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            StateError::Missing {
                path: path.display().to_string(),
            }
        } else {
            StateError::Read {
                path: path.display().to_string(),
                source,
            }
        }
    })?;
    let file: StateFile = serde_json::from_slice(&raw).map_err(|source| StateError::Malformed {
        path: path.display().to_string(),
        source,
    })?;
    if file.version != STATE_VERSION {
        return Err(StateError::Version {
            found: file.version,
        });
    }
    let computed = digest::to_hex(&file.marketplace.state_digest());
    if computed != file.digest {
        return Err(StateError::DigestMismatch {
            stored: file.digest,
            computed,
        });
    }
    Ok(file.marketplace)
}

pub fn save(path: &Path, marketplace: &Marketplace) -> Result<(), StateError> {
    let file = StateFile {
        version: STATE_VERSION,
        digest: digest::to_hex(&marketplace.state_digest()),
        marketplace: marketplace.clone(),
    };
    let encoded = serde_json::to_vec_pretty(&file).map_err(|source| StateError::Malformed {
        path: path.display().to_string(),
        source,
    })?;
    std::fs::write(path, encoded).map_err(|source| StateError::Write {
        path: path.display().to_string(),
        source,
    })
}

/// `save`, but refuses to clobber an existing state file.
pub fn create(path: &Path, marketplace: &Marketplace) -> Result<(), StateError> {
    if path.exists() {
        return Err(StateError::Exists {
            path: path.display().to_string(),
        });
    }
    save(path, marketplace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("nftm-state-{}-{name}.json", std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn sample() -> Marketplace {
        let mut marketplace = Marketplace::new("market", "treasury", 250);
        marketplace
            .register_collection(nftm_core::SupplyLedger::new("nft-main", 10, 5))
            .unwrap();
        marketplace
    }

    #[test]
    fn state_survives_a_round_trip() {
        let path = scratch("roundtrip");
        let marketplace = sample();
        save(&path, &marketplace).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, marketplace);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_reported_as_such() {
        let path = scratch("missing");
        assert!(matches!(load(&path), Err(StateError::Missing { .. })));
    }

    #[test]
    fn tampered_state_is_refused() {
        let path = scratch("tampered");
        let marketplace = sample();
        let file = StateFile {
            version: STATE_VERSION,
            digest: "0".repeat(64),
            marketplace,
        };
        std::fs::write(&path, serde_json::to_vec(&file).unwrap()).unwrap();
        assert!(matches!(
            load(&path),
            Err(StateError::DigestMismatch { .. })
        ));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unknown_versions_are_refused() {
        let path = scratch("version");
        let marketplace = sample();
        let file = StateFile {
            version: STATE_VERSION + 1,
            digest: digest::to_hex(&marketplace.state_digest()),
            marketplace,
        };
        std::fs::write(&path, serde_json::to_vec(&file).unwrap()).unwrap();
        assert!(matches!(
            load(&path),
            Err(StateError::Version { found }) if found == STATE_VERSION + 1
        ));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn create_refuses_to_clobber() {
        let path = scratch("clobber");
        let marketplace = sample();
        create(&path, &marketplace).unwrap();
        assert!(matches!(
            create(&path, &marketplace),
            Err(StateError::Exists { .. })
        ));
        std::fs::remove_file(&path).unwrap();
    }
}
