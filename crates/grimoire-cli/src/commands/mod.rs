//! Command implementations and the helpers they share.

pub mod backfill;
pub mod canonicalize;
pub mod collisions;
pub mod gc;
pub mod import;
pub mod parse;
pub mod preview;
pub mod recompute;
pub mod verify;

use grimoire_canonical::SpellSchema;
use grimoire_store::{RecordStore, StoreOptions, Vault, VaultConfig};
use serde_json::Value;
use std::error::Error;
use std::io::{self, Read};

type CmdResult<T> = Result<T, Box<dyn Error>>;

/// Loads the schema from `path`, or the built-in one.
fn load_schema(path: Option<String>) -> CmdResult<SpellSchema> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| format!("Failed to read schema {}: {}", path, e))?;
            Ok(SpellSchema::from_json(&text).map_err(|e| format!("Invalid schema: {}", e))?)
        }
        None => Ok(SpellSchema::builtin()?),
    }
}

/// Reads JSON from a file or stdin.
fn read_json(input: Option<String>) -> CmdResult<Value> {
    let json_str = if let Some(path) = input {
        std::fs::read_to_string(&path).map_err(|e| format!("Failed to read file {}: {}", path, e))?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };
    Ok(serde_json::from_str(&json_str).map_err(|e| format!("Invalid JSON: {}", e))?)
}

fn open_store(path: &str) -> CmdResult<RecordStore> {
    let store = RecordStore::open(path, StoreOptions::default())
        .map_err(|e| format!("Failed to open store {}: {}", path, e))?;
    Ok(store)
}

fn open_vault(root: Option<String>) -> CmdResult<Option<Vault>> {
    let Some(root) = root else {
        return Ok(None);
    };
    let vault = Vault::open(VaultConfig::new(&root))
        .map_err(|e| format!("Failed to open vault {}: {}", root, e))?;
    Ok(Some(vault))
}
