//! CLI commands for the transaction core
//!
//! Offline tooling around the lifecycle: fee lookups, the exception table,
//! transaction inspection and co-signing.

use crate::config::ProtocolConstants;
use crate::core::{Account, MemoryAccountStore, MultisignatureAsset, Transaction, TransactionType};
use crate::crypto::KeyPair;
use crate::exceptions::{historical_registry, ExceptionPoint, HISTORICAL_EXCEPTIONS};
use crate::logic::TransactionTypeRegistry;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Shared state for every command
pub struct AppState {
    pub constants: ProtocolConstants,
    pub registry: TransactionTypeRegistry,
}

impl AppState {
    /// Load constants from `config` and wire the built-in types
    pub fn new(config: &Path) -> CliResult<Self> {
        let constants = ProtocolConstants::load(config)?;
        let registry = TransactionTypeRegistry::with_builtin_types(
            &constants,
            Arc::new(MemoryAccountStore::new()),
        );
        Ok(Self {
            constants,
            registry,
        })
    }
}

fn read_transaction(path: &Path) -> CliResult<Transaction> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write the default constants to `output`
pub fn cmd_config_init(output: &Path) -> CliResult<()> {
    if output.exists() {
        println!("⚠️  {:?} already exists, leaving it untouched", output);
        return Ok(());
    }
    ProtocolConstants::default().save(output)?;
    println!("✅ Default constants written to {:?}", output);
    Ok(())
}

/// Show the fee for a transaction type
pub fn cmd_fee(state: &AppState, tx_type: &str, height: u64, members: usize) -> CliResult<()> {
    let tx_type =
        TransactionType::parse(tx_type).ok_or_else(|| format!("Unknown transaction type {}", tx_type))?;

    let mut tx = Transaction::new(tx_type, "", 0);
    if tx_type == TransactionType::Multi {
        tx.asset.multisignature = Some(MultisignatureAsset {
            min: 1,
            lifetime: 1,
            keysgroup: vec![String::new(); members],
            signatures: None,
        });
    }

    let handler = state.registry.dispatch(tx_type)?;
    let fee = handler.calculate_fee(&tx, &Account::default(), height);
    println!("💰 Fee for {} at height {}: {}", tx_type, height, fee);
    Ok(())
}

/// List the registered exception handlers
pub fn cmd_exceptions() -> CliResult<()> {
    let registry = historical_registry();
    println!("📜 Exception handlers ({} registered)", registry.len());
    for point in ExceptionPoint::ALL {
        println!("\n   {}:", point);
        for (name, handler) in registry.handlers(point) {
            println!("   └─ {} -> {}", name, handler.target().id);
        }
    }

    println!("\n   Historical transactions:");
    for exception in &HISTORICAL_EXCEPTIONS {
        println!(
            "   └─ {} at height {} (sender {})",
            exception.id, exception.height, exception.sender_public_key
        );
    }
    Ok(())
}

/// Decode a transaction file and show its derived values
pub fn cmd_inspect(state: &AppState, path: &Path) -> CliResult<()> {
    let tx = read_transaction(path)?;
    let handler = state.registry.dispatch(tx.tx_type)?;

    println!("🔍 Transaction");
    println!("   Type:        {} ({})", tx.tx_type, tx.tx_type.as_u8());
    println!("   Sender:      {}", tx.sender_address()?);
    println!("   Id (stored): {}", if tx.id.is_empty() { "-" } else { tx.id.as_str() });
    println!("   Id (derived): {}", state.registry.get_id(&tx)?);
    println!(
        "   Digest:      {}",
        hex::encode(state.registry.signing_digest(&tx)?)
    );
    println!(
        "   Bytes:       {}",
        hex::encode(state.registry.get_bytes(&tx, false, false)?)
    );
    println!("   Co-signatures: {}", tx.signature_count());

    match handler.object_normalize(tx) {
        Ok(_) => println!("   ✅ Asset is well formed"),
        Err(e) => println!("   ❌ {}", e),
    }
    Ok(())
}

/// Generate a key pair
pub fn cmd_keygen() -> CliResult<()> {
    let kp = KeyPair::generate();
    println!("🔑 New key pair");
    println!("   Address:     {}", kp.address());
    println!("   Public key:  {}", kp.public_key_hex());
    println!("   Private key: {}", kp.private_key_hex());
    Ok(())
}

/// Produce a co-signer signature for a transaction file
pub fn cmd_sign(state: &AppState, path: &Path, private_key: &str) -> CliResult<()> {
    let tx = read_transaction(path)?;
    let kp = KeyPair::from_private_key_hex(private_key)?;
    let signature = state.registry.sign(&tx, &kp)?;
    println!("✍️  Signature by {}", kp.public_key_hex());
    println!("   {}", signature);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_commands_run_on_defaults() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("constants.json");
        cmd_config_init(&config).unwrap();
        assert!(config.exists());

        let state = AppState::new(&config).unwrap();
        cmd_fee(&state, "multisignature", 1, 3).unwrap();
        assert!(cmd_fee(&state, "vote", 1, 0).is_err());
        cmd_exceptions().unwrap();
        cmd_keygen().unwrap();
    }

    #[test]
    fn test_inspect_and_sign() {
        let dir = tempdir().unwrap();
        let state = AppState::new(&dir.path().join("absent.json")).unwrap();

        let owner = KeyPair::generate();
        let mut tx = Transaction::new(TransactionType::Send, &owner.public_key_hex(), 1);
        tx.amount = 5;
        tx.recipient_id = Some("1R".to_string());
        let path = dir.path().join("tx.json");
        fs::write(&path, serde_json::to_string(&tx).unwrap()).unwrap();

        cmd_inspect(&state, &path).unwrap();
        cmd_sign(&state, &path, &KeyPair::generate().private_key_hex()).unwrap();
        assert!(cmd_sign(&state, &path, "zz").is_err());
    }
}
