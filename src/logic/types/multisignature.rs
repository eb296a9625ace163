//! Multisignature group registration
//!
//! A registration turns the sender into a multisig account. Every key in
//! the group has to co-sign the registration itself before it is ready;
//! afterwards transactions from the account need `min` co-signatures.

use crate::config::MultisigConstraints;
use crate::core::{
    strip_marker, Account, Asset, ConfirmedTransaction, FeeSchedule, MultisignatureAsset,
    SignedBlock, Transaction, TransactionError, TransactionType,
};
use crate::logic::lifecycle::{
    threshold_ready, AssetReader, DbSaveDescriptor, RawRow, TransactionLifecycle,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

const TABLE: &str = "multisignatures";
const FIELDS: [&str; 4] = ["min", "lifetime", "keysgroup", "transactionId"];
/// Column prefix used when the asset is joined onto a transaction row
const JOIN_PREFIX: &str = "m_";

fn invalid(message: &str) -> TransactionError {
    TransactionError::InvalidAsset(message.to_string())
}

fn asset(tx: &Transaction) -> Result<&MultisignatureAsset, TransactionError> {
    tx.asset
        .multisignature
        .as_ref()
        .ok_or_else(|| invalid("Invalid transaction asset"))
}

/// Which pair of group fields a state change targets
#[derive(Clone, Copy)]
enum Ledger {
    Confirmed,
    Unconfirmed,
}

struct GroupFields<'a> {
    keys: &'a mut Option<Vec<String>>,
    min: &'a mut u32,
    lifetime: &'a mut u32,
}

fn fields(account: &mut Account, ledger: Ledger) -> GroupFields<'_> {
    match ledger {
        Ledger::Confirmed => GroupFields {
            keys: &mut account.multisignatures,
            min: &mut account.multimin,
            lifetime: &mut account.multilifetime,
        },
        Ledger::Unconfirmed => GroupFields {
            keys: &mut account.u_multisignatures,
            min: &mut account.u_multimin,
            lifetime: &mut account.u_multilifetime,
        },
    }
}

/// Merge a keysgroup into an account. `forward` applies the `+`/`-`
/// operations as written, otherwise their inverse.
fn merge_group(
    account: &mut Account,
    asset: &MultisignatureAsset,
    ledger: Ledger,
    forward: bool,
) -> Result<(), TransactionError> {
    let address = account.address.clone();
    let group = fields(account, ledger);

    let (min, lifetime) = if forward {
        (
            group.min.checked_add(asset.min),
            group.lifetime.checked_add(asset.lifetime),
        )
    } else {
        (
            group.min.checked_sub(asset.min),
            group.lifetime.checked_sub(asset.lifetime),
        )
    };
    let (Some(min), Some(lifetime)) = (min, lifetime) else {
        return Err(TransactionError::InvalidTransaction(format!(
            "Multisignature settings of {} out of range",
            address
        )));
    };

    let mut keys = group.keys.take().unwrap_or_default();
    for entry in &asset.keysgroup {
        let key = strip_marker(entry).to_string();
        let adding = entry.starts_with('+') == forward;
        if adding {
            if !keys.contains(&key) {
                keys.push(key);
            }
        } else {
            keys.retain(|k| *k != key);
        }
    }

    *group.keys = if keys.is_empty() { None } else { Some(keys) };
    *group.min = min;
    *group.lifetime = lifetime;
    Ok(())
}

fn string_field<'a>(row: &'a RawRow, name: &str) -> Option<&'a str> {
    row.get(name).and_then(Value::as_str)
}

fn number_field(row: &RawRow, name: &str) -> Result<u32, TransactionError> {
    let value = match row.get(name) {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };
    value.ok_or_else(|| TransactionError::InvalidEncoding(format!("column {}", name)))
}

/// Parse a stored group, columns optionally prefixed
fn parse_row(row: &RawRow, prefix: &str) -> Result<Option<MultisignatureAsset>, TransactionError> {
    let Some(keysgroup) = string_field(row, &format!("{}keysgroup", prefix)) else {
        return Ok(None);
    };

    Ok(Some(MultisignatureAsset {
        min: number_field(row, &format!("{}min", prefix))?,
        lifetime: number_field(row, &format!("{}lifetime", prefix))?,
        keysgroup: keysgroup
            .split(',')
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        signatures: None,
    }))
}

pub struct MultisignatureTransaction {
    fees: FeeSchedule,
    constraints: MultisigConstraints,
}

impl MultisignatureTransaction {
    pub fn new(fees: FeeSchedule, constraints: MultisigConstraints) -> Self {
        Self { fees, constraints }
    }

    fn check_bounds(&self, asset: &MultisignatureAsset) -> Result<(), TransactionError> {
        let c = &self.constraints;
        if !c.min.range().contains(&asset.min) {
            return Err(invalid("Invalid multisignature min"));
        }
        if !c.lifetime.range().contains(&asset.lifetime) {
            return Err(invalid("Invalid multisignature lifetime"));
        }
        let count = asset.keysgroup.len();
        if count < c.keysgroup.min_items || count > c.keysgroup.max_items {
            return Err(invalid("Invalid multisignature keysgroup size"));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionLifecycle for MultisignatureTransaction {
    fn tx_type(&self) -> TransactionType {
        TransactionType::Multi
    }

    /// One base fee per group member plus one for the sender
    fn calculate_fee(&self, tx: &Transaction, _sender: &Account, height: u64) -> u64 {
        let members = tx
            .asset
            .multisignature
            .as_ref()
            .map_or(0, |a| a.keysgroup.len() as u64);
        (members + 1).saturating_mul(self.fees.fees_at(height).multisignature)
    }

    async fn verify(&self, tx: &Transaction, sender: &Account) -> Result<(), TransactionError> {
        let asset = asset(tx)?;
        self.check_bounds(asset)?;

        if asset.min as usize > asset.keysgroup.len() {
            return Err(invalid(
                "Invalid multisignature min. Must be less than or equal to keysgroup size",
            ));
        }
        if sender.is_multisig() {
            return Err(TransactionError::InvalidTransaction(
                "Account already has multisignatures enabled".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &asset.keysgroup {
            let Some(key) = entry.strip_prefix('+') else {
                return Err(invalid("Invalid math operator in multisignature keysgroup"));
            };
            if key == tx.sender_public_key {
                return Err(invalid(
                    "Invalid multisignature keysgroup. Can not contain sender",
                ));
            }
            if hex::decode(key).map_or(true, |bytes| bytes.is_empty()) {
                return Err(invalid("Invalid member in keysgroup"));
            }
            if !seen.insert(key) {
                return Err(invalid(
                    "Encountered duplicate public key in multisignature keysgroup",
                ));
            }
        }

        Ok(())
    }

    fn get_bytes(
        &self,
        tx: &Transaction,
        _skip_signature: bool,
        _skip_second_signature: bool,
    ) -> Result<Vec<u8>, TransactionError> {
        let asset = asset(tx)?;
        let min = u8::try_from(asset.min).map_err(|_| invalid("min does not fit a byte"))?;
        let lifetime =
            u8::try_from(asset.lifetime).map_err(|_| invalid("lifetime does not fit a byte"))?;

        let keys = asset.keysgroup.concat();
        let mut bytes = Vec::with_capacity(2 + keys.len());
        bytes.push(min);
        bytes.push(lifetime);
        bytes.extend_from_slice(keys.as_bytes());
        Ok(bytes)
    }

    async fn apply(
        &self,
        tx: &ConfirmedTransaction,
        block: &SignedBlock,
        sender: &mut Account,
    ) -> Result<(), TransactionError> {
        merge_group(sender, asset(&tx.transaction)?, Ledger::Confirmed, true)?;
        log::info!(
            "Account {} registered a multisignature group at height {}",
            sender.address,
            block.height
        );
        Ok(())
    }

    async fn apply_unconfirmed(
        &self,
        tx: &Transaction,
        sender: &mut Account,
    ) -> Result<(), TransactionError> {
        if sender.is_unconfirmed_multisig() {
            return Err(TransactionError::InvalidTransaction(
                "Signature on this account is pending confirmation".to_string(),
            ));
        }
        merge_group(sender, asset(tx)?, Ledger::Unconfirmed, true)
    }

    async fn undo(
        &self,
        tx: &ConfirmedTransaction,
        _block: &SignedBlock,
        sender: &mut Account,
    ) -> Result<(), TransactionError> {
        merge_group(sender, asset(&tx.transaction)?, Ledger::Confirmed, false)
    }

    async fn undo_unconfirmed(
        &self,
        tx: &Transaction,
        sender: &mut Account,
    ) -> Result<(), TransactionError> {
        merge_group(sender, asset(tx)?, Ledger::Unconfirmed, false)
    }

    fn object_normalize(&self, tx: Transaction) -> Result<Transaction, TransactionError> {
        let asset = asset(&tx)?;
        self.check_bounds(asset)?;

        let mut seen = HashSet::new();
        for entry in &asset.keysgroup {
            if entry.len() < 2 {
                return Err(invalid("Invalid member in keysgroup"));
            }
            if !seen.insert(entry.as_str()) {
                return Err(invalid("Keysgroup entries must be unique"));
            }
        }
        Ok(tx)
    }

    fn db_read(&self, raw: &RawRow) -> Result<Option<Asset>, TransactionError> {
        Ok(parse_row(raw, JOIN_PREFIX)?.map(|multisignature| Asset {
            multisignature: Some(multisignature),
        }))
    }

    fn db_save(
        &self,
        tx: &ConfirmedTransaction,
    ) -> Result<Option<DbSaveDescriptor>, TransactionError> {
        let asset = asset(&tx.transaction)?;
        let mut values = Map::new();
        values.insert("min".to_string(), json!(asset.min));
        values.insert("lifetime".to_string(), json!(asset.lifetime));
        values.insert("keysgroup".to_string(), json!(asset.keysgroup.join(",")));
        values.insert("transactionId".to_string(), json!(tx.transaction.id));

        Ok(Some(DbSaveDescriptor {
            table: TABLE,
            fields: FIELDS.to_vec(),
            values,
        }))
    }

    /// Fill in a missing asset from the group table
    async fn restore_asset(
        &self,
        mut tx: Transaction,
        reader: &dyn AssetReader,
    ) -> Result<Transaction, TransactionError> {
        if tx.asset.multisignature.is_some() {
            return Ok(tx);
        }
        let rows = reader.read_rows(TABLE, &tx.id).await?;
        let Some(row) = rows.first() else {
            return Err(invalid("Multisignature asset not found"));
        };
        tx.asset.multisignature = parse_row(row, "")?;
        Ok(tx)
    }

    /// Registration by a fresh account needs every group member
    fn ready(&self, tx: &Transaction, sender: &Account) -> bool {
        if sender.is_multisig() {
            return threshold_ready(tx, sender);
        }
        match (&tx.signatures, &tx.asset.multisignature) {
            (Some(signatures), Some(asset)) => signatures.len() == asset.keysgroup.len(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use std::sync::Mutex;

    fn key() -> String {
        KeyPair::generate().public_key_hex()
    }

    fn registration(sender_key: &str, keysgroup: Vec<String>, min: u32) -> Transaction {
        let mut tx = Transaction::new(TransactionType::Multi, sender_key, 0);
        tx.id = "42".to_string();
        tx.asset.multisignature = Some(MultisignatureAsset {
            min,
            lifetime: 24,
            keysgroup,
            signatures: None,
        });
        tx
    }

    fn handler() -> MultisignatureTransaction {
        MultisignatureTransaction::new(FeeSchedule::default(), MultisigConstraints::default())
    }

    fn confirmed(tx: Transaction) -> (ConfirmedTransaction, SignedBlock) {
        let block = SignedBlock::new("b1", 10, 0, "aa");
        let confirmed = ConfirmedTransaction {
            transaction: tx,
            block_id: block.id.clone(),
            height: block.height,
            sender_id: "1R".to_string(),
        };
        (confirmed, block)
    }

    #[test]
    fn test_fee_scales_with_group() {
        let tx = registration("aa", vec![format!("+{}", key()), format!("+{}", key())], 2);
        assert_eq!(handler().calculate_fee(&tx, &Account::new("1R"), 1), 300_000_000);
    }

    #[tokio::test]
    async fn test_verify_accepts_valid_group() {
        let sender = key();
        let tx = registration(&sender, vec![format!("+{}", key()), format!("+{}", key())], 2);
        assert!(handler().verify(&tx, &Account::new("1R")).await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_rejections() {
        let sender = key();
        let member = format!("+{}", key());
        let h = handler();
        let plain = Account::new("1R");

        let too_high = registration(&sender, vec![member.clone()], 2);
        assert!(h.verify(&too_high, &plain).await.is_err());

        let bad_operator = registration(&sender, vec![format!("-{}", key())], 1);
        assert!(h.verify(&bad_operator, &plain).await.is_err());

        let contains_sender = registration(&sender, vec![format!("+{}", sender)], 1);
        assert!(h.verify(&contains_sender, &plain).await.is_err());

        let duplicate = registration(&sender, vec![member.clone(), member.clone()], 1);
        assert!(h.verify(&duplicate, &plain).await.is_err());

        let already = Account::new("1R").with_multisignatures(vec![key()], 1, 24);
        let fine = registration(&sender, vec![member], 1);
        assert!(h.verify(&fine, &already).await.is_err());

        let missing = Transaction::new(TransactionType::Multi, &sender, 0);
        assert!(h.verify(&missing, &plain).await.is_err());
    }

    #[test]
    fn test_ready_for_fresh_account_needs_every_member() {
        let h = handler();
        let mut tx = registration("aa", vec!["+k1".into(), "+k2".into(), "+k3".into()], 2);
        let sender = Account::new("1R");

        assert!(!h.ready(&tx, &sender));
        tx.signatures = Some(vec![]);
        assert!(!h.ready(&tx, &sender));
        tx.push_signature("s1".into());
        tx.push_signature("s2".into());
        assert!(!h.ready(&tx, &sender));
        tx.push_signature("s3".into());
        assert!(h.ready(&tx, &sender));
    }

    #[test]
    fn test_ready_for_multisig_account_uses_threshold() {
        let h = handler();
        let sender = Account::new("1R").with_multisignatures(vec!["x".into(), "y".into()], 1, 24);
        let mut tx = registration("aa", vec!["+k1".into(), "+k2".into()], 2);
        tx.signatures = Some(vec!["s1".into()]);
        assert!(h.ready(&tx, &sender));
    }

    #[test]
    fn test_asset_bytes() {
        let tx = registration("aa", vec!["+ab".into(), "+cd".into()], 2);
        let bytes = handler().get_bytes(&tx, true, true).unwrap();
        assert_eq!(bytes, [&[2u8, 24][..], &b"+ab+cd"[..]].concat());
    }

    #[tokio::test]
    async fn test_apply_then_undo_restores_account() {
        let h = handler();
        let (k1, k2) = (key(), key());
        let tx = registration("aa", vec![format!("+{}", k1), format!("+{}", k2)], 2);
        let (confirmed, block) = confirmed(tx.clone());
        let original = Account::new("1R").with_balance(50);
        let mut account = original.clone();

        h.apply(&confirmed, &block, &mut account).await.unwrap();
        assert_eq!(account.multisignatures, Some(vec![k1.clone(), k2.clone()]));
        assert_eq!((account.multimin, account.multilifetime), (2, 24));
        assert!(account.u_multisignatures.is_none());

        h.undo(&confirmed, &block, &mut account).await.unwrap();
        assert_eq!(account, original);

        h.apply_unconfirmed(&tx, &mut account).await.unwrap();
        assert_eq!(account.u_multisignatures, Some(vec![k1, k2]));
        assert_eq!(account.u_multimin, 2);
        assert!(account.multisignatures.is_none());

        assert!(h.apply_unconfirmed(&tx, &mut account).await.is_err());

        h.undo_unconfirmed(&tx, &mut account).await.unwrap();
        assert_eq!(account, original);
    }

    #[test]
    fn test_normalize() {
        let h = handler();
        let tx = registration("aa", vec!["+ab".into()], 1);
        assert!(h.object_normalize(tx).is_ok());

        let empty = registration("aa", vec![], 1);
        assert!(h.object_normalize(empty).is_err());

        let lifetime = {
            let mut tx = registration("aa", vec!["+ab".into()], 1);
            tx.asset.multisignature.as_mut().unwrap().lifetime = 73;
            tx
        };
        assert!(h.object_normalize(lifetime).is_err());

        let stub = registration("aa", vec!["+".into()], 1);
        assert!(h.object_normalize(stub).is_err());
    }

    #[test]
    fn test_db_save_descriptor() {
        let tx = registration("aa", vec!["+ab".into(), "+cd".into()], 2);
        let (confirmed, _) = confirmed(tx);
        let descriptor = handler().db_save(&confirmed).unwrap().unwrap();

        assert_eq!(descriptor.table, "multisignatures");
        assert_eq!(descriptor.fields, vec!["min", "lifetime", "keysgroup", "transactionId"]);
        assert_eq!(descriptor.values["keysgroup"], "+ab,+cd");
        assert_eq!(descriptor.values["transactionId"], "42");
        assert_eq!(descriptor.values["min"], 2);
    }

    #[test]
    fn test_db_read_prefixed_columns() {
        let h = handler();
        let row: RawRow = serde_json::from_value(json!({
            "m_min": 2,
            "m_lifetime": "24",
            "m_keysgroup": "+ab,+cd"
        }))
        .unwrap();

        let asset = h.db_read(&row).unwrap().unwrap().multisignature.unwrap();
        assert_eq!(asset.min, 2);
        assert_eq!(asset.lifetime, 24);
        assert_eq!(asset.keysgroup, vec!["+ab", "+cd"]);

        assert_eq!(h.db_read(&RawRow::new()).unwrap(), None);
    }

    struct TableReader {
        requests: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl AssetReader for TableReader {
        async fn read_rows(
            &self,
            table: &str,
            transaction_id: &str,
        ) -> Result<Vec<RawRow>, TransactionError> {
            self.requests
                .lock()
                .unwrap()
                .push((table.to_string(), transaction_id.to_string()));
            let row = serde_json::from_value(json!({
                "min": 1, "lifetime": 5, "keysgroup": "+ab"
            }))
            .unwrap();
            Ok(vec![row])
        }
    }

    #[tokio::test]
    async fn test_restore_asset_reads_group_table() {
        let reader = TableReader {
            requests: Mutex::new(Vec::new()),
        };
        let mut tx = Transaction::new(TransactionType::Multi, "aa", 0);
        tx.id = "77".to_string();

        let restored = handler().restore_asset(tx, &reader).await.unwrap();
        let asset = restored.asset.multisignature.unwrap();
        assert_eq!((asset.min, asset.lifetime), (1, 5));
        assert_eq!(
            reader.requests.lock().unwrap().as_slice(),
            &[("multisignatures".to_string(), "77".to_string())]
        );
    }
}
