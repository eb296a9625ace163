//! Balance transfer between two accounts

use crate::core::{
    Account, AccountDiff, AccountLedger, Asset, ConfirmedTransaction, FeeSchedule, SignedBlock,
    Transaction, TransactionError, TransactionType,
};
use crate::logic::lifecycle::{DbSaveDescriptor, RawRow, TransactionLifecycle};
use async_trait::async_trait;
use std::sync::Arc;

pub struct SendTransaction {
    fees: FeeSchedule,
    ledger: Arc<dyn AccountLedger>,
}

impl SendTransaction {
    pub fn new(fees: FeeSchedule, ledger: Arc<dyn AccountLedger>) -> Self {
        Self { fees, ledger }
    }

    fn recipient(tx: &Transaction) -> Result<&str, TransactionError> {
        tx.recipient_id
            .as_deref()
            .ok_or_else(|| TransactionError::InvalidTransaction("Missing recipient".to_string()))
    }

    /// Move `delta` onto the recipient. A self-transfer lands on the sender
    /// snapshot the caller persists, not on the ledger copy.
    async fn credit(
        &self,
        tx: &Transaction,
        sender: &mut Account,
        delta: i128,
    ) -> Result<(), TransactionError> {
        let recipient = Self::recipient(tx)?;
        let diff = AccountDiff::both(delta);
        if recipient == sender.address {
            return diff.apply_to(sender);
        }
        self.ledger.merge(recipient, diff).await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionLifecycle for SendTransaction {
    fn tx_type(&self) -> TransactionType {
        TransactionType::Send
    }

    fn calculate_fee(&self, _tx: &Transaction, _sender: &Account, height: u64) -> u64 {
        self.fees.fees_at(height).send
    }

    async fn verify(&self, tx: &Transaction, _sender: &Account) -> Result<(), TransactionError> {
        Self::recipient(tx)?;
        if tx.amount == 0 {
            return Err(TransactionError::InvalidTransaction(
                "Invalid transaction amount".to_string(),
            ));
        }
        Ok(())
    }

    fn get_bytes(
        &self,
        _tx: &Transaction,
        _skip_signature: bool,
        _skip_second_signature: bool,
    ) -> Result<Vec<u8>, TransactionError> {
        Ok(Vec::new())
    }

    async fn apply(
        &self,
        tx: &ConfirmedTransaction,
        block: &SignedBlock,
        sender: &mut Account,
    ) -> Result<(), TransactionError> {
        let tx = &tx.transaction;
        log::debug!(
            "Crediting {} with {} at height {}",
            tx.recipient_id.as_deref().unwrap_or_default(),
            tx.amount,
            block.height
        );
        self.credit(tx, sender, tx.amount as i128).await
    }

    async fn undo(
        &self,
        tx: &ConfirmedTransaction,
        _block: &SignedBlock,
        sender: &mut Account,
    ) -> Result<(), TransactionError> {
        let tx = &tx.transaction;
        self.credit(tx, sender, -(tx.amount as i128)).await
    }

    fn object_normalize(&self, tx: Transaction) -> Result<Transaction, TransactionError> {
        if !tx.asset.is_empty() {
            return Err(TransactionError::InvalidAsset(
                "Send transaction must not carry an asset".to_string(),
            ));
        }
        Self::recipient(&tx)?;
        Ok(tx)
    }

    fn db_read(&self, _raw: &RawRow) -> Result<Option<Asset>, TransactionError> {
        Ok(None)
    }

    fn db_save(
        &self,
        _tx: &ConfirmedTransaction,
    ) -> Result<Option<DbSaveDescriptor>, TransactionError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AccountStore, MemoryAccountStore, MultisignatureAsset};

    fn send(amount: u64, recipient: Option<&str>) -> Transaction {
        let mut tx = Transaction::new(TransactionType::Send, "aa", 0);
        tx.amount = amount;
        tx.recipient_id = recipient.map(str::to_string);
        tx.sender_id = Some("1R".to_string());
        tx
    }

    fn handler(store: Arc<MemoryAccountStore>) -> SendTransaction {
        SendTransaction::new(FeeSchedule::default(), store)
    }

    #[tokio::test]
    async fn test_verify_requires_recipient_and_amount() {
        let handler = handler(Arc::new(MemoryAccountStore::new()));
        let sender = Account::new("1R");

        assert!(handler.verify(&send(5, Some("2R")), &sender).await.is_ok());
        assert!(handler.verify(&send(5, None), &sender).await.is_err());
        assert!(handler.verify(&send(0, Some("2R")), &sender).await.is_err());
    }

    #[test]
    fn test_normalize_rejects_asset() {
        let handler = handler(Arc::new(MemoryAccountStore::new()));
        let mut tx = send(5, Some("2R"));
        assert!(handler.object_normalize(tx.clone()).is_ok());

        tx.asset.multisignature = Some(MultisignatureAsset {
            min: 1,
            lifetime: 1,
            keysgroup: vec![],
            signatures: None,
        });
        assert!(matches!(
            handler.object_normalize(tx),
            Err(TransactionError::InvalidAsset(_))
        ));
    }

    #[tokio::test]
    async fn test_apply_then_undo_restores_recipient() {
        let store = Arc::new(MemoryAccountStore::new());
        store.put(Account::new("2R").with_balance(10)).await;
        let handler = handler(store.clone());

        let block = SignedBlock::new("b1", 3, 0, "aa");
        let confirmed = ConfirmedTransaction {
            transaction: send(25, Some("2R")),
            block_id: block.id.clone(),
            height: block.height,
            sender_id: "1R".to_string(),
        };
        let mut sender = Account::new("1R").with_balance(100);

        handler.apply(&confirmed, &block, &mut sender).await.unwrap();
        let recipient = store.get_account("2R").await.unwrap();
        assert_eq!((recipient.balance, recipient.u_balance), (35, 35));

        handler.undo(&confirmed, &block, &mut sender).await.unwrap();
        assert_eq!(store.get_account("2R").await.unwrap(), Account::new("2R").with_balance(10));
        assert_eq!(sender, Account::new("1R").with_balance(100));
    }

    #[tokio::test]
    async fn test_self_transfer_credits_snapshot() {
        let store = Arc::new(MemoryAccountStore::new());
        let handler = handler(store.clone());
        let block = SignedBlock::new("b1", 3, 0, "aa");
        let confirmed = ConfirmedTransaction {
            transaction: send(5, Some("1R")),
            block_id: block.id.clone(),
            height: block.height,
            sender_id: "1R".to_string(),
        };
        let mut sender = Account::new("1R").with_balance(0);

        handler.apply(&confirmed, &block, &mut sender).await.unwrap();
        assert_eq!(sender.balance, 5);
        assert_eq!(store.account_count().await, 0);
    }

    #[test]
    fn test_fee_and_storage() {
        let handler = handler(Arc::new(MemoryAccountStore::new()));
        let tx = send(1, Some("2R"));
        assert_eq!(handler.calculate_fee(&tx, &Account::new("1R"), 1), 10_000_000);
        assert!(handler.get_bytes(&tx, false, false).unwrap().is_empty());
        assert_eq!(handler.db_read(&RawRow::new()).unwrap(), None);
    }
}
