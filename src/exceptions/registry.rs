//! Named overrides for individual historical transactions
//!
//! A handler targets exactly one transaction, identified by its id *and*
//! its sender public key. When the lifecycle reaches an exception point it
//! asks the registry for a handler first and runs that instead of the normal
//! path.

use crate::core::{Account, SignedBlock, Transaction, TransactionError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Lifecycle steps that consult the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExceptionPoint {
    TxApply,
    TxApplyUnconfirmed,
    TxUndo,
    TxUndoUnconfirmed,
}

impl ExceptionPoint {
    pub const ALL: [ExceptionPoint; 4] = [
        ExceptionPoint::TxApply,
        ExceptionPoint::TxApplyUnconfirmed,
        ExceptionPoint::TxUndo,
        ExceptionPoint::TxUndoUnconfirmed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExceptionPoint::TxApply => "tx_apply",
            ExceptionPoint::TxApplyUnconfirmed => "tx_applyUnconfirmed",
            ExceptionPoint::TxUndo => "tx_undo",
            ExceptionPoint::TxUndoUnconfirmed => "tx_undoUnconfirmed",
        }
    }
}

impl fmt::Display for ExceptionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The one transaction a handler is allowed to touch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxIdentity {
    pub id: String,
    pub sender_public_key: String,
}

impl TxIdentity {
    pub fn new(id: &str, sender_public_key: &str) -> Self {
        Self {
            id: id.to_string(),
            sender_public_key: sender_public_key.to_string(),
        }
    }

    /// Both fields must agree
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.id == tx.id && self.sender_public_key == tx.sender_public_key
    }
}

/// Replacement behavior run in place of the normal lifecycle step. It sees
/// what the replaced call would have seen: the transaction, the block for
/// confirmed steps, and the sender account to mutate.
pub type ExceptionAction = Arc<
    dyn Fn(&Transaction, Option<&SignedBlock>, &mut Account) -> Result<(), TransactionError>
        + Send
        + Sync,
>;

#[derive(Clone)]
pub struct ExceptionHandler {
    target: TxIdentity,
    action: ExceptionAction,
}

impl ExceptionHandler {
    pub fn new<F>(target: TxIdentity, action: F) -> Self
    where
        F: Fn(&Transaction, Option<&SignedBlock>, &mut Account) -> Result<(), TransactionError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            target,
            action: Arc::new(action),
        }
    }

    /// Handler that succeeds without touching any state
    pub fn noop(target: TxIdentity) -> Self {
        Self::new(target, |_, _, _| Ok(()))
    }

    pub fn target(&self) -> &TxIdentity {
        &self.target
    }

    pub fn can_handle(&self, tx: &Transaction) -> bool {
        self.target.matches(tx)
    }

    pub fn handle(
        &self,
        tx: &Transaction,
        block: Option<&SignedBlock>,
        sender: &mut Account,
    ) -> Result<(), TransactionError> {
        (self.action)(tx, block, sender)
    }
}

impl fmt::Debug for ExceptionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionHandler")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Handlers per point, kept in registration order
#[derive(Debug, Default)]
pub struct ExceptionRegistry {
    points: HashMap<ExceptionPoint, Vec<(String, ExceptionHandler)>>,
}

impl ExceptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`. A name already present at the same
    /// point is replaced in place.
    pub fn register(&mut self, point: ExceptionPoint, name: &str, handler: ExceptionHandler) {
        let handlers = self.points.entry(point).or_default();
        match handlers.iter_mut().find(|(existing, _)| existing == name) {
            Some(slot) => slot.1 = handler,
            None => handlers.push((name.to_string(), handler)),
        }
    }

    /// First handler at `point` whose target is `tx`
    pub fn find_handler(&self, point: ExceptionPoint, tx: &Transaction) -> Option<&ExceptionHandler> {
        self.points
            .get(&point)?
            .iter()
            .map(|(_, handler)| handler)
            .find(|handler| handler.can_handle(tx))
    }

    /// Named handlers at a point
    pub fn handlers(&self, point: ExceptionPoint) -> impl Iterator<Item = (&str, &ExceptionHandler)> {
        self.points
            .get(&point)
            .into_iter()
            .flatten()
            .map(|(name, handler)| (name.as_str(), handler))
    }

    pub fn len(&self) -> usize {
        self.points.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransactionType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tx(id: &str, sender: &str) -> Transaction {
        let mut tx = Transaction::new(TransactionType::Delegate, sender, 0);
        tx.id = id.to_string();
        tx
    }

    #[test]
    fn test_requires_both_fields() {
        let mut registry = ExceptionRegistry::new();
        registry.register(
            ExceptionPoint::TxApply,
            "dup",
            ExceptionHandler::noop(TxIdentity::new("1", "aa")),
        );

        assert!(registry.find_handler(ExceptionPoint::TxApply, &tx("1", "aa")).is_some());
        assert!(registry.find_handler(ExceptionPoint::TxApply, &tx("1", "bb")).is_none());
        assert!(registry.find_handler(ExceptionPoint::TxApply, &tx("2", "aa")).is_none());
        assert!(registry.find_handler(ExceptionPoint::TxUndo, &tx("1", "aa")).is_none());
    }

    #[test]
    fn test_same_name_replaces_in_place() {
        let mut registry = ExceptionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        registry.register(
            ExceptionPoint::TxApply,
            "first",
            ExceptionHandler::noop(TxIdentity::new("1", "aa")),
        );
        registry.register(
            ExceptionPoint::TxApply,
            "second",
            ExceptionHandler::noop(TxIdentity::new("2", "aa")),
        );

        let counter = calls.clone();
        registry.register(
            ExceptionPoint::TxApply,
            "first",
            ExceptionHandler::new(TxIdentity::new("1", "aa"), move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry
            .handlers(ExceptionPoint::TxApply)
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);

        let handler = registry
            .find_handler(ExceptionPoint::TxApply, &tx("1", "aa"))
            .unwrap();
        handler
            .handle(&tx("1", "aa"), None, &mut Account::new("1R"))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_action_errors_propagate() {
        let handler = ExceptionHandler::new(TxIdentity::new("1", "aa"), |_, _, _| {
            Err(TransactionError::InvalidTransaction("blocked".to_string()))
        });
        assert!(handler
            .handle(&tx("1", "aa"), None, &mut Account::new("1R"))
            .is_err());
    }

    #[test]
    fn test_action_sees_block_and_sender() {
        let handler = ExceptionHandler::new(TxIdentity::new("1", "aa"), |tx, block, sender| {
            let height = block.map_or(0, |b| b.height);
            sender.balance += tx.fee + height;
            Ok(())
        });
        let mut tx = tx("1", "aa");
        tx.fee = 10;
        let block = SignedBlock::new("9", 5, 0, "aa");

        let mut sender = Account::new("1R");
        handler.handle(&tx, Some(&block), &mut sender).unwrap();
        assert_eq!(sender.balance, 15);
        handler.handle(&tx, None, &mut sender).unwrap();
        assert_eq!(sender.balance, 25);
    }

    #[test]
    fn test_empty_registry() {
        let registry = ExceptionRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.handlers(ExceptionPoint::TxUndo).count(), 0);
    }
}
