//! Transactions mainnet accepted before today's rules existed
//!
//! Both entries are delegate registrations for accounts that were already
//! delegates. Replaying them must not fail, so every balance-affecting step
//! treats them as no-ops.

use super::registry::{ExceptionHandler, ExceptionPoint, ExceptionRegistry, TxIdentity};

/// A transaction that needs an override to replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoricalException {
    pub name: &'static str,
    pub id: &'static str,
    pub sender_public_key: &'static str,
    pub height: u64,
}

impl HistoricalException {
    pub fn identity(&self) -> TxIdentity {
        TxIdentity::new(self.id, self.sender_public_key)
    }
}

pub const HISTORICAL_EXCEPTIONS: [HistoricalException; 2] = [
    HistoricalException {
        name: "duplicate_delegate_537889",
        id: "6837619361654997458",
        sender_public_key: "71904305bcca3f5e7b57f7845f16a0e7514d0ed870dae8d99e25846499fb5ba2",
        height: 537_889,
    },
    HistoricalException {
        name: "duplicate_delegate_549745",
        id: "2729957662760052130",
        sender_public_key: "cbced906dcd30ac4641d72140688b8122eee4b12dc4296e5e750d38c95b0e7d6",
        height: 549_745,
    },
];

/// Register every historical override at every point
pub fn register_historical(registry: &mut ExceptionRegistry) {
    for exception in &HISTORICAL_EXCEPTIONS {
        for point in ExceptionPoint::ALL {
            registry.register(point, exception.name, ExceptionHandler::noop(exception.identity()));
        }
    }
    log::debug!("Registered {} historical exceptions", HISTORICAL_EXCEPTIONS.len());
}

/// Registry preloaded with the historical overrides
pub fn historical_registry() -> ExceptionRegistry {
    let mut registry = ExceptionRegistry::new();
    register_historical(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Account, Transaction, TransactionType};

    #[test]
    fn test_every_point_covered() {
        let registry = historical_registry();
        assert_eq!(registry.len(), 8);

        for exception in &HISTORICAL_EXCEPTIONS {
            let mut tx = Transaction::new(TransactionType::Delegate, exception.sender_public_key, 0);
            tx.id = exception.id.to_string();
            for point in ExceptionPoint::ALL {
                let handler = registry.find_handler(point, &tx).unwrap();
                let mut sender = Account::new("1R");
                assert!(handler.handle(&tx, None, &mut sender).is_ok());
                assert_eq!(sender, Account::new("1R"));
            }
        }
    }

    #[test]
    fn test_id_with_other_sender_is_not_matched() {
        let registry = historical_registry();
        let mut tx = Transaction::new(
            TransactionType::Delegate,
            HISTORICAL_EXCEPTIONS[1].sender_public_key,
            0,
        );
        tx.id = HISTORICAL_EXCEPTIONS[0].id.to_string();
        assert!(registry.find_handler(ExceptionPoint::TxApply, &tx).is_none());
    }
}
