//! Inbound transaction records and the hand-off queue they arrive through

use crate::time::Millis;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// External transaction identifier, unique per feed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a transaction came from
///
/// Every origin names the sku whose streamer config it activates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionOrigin {
    /// Paid commerce purchase
    Sku(String),
    /// Free redemption (channel points, raids, subscriptions)
    Free(String),
    /// Triggered from a test panel
    Test(String),
    /// Triggered manually by the streamer
    Manual(String),
}

impl TransactionOrigin {
    /// The sku this origin activates
    pub fn sku(&self) -> &str {
        match self {
            TransactionOrigin::Sku(sku)
            | TransactionOrigin::Free(sku)
            | TransactionOrigin::Test(sku)
            | TransactionOrigin::Manual(sku) => sku,
        }
    }

    /// Whether real currency changed hands
    pub fn is_paid(&self) -> bool {
        matches!(self, TransactionOrigin::Sku(_))
    }
}

/// Price paid for a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    pub amount: f64,
    pub currency: String,
}

/// An accepted viewer transaction
///
/// Immutable once created. Products reference it but never change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    /// When the transaction happened, epoch milliseconds
    pub timestamp_ms: Millis,
    /// Display name of the viewer
    pub buyer: String,
    pub origin: TransactionOrigin,
    #[serde(default)]
    pub cost: Option<Cost>,
}

impl TransactionRecord {
    /// Create a transaction for a paid sku
    pub fn purchase(
        id: impl Into<String>,
        timestamp_ms: Millis,
        buyer: impl Into<String>,
        sku: impl Into<String>,
    ) -> Self {
        Self {
            id: TransactionId::new(id),
            timestamp_ms,
            buyer: buyer.into(),
            origin: TransactionOrigin::Sku(sku.into()),
            cost: None,
        }
    }

    /// Create a transaction with an explicit origin
    pub fn with_origin(
        id: impl Into<String>,
        timestamp_ms: Millis,
        buyer: impl Into<String>,
        origin: TransactionOrigin,
    ) -> Self {
        Self {
            id: TransactionId::new(id),
            timestamp_ms,
            buyer: buyer.into(),
            origin,
            cost: None,
        }
    }

    /// Attach a cost
    pub fn costing(mut self, amount: f64, currency: impl Into<String>) -> Self {
        self.cost = Some(Cost {
            amount,
            currency: currency.into(),
        });
        self
    }

    pub fn sku(&self) -> &str {
        self.origin.sku()
    }
}

/// Thread-safe queue between the transaction feed and the world thread
///
/// Feed tasks push from any thread; the runtime drains once per tick.
/// Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct TransactionInbox {
    queue: Arc<Mutex<VecDeque<TransactionRecord>>>,
}

impl TransactionInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand a transaction to the world thread
    pub fn push(&self, record: TransactionRecord) {
        match self.queue.lock() {
            Ok(mut queue) => queue.push_back(record),
            Err(poisoned) => poisoned.into_inner().push_back(record),
        }
    }

    /// Hand over several transactions at once
    pub fn extend(&self, records: impl IntoIterator<Item = TransactionRecord>) {
        match self.queue.lock() {
            Ok(mut queue) => queue.extend(records),
            Err(poisoned) => poisoned.into_inner().extend(records),
        }
    }

    /// Take everything queued, oldest timestamp first
    ///
    /// Records that arrived out of order are put back in timestamp order;
    /// equal timestamps keep arrival order.
    pub fn drain(&self) -> Vec<TransactionRecord> {
        let mut records: Vec<_> = match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        records.sort_by_key(|record| record.timestamp_ms);
        records
    }

    pub fn len(&self) -> usize {
        match self.queue.lock() {
            Ok(queue) => queue.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_origin_sku() {
        assert_eq!(TransactionOrigin::Manual("snow".into()).sku(), "snow");
        assert!(TransactionOrigin::Sku("snow".into()).is_paid());
        assert!(!TransactionOrigin::Free("snow".into()).is_paid());
    }

    #[test]
    fn test_drain_sorts_by_timestamp() {
        let inbox = TransactionInbox::new();
        inbox.push(TransactionRecord::purchase("b", 200, "bo", "snow"));
        inbox.push(TransactionRecord::purchase("a", 100, "al", "snow"));
        inbox.push(TransactionRecord::purchase("c", 200, "cy", "snow"));

        let ids: Vec<_> = inbox.drain().into_iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_push_from_other_threads() {
        let inbox = TransactionInbox::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let inbox = inbox.clone();
                thread::spawn(move || {
                    for j in 0..10 {
                        inbox.push(TransactionRecord::purchase(
                            format!("{}-{}", i, j),
                            j,
                            "viewer",
                            "snow",
                        ));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(inbox.len(), 40);
        assert_eq!(inbox.drain().len(), 40);
    }

    #[test]
    fn test_record_ron() {
        let record: TransactionRecord = ron::from_str(
            r#"(
                id: "tx-1",
                timestamp_ms: 1000,
                buyer: "viewer",
                origin: Free("raid"),
            )"#,
        )
        .unwrap();
        assert_eq!(record.sku(), "raid");
        assert!(record.cost.is_none());
    }
}
