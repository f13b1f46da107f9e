//! In-process adapters, used by tests and when embedding the service.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{NewTransaction, ProviderCredential, Transaction};
use crate::ports::{LedgerStore, ProviderRegistry, StoreError, StoreResult, UniqueField};

#[derive(Default)]
struct Ledger {
    records: Vec<Transaction>,
    by_code: HashMap<String, usize>,
    by_serial: HashMap<String, usize>,
}

/// Ledger store held in memory. Uniqueness is checked under the write lock,
/// so it is linearizable like the Postgres constraint.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    ledger: Arc<RwLock<Ledger>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.ledger.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(())
    }
}

fn sort_records(records: &mut [Transaction], newest_first: bool) {
    records.sort_by(|a, b| {
        let by_time = if newest_first {
            b.created_at.cmp(&a.created_at)
        } else {
            a.created_at.cmp(&b.created_at)
        };
        by_time.then_with(|| a.transaction_code.cmp(&b.transaction_code))
    });
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert(&self, tx: &NewTransaction) -> StoreResult<Transaction> {
        self.check_available()?;
        let mut ledger = self.ledger.write().await;

        if ledger.by_code.contains_key(&tx.transaction_code) {
            return Err(StoreError::Conflict(UniqueField::TransactionCode));
        }
        if let Some(serial) = &tx.serial_number {
            if ledger.by_serial.contains_key(serial) {
                return Err(StoreError::Conflict(UniqueField::SerialNumber));
            }
        }

        let stored = Transaction::from_new(tx.clone(), Utc::now());
        let index = ledger.records.len();
        ledger.by_code.insert(stored.transaction_code.clone(), index);
        if let Some(serial) = &stored.serial_number {
            ledger.by_serial.insert(serial.clone(), index);
        }
        ledger.records.push(stored.clone());

        Ok(stored)
    }

    async fn code_exists(&self, code: &str) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.ledger.read().await.by_code.contains_key(code))
    }

    async fn find_by_code(&self, code: &str) -> StoreResult<Transaction> {
        self.check_available()?;
        let ledger = self.ledger.read().await;
        ledger
            .by_code
            .get(code)
            .map(|&i| ledger.records[i].clone())
            .ok_or_else(|| StoreError::NotFound(code.to_string()))
    }

    async fn find_by_serial(&self, serial: &str) -> StoreResult<Transaction> {
        self.check_available()?;
        let ledger = self.ledger.read().await;
        ledger
            .by_serial
            .get(serial)
            .map(|&i| ledger.records[i].clone())
            .ok_or_else(|| StoreError::NotFound(serial.to_string()))
    }

    async fn search(&self, query: &str) -> StoreResult<Vec<Transaction>> {
        self.check_available()?;
        let needle = query.to_lowercase();
        let mut hits: Vec<Transaction> = self
            .ledger
            .read()
            .await
            .records
            .iter()
            .filter(|tx| tx.matches_query(&needle))
            .cloned()
            .collect();

        sort_records(&mut hits, true);
        Ok(hits)
    }

    async fn list_all(&self, newest_first: bool) -> StoreResult<Vec<Transaction>> {
        self.check_available()?;
        let mut all = self.ledger.read().await.records.clone();
        sort_records(&mut all, newest_first);
        Ok(all)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}

/// Fixed provider list.
#[derive(Clone, Default)]
pub struct StaticProviderRegistry {
    providers: Vec<ProviderCredential>,
}

impl StaticProviderRegistry {
    pub fn new(mut providers: Vec<ProviderCredential>) -> Self {
        providers.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        Self { providers }
    }
}

#[async_trait]
impl ProviderRegistry for StaticProviderRegistry {
    async fn list_by_priority(&self) -> StoreResult<Vec<ProviderCredential>> {
        Ok(self.providers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn new_tx(code: &str, serial: Option<&str>, product: &str) -> NewTransaction {
        NewTransaction {
            id: Uuid::new_v4(),
            transaction_code: code.to_string(),
            product_name: product.to_string(),
            product_price: 100_000,
            admin_name: "Dewi".to_string(),
            buyer_number: "0812000111".to_string(),
            serial_number: serial.map(str::to_string),
            purchase_date: None,
            active_period: None,
            warranty: None,
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_code() {
        let store = InMemoryLedgerStore::new();
        store.insert(&new_tx("KNT-A", None, "Mouse")).await.unwrap();

        let err = store.insert(&new_tx("KNT-A", None, "Keyboard")).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict(UniqueField::TransactionCode));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn rejects_duplicate_serial() {
        let store = InMemoryLedgerStore::new();
        store.insert(&new_tx("KNT-A", Some("SN1"), "Mouse")).await.unwrap();

        let err = store
            .insert(&new_tx("KNT-B", Some("SN1"), "Keyboard"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Conflict(UniqueField::SerialNumber));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let store = InMemoryLedgerStore::new();
        store.insert(&new_tx("KNT-A", None, "Laptop Gaming X1")).await.unwrap();
        store.insert(&new_tx("KNT-B", None, "Office Chair")).await.unwrap();

        let hits = store.search("gaming").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].transaction_code, "KNT-A");

        assert_eq!(store.search("knt-").await.unwrap().len(), 2);
        assert!(store.search("tablet").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookups_report_not_found() {
        let store = InMemoryLedgerStore::new();
        assert!(matches!(
            store.find_by_code("KNT-NOPE").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.find_by_serial("SN-NOPE").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryLedgerStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
        assert!(store.code_exists("KNT-A").await.is_err());
        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn static_registry_orders_by_priority() {
        let registry = StaticProviderRegistry::new(vec![
            ProviderCredential::new("backup", "k2", 2),
            ProviderCredential::new("primary", "k0", 0),
            ProviderCredential::new("secondary", "k1", 1),
        ]);

        let names: Vec<String> = registry
            .list_by_priority()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["primary", "secondary", "backup"]);
    }
}
