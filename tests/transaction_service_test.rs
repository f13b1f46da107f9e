use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use receipt_ledger::adapters::{InMemoryLedgerStore, StaticProviderRegistry};
use receipt_ledger::domain::{
    CodeGenerator, DurationUnit, NewTransaction, ProviderCredential, ProviderKind,
    RandomCodeGenerator, Transaction,
};
use receipt_ledger::ports::{LedgerStore, StoreResult};
use receipt_ledger::render::{
    ArtifactReference, ProviderAttemptError, ReceiptDispatcher, RenderBackend, RenderError,
    RenderPayload,
};
use receipt_ledger::services::{
    CreateTransactionRequest, ReceiptOutcome, ServiceError, TransactionService,
};

/// Fails for the named providers, succeeds for everyone else.
struct SelectiveBackend {
    failing: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl SelectiveBackend {
    fn failing(failing: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            failing,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderBackend for SelectiveBackend {
    async fn render(
        &self,
        payload: &RenderPayload,
        credential: &ProviderCredential,
    ) -> Result<ArtifactReference, ProviderAttemptError> {
        self.calls.lock().unwrap().push(credential.name.clone());
        if self.failing.iter().any(|name| *name == credential.name) {
            return Err(ProviderAttemptError::Status(502));
        }
        Ok(ArtifactReference::HostedUrl {
            url: format!("https://{}.example/{}", credential.name, payload.reference),
        })
    }
}

/// Hands out a fixed list of codes, then falls back to random ones.
struct SequenceCodes {
    codes: Mutex<VecDeque<String>>,
    fallback: RandomCodeGenerator,
}

impl SequenceCodes {
    fn new(codes: &[&str]) -> Self {
        Self {
            codes: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
            fallback: RandomCodeGenerator::default(),
        }
    }
}

impl CodeGenerator for SequenceCodes {
    fn generate(&self) -> String {
        self.codes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.generate())
    }
}

/// Never reports a code as taken, so collisions only show up at insert.
struct BlindExistenceStore {
    inner: InMemoryLedgerStore,
}

#[async_trait]
impl LedgerStore for BlindExistenceStore {
    async fn insert(&self, tx: &NewTransaction) -> StoreResult<Transaction> {
        // Let concurrent callers interleave between check and insert
        tokio::task::yield_now().await;
        self.inner.insert(tx).await
    }
    async fn code_exists(&self, _code: &str) -> StoreResult<bool> {
        Ok(false)
    }
    async fn find_by_code(&self, code: &str) -> StoreResult<Transaction> {
        self.inner.find_by_code(code).await
    }
    async fn find_by_serial(&self, serial: &str) -> StoreResult<Transaction> {
        self.inner.find_by_serial(serial).await
    }
    async fn search(&self, query: &str) -> StoreResult<Vec<Transaction>> {
        self.inner.search(query).await
    }
    async fn list_all(&self, newest_first: bool) -> StoreResult<Vec<Transaction>> {
        self.inner.list_all(newest_first).await
    }
    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

fn providers(names: &[&str]) -> Arc<StaticProviderRegistry> {
    Arc::new(StaticProviderRegistry::new(
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ProviderCredential::new(*name, "key", i as i32))
            .collect(),
    ))
}

fn dispatcher(
    registry: Arc<StaticProviderRegistry>,
    backend: Arc<SelectiveBackend>,
) -> Arc<ReceiptDispatcher> {
    Arc::new(
        ReceiptDispatcher::new(registry, "Neon Electronics")
            .with_backend(ProviderKind::Image, backend),
    )
}

fn service_with(
    store: Arc<dyn LedgerStore>,
    codes: Arc<dyn CodeGenerator>,
    backend: Arc<SelectiveBackend>,
) -> TransactionService {
    TransactionService::new(store, codes, dispatcher(providers(&["p0", "p1", "p2"]), backend))
}

fn default_service() -> (TransactionService, InMemoryLedgerStore, Arc<SelectiveBackend>) {
    let store = InMemoryLedgerStore::new();
    let backend = SelectiveBackend::failing(vec![]);
    let service = service_with(
        Arc::new(store.clone()),
        Arc::new(RandomCodeGenerator::default()),
        backend.clone(),
    );
    (service, store, backend)
}

fn laptop_request() -> CreateTransactionRequest {
    CreateTransactionRequest {
        product_name: Some("Gaming Laptop".to_string()),
        product_price: Some(2_450_000),
        admin_name: Some("Rina".to_string()),
        buyer_number: Some("081234567890".to_string()),
        has_warranty: true,
        warranty_duration: Some(12),
        warranty_unit: Some("months".to_string()),
        ..Default::default()
    }
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
}

#[tokio::test]
async fn test_create_then_lookup_round_trip() {
    let (service, store, _) = default_service();

    let created = service.create(laptop_request(), true).await.unwrap();
    let code = created.transaction.transaction_code.clone();

    assert!(RandomCodeGenerator::default().matches_format(&code));
    assert_eq!(store.len().await, 1);

    let found = service.get_by_code(&code).await.unwrap();
    assert_eq!(found, created.transaction);

    // Lookups are case-insensitive
    let found = service.get_by_code(&code.to_lowercase()).await.unwrap();
    assert_eq!(found.id, created.transaction.id);
}

#[tokio::test]
async fn test_text_fields_round_trip_unmodified() {
    let (service, _, _) = default_service();

    let request = CreateTransactionRequest {
        product_name: Some("  Laptop  Gaming  ".to_string()),
        admin_name: Some("Rina  Putri".to_string()),
        buyer_number: Some("0812 3456  7890".to_string()),
        ..laptop_request()
    };
    let created = service.create(request, true).await.unwrap();

    let found = service
        .get_by_code(&created.transaction.transaction_code)
        .await
        .unwrap();
    assert_eq!(found.product_name, "Laptop  Gaming");
    assert_eq!(found.admin_name, "Rina  Putri");
    assert_eq!(found.buyer_number, "0812 3456  7890");
}

#[tokio::test]
async fn test_code_absent_before_and_present_after() {
    let store = InMemoryLedgerStore::new();
    let service = service_with(
        Arc::new(store.clone()),
        Arc::new(SequenceCodes::new(&["KNT-AAAAAAAAAA"])),
        SelectiveBackend::failing(vec![]),
    );

    assert!(!store.code_exists("KNT-AAAAAAAAAA").await.unwrap());
    let created = service.create(laptop_request(), true).await.unwrap();
    assert_eq!(created.transaction.transaction_code, "KNT-AAAAAAAAAA");
    assert!(store.code_exists("KNT-AAAAAAAAAA").await.unwrap());
}

#[tokio::test]
async fn test_existing_code_is_regenerated() {
    let store = InMemoryLedgerStore::new();
    let service = service_with(
        Arc::new(store.clone()),
        Arc::new(SequenceCodes::new(&[
            "KNT-AAAAAAAAAA",
            "KNT-AAAAAAAAAA",
            "KNT-BBBBBBBBBB",
        ])),
        SelectiveBackend::failing(vec![]),
    );

    let first = service.create(laptop_request(), true).await.unwrap();
    let second = service.create(laptop_request(), true).await.unwrap();

    assert_eq!(first.transaction.transaction_code, "KNT-AAAAAAAAAA");
    assert_eq!(second.transaction.transaction_code, "KNT-BBBBBBBBBB");
}

#[tokio::test]
async fn test_insert_conflict_retries_with_fresh_code() {
    let inner = InMemoryLedgerStore::new();
    let store = Arc::new(BlindExistenceStore {
        inner: inner.clone(),
    });
    let service = Arc::new(service_with(
        store,
        Arc::new(SequenceCodes::new(&[
            "KNT-DUPLICATE1",
            "KNT-DUPLICATE1",
            "KNT-DISTINCT22",
        ])),
        SelectiveBackend::failing(vec![]),
    ));

    let (a, b) = tokio::join!(
        service.create(laptop_request(), true),
        service.create(laptop_request(), true)
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert_ne!(a.transaction.transaction_code, b.transaction.transaction_code);
    assert_eq!(inner.len().await, 2);
}

#[tokio::test]
async fn test_code_allocation_gives_up_after_max_attempts() {
    let store = InMemoryLedgerStore::new();
    let seed = service_with(
        Arc::new(store.clone()),
        Arc::new(SequenceCodes::new(&["KNT-TAKEN00000"])),
        SelectiveBackend::failing(vec![]),
    );
    seed.create(laptop_request(), true).await.unwrap();

    let service = service_with(
        Arc::new(store.clone()),
        Arc::new(SequenceCodes::new(&["KNT-TAKEN00000"; 8])),
        SelectiveBackend::failing(vec![]),
    )
    .with_max_code_attempts(3);

    let err = service.create(laptop_request(), true).await.unwrap_err();
    assert!(matches!(err, ServiceError::Store(_)));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_failover_attributes_servicing_provider() {
    let store = InMemoryLedgerStore::new();
    let backend = SelectiveBackend::failing(vec!["p0"]);
    let service = service_with(
        Arc::new(store.clone()),
        Arc::new(RandomCodeGenerator::default()),
        backend.clone(),
    );

    let created = service.create(laptop_request(), true).await.unwrap();

    match created.receipt {
        ReceiptOutcome::Rendered(rendered) => {
            assert_eq!(rendered.provider, "p1");
            assert_eq!(rendered.attempted, vec!["p0", "p1"]);
            assert!(matches!(rendered.artifact, ArtifactReference::HostedUrl { .. }));
        }
        other => panic!("expected rendered receipt, got {:?}", other),
    }
    assert_eq!(backend.calls(), vec!["p0", "p1"]);
}

#[tokio::test]
async fn test_all_providers_failing_keeps_transaction() {
    let store = InMemoryLedgerStore::new();
    let backend = SelectiveBackend::failing(vec!["p0", "p1", "p2"]);
    let service = service_with(
        Arc::new(store.clone()),
        Arc::new(RandomCodeGenerator::default()),
        backend.clone(),
    );

    let created = service.create(laptop_request(), true).await.unwrap();

    assert_eq!(
        created.receipt,
        ReceiptOutcome::Failed(RenderError::Exhausted {
            attempted: vec!["p0".to_string(), "p1".to_string(), "p2".to_string()],
        })
    );
    assert_eq!(backend.calls().len(), 3);
    assert!(service
        .get_by_code(&created.transaction.transaction_code)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_validation_names_offending_field() {
    let (service, store, backend) = default_service();

    let cases = vec![
        (
            CreateTransactionRequest {
                product_name: None,
                ..laptop_request()
            },
            "productName",
        ),
        (
            CreateTransactionRequest {
                product_price: Some(-1),
                ..laptop_request()
            },
            "productPrice",
        ),
        (
            CreateTransactionRequest {
                buyer_number: Some("   ".to_string()),
                ..laptop_request()
            },
            "buyerNumber",
        ),
        (
            CreateTransactionRequest {
                buyer_number: Some("0812\t3456".to_string()),
                ..laptop_request()
            },
            "buyerNumber",
        ),
        (
            CreateTransactionRequest {
                warranty_unit: Some("years".to_string()),
                ..laptop_request()
            },
            "warrantyUnit",
        ),
        (
            CreateTransactionRequest {
                has_active_period: true,
                active_duration: Some(0),
                active_unit: Some("days".to_string()),
                ..laptop_request()
            },
            "activeDuration",
        ),
    ];

    for (request, field) in cases {
        match service.create(request, true).await {
            Err(ServiceError::Validation(e)) => assert_eq!(e.field, field),
            other => panic!("expected validation error on {}, got {:?}", field, other),
        }
    }

    assert!(store.is_empty().await);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_disabled_period_discards_its_fields() {
    let (service, _, _) = default_service();

    let created = service
        .create(
            CreateTransactionRequest {
                has_warranty: false,
                warranty_duration: Some(-3),
                warranty_unit: Some("years".to_string()),
                ..laptop_request()
            },
            true,
        )
        .await
        .unwrap();

    assert!(created.transaction.warranty.is_none());
    assert!(created.transaction.active_period.is_none());
}

#[tokio::test]
async fn test_unauthorized_caller_cannot_create() {
    let (service, store, backend) = default_service();

    let err = service.create(laptop_request(), false).await.unwrap_err();

    assert_eq!(err, ServiceError::Unauthorized);
    assert!(store.is_empty().await);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_store_unavailable_is_fatal() {
    let (service, store, backend) = default_service();
    store.set_unavailable(true);

    let err = service.create(laptop_request(), true).await.unwrap_err();

    assert!(matches!(err, ServiceError::Store(_)));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_duplicate_serial_is_rejected() {
    let (service, store, _) = default_service();

    let first = service
        .create(
            CreateTransactionRequest {
                serial_number: Some("sn-0001".to_string()),
                ..laptop_request()
            },
            true,
        )
        .await
        .unwrap();
    assert_eq!(first.transaction.serial_number.as_deref(), Some("SN-0001"));

    let err = service
        .create(
            CreateTransactionRequest {
                serial_number: Some("SN-0001".to_string()),
                ..laptop_request()
            },
            true,
        )
        .await
        .unwrap_err();

    assert_eq!(err, ServiceError::DuplicateSerial("SN-0001".to_string()));
    assert_eq!(store.len().await, 1);

    let found = service.get_by_serial(" sn-0001 ").await.unwrap();
    assert_eq!(found.id, first.transaction.id);
}

#[tokio::test]
async fn test_expiry_anchored_at_received_time() {
    let (service, _, _) = default_service();
    let received_at = at(2024, 1, 31);

    let created = service
        .create_received_at(
            CreateTransactionRequest {
                has_active_period: true,
                active_duration: Some(1),
                active_unit: Some("months".to_string()),
                ..laptop_request()
            },
            true,
            received_at,
        )
        .await
        .unwrap();

    let active = created.transaction.active_period.unwrap();
    assert_eq!(active.unit, DurationUnit::Months);
    assert_eq!(active.expires_at, at(2024, 2, 29));

    let warranty = created.transaction.warranty.unwrap();
    assert_eq!(warranty.expires_at, at(2025, 1, 31));
}

#[tokio::test]
async fn test_expiry_anchored_at_purchase_date() {
    let (service, _, _) = default_service();

    let created = service
        .create_received_at(
            CreateTransactionRequest {
                purchase_date: Some(at(2023, 3, 1)),
                warranty_duration: Some(2),
                warranty_unit: Some("weeks".to_string()),
                ..laptop_request()
            },
            true,
            at(2024, 6, 1),
        )
        .await
        .unwrap();

    let warranty = created.transaction.warranty.unwrap();
    assert_eq!(warranty.expires_at, at(2023, 3, 15));
    assert!(warranty.status_at(at(2024, 6, 1)).is_expired());
}

#[tokio::test]
async fn test_search_and_list_all() {
    let (service, _, _) = default_service();

    service.create(laptop_request(), true).await.unwrap();
    service
        .create(
            CreateTransactionRequest {
                product_name: Some("Office Chair".to_string()),
                buyer_number: Some("0899".to_string()),
                ..laptop_request()
            },
            true,
        )
        .await
        .unwrap();

    let hits = service.search("gaming").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].product_name, "Gaming Laptop");

    let hits = service.search("RINA").await.unwrap();
    assert_eq!(hits.len(), 2);

    assert!(service.search("nothing-like-this").await.unwrap().is_empty());

    let all = service.search("ALL").await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].created_at >= all[1].created_at);

    assert!(matches!(
        service.search("   ").await,
        Err(ServiceError::Validation(_))
    ));
}

#[tokio::test]
async fn test_missing_records_are_not_found() {
    let (service, _, _) = default_service();

    assert!(matches!(
        service.get_by_code("KNT-NOPE000000").await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.get_by_serial("SN-MISSING").await,
        Err(ServiceError::NotFound(_))
    ));
}
