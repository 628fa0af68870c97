//! In-memory backends shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    AccessUrl, BlobMetadata, BlobStore, Clock, FileDocument, InsertedDocument, LocalFile,
    MetadataStore, ProgressReporter, StoredDocument,
};
use chrono::{DateTime, Duration, Utc};
use core_runtime::events::{CoreEvent, EventBus, Notification};
use core_sync::{
    DeleteOrchestrator, FileCatalog, PreviewResolver, UploadOrchestrator, UploadSettings,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(base_time()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    Unauthorized,
    Canceled,
    Other,
}

impl Failure {
    fn to_error(self, context: &str) -> BridgeError {
        match self {
            Failure::NotFound => BridgeError::NotFound(context.to_string()),
            Failure::Unauthorized => BridgeError::Unauthorized(context.to_string()),
            Failure::Canceled => BridgeError::Canceled(context.to_string()),
            Failure::Other => BridgeError::OperationFailed(format!("{context}: backend fault")),
        }
    }
}

/// Blob store keyed by path.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, (LocalFile, DateTime<Utc>)>>,
    put_failures: Mutex<HashMap<String, Failure>>,
    delete_failure: Mutex<Option<Failure>>,
    url_failures: Mutex<HashMap<String, Failure>>,
    report_content_type: AtomicBool,
    put_delay_ms: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub put_calls: AtomicUsize,
    pub url_calls: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.report_content_type.store(true, Ordering::SeqCst);
        store
    }

    /// Fail every put of a file with this name.
    pub fn fail_put(&self, file_name: &str, failure: Failure) {
        self.put_failures
            .lock()
            .unwrap()
            .insert(file_name.to_string(), failure);
    }

    pub fn fail_delete(&self, failure: Failure) {
        *self.delete_failure.lock().unwrap() = Some(failure);
    }

    pub fn fail_url(&self, path: &str, failure: Failure) {
        self.url_failures
            .lock()
            .unwrap()
            .insert(path.to_string(), failure);
    }

    /// Stop echoing content types back in blob metadata.
    pub fn drop_content_types(&self) {
        self.report_content_type.store(false, Ordering::SeqCst);
    }

    pub fn set_put_delay_ms(&self, delay: usize) {
        self.put_delay_ms.store(delay, Ordering::SeqCst);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(path)
    }

    pub fn remove(&self, path: &str) {
        self.blobs.lock().unwrap().remove(path);
    }

    pub fn paths(&self) -> HashSet<String> {
        self.blobs.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, file: &LocalFile, progress: ProgressReporter) -> BridgeResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let total = file.size();
        progress.report(0, total);
        let delay = self.put_delay_ms.load(Ordering::SeqCst) as u64;
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        progress.report(total / 2, total);

        let failure = self.put_failures.lock().unwrap().get(&file.name).copied();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(failure) = failure {
            return Err(failure.to_error(path));
        }

        progress.report(total, total);
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), (file.clone(), base_time()));
        Ok(())
    }

    async fn get_metadata(&self, path: &str) -> BridgeResult<BlobMetadata> {
        let blobs = self.blobs.lock().unwrap();
        let (file, created_at) = blobs
            .get(path)
            .ok_or_else(|| BridgeError::NotFound(path.to_string()))?;
        Ok(BlobMetadata {
            path: path.to_string(),
            size: file.size(),
            content_type: if self.report_content_type.load(Ordering::SeqCst) {
                file.content_type.clone()
            } else {
                None
            },
            created_at: *created_at,
        })
    }

    async fn get_access_url(&self, path: &str) -> BridgeResult<AccessUrl> {
        self.url_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.url_failures.lock().unwrap().get(path).copied() {
            return Err(failure.to_error(path));
        }
        if !self.contains(path) {
            return Err(BridgeError::NotFound(path.to_string()));
        }
        let call = self.url_calls.load(Ordering::SeqCst);
        Ok(AccessUrl::new(format!("https://blobs.test/{path}?token={call}"))
            .expiring_at(base_time() + Duration::hours(1)))
    }

    async fn delete(&self, path: &str) -> BridgeResult<()> {
        if let Some(failure) = *self.delete_failure.lock().unwrap() {
            return Err(failure.to_error(path));
        }
        self.blobs
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BridgeError::NotFound(path.to_string()))
    }
}

/// Document store holding one collection per name.
#[derive(Default)]
pub struct MemoryMetadataStore {
    documents: Mutex<Vec<(String, StoredDocument)>>,
    next_id: AtomicUsize,
    insert_failures: Mutex<HashSet<String>>,
    fail_queries: AtomicBool,
    fail_deletes: AtomicBool,
    query_delay_ms: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail inserts of documents with this file name.
    pub fn fail_insert(&self, file_name: &str) {
        self.insert_failures
            .lock()
            .unwrap()
            .insert(file_name.to_string());
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_query_delay_ms(&self, delay: usize) {
        self.query_delay_ms.store(delay, Ordering::SeqCst);
    }

    pub fn ids(&self) -> Vec<String> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .map(|(_, d)| d.id.clone())
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids().iter().any(|existing| existing == id)
    }

    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn query_by_owner(&self, collection: &str, owner_id: &str) -> BridgeResult<Vec<StoredDocument>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("query unavailable".to_string()));
        }
        let found: Vec<StoredDocument> = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, d)| c == collection && d.fields.owner_id == owner_id)
            .map(|(_, d)| d.clone())
            .collect();

        let delay = self.query_delay_ms.load(Ordering::SeqCst) as u64;
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        Ok(found)
    }

    async fn insert(&self, collection: &str, document: FileDocument) -> BridgeResult<InsertedDocument> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.insert_failures.lock().unwrap().contains(&document.name) {
            return Err(BridgeError::OperationFailed("write quota exceeded".to_string()));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("doc{n}");
        let created_at = base_time() + Duration::seconds(n as i64);
        self.documents.lock().unwrap().push((
            collection.to_string(),
            StoredDocument {
                id: id.clone(),
                fields: document,
                created_at: Some(created_at),
            },
        ));
        Ok(InsertedDocument { id, created_at })
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> BridgeResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("delete unavailable".to_string()));
        }
        self.documents
            .lock()
            .unwrap()
            .retain(|(c, d)| !(c == collection && d.id == id));
        Ok(())
    }
}

/// Every core-sync component wired to the in-memory backends.
pub struct Harness {
    pub blobs: Arc<MemoryBlobStore>,
    pub metadata: Arc<MemoryMetadataStore>,
    pub clock: Arc<ManualClock>,
    pub bus: EventBus,
    pub catalog: Arc<FileCatalog>,
    pub uploads: UploadOrchestrator,
    pub deletes: DeleteOrchestrator,
    pub previews: PreviewResolver,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(UploadSettings::default())
    }

    pub fn with_settings(settings: UploadSettings) -> Self {
        let blobs = Arc::new(MemoryBlobStore::new());
        let metadata = Arc::new(MemoryMetadataStore::new());
        let clock = Arc::new(ManualClock::new());
        let bus = EventBus::new(256);
        let catalog = Arc::new(FileCatalog::new(
            metadata.clone(),
            settings.files_collection.clone(),
            settings.default_content_type.clone(),
            bus.clone(),
        ));
        let uploads = UploadOrchestrator::new(
            blobs.clone(),
            metadata.clone(),
            catalog.clone(),
            bus.clone(),
            clock.clone(),
            settings.clone(),
        );
        let deletes = DeleteOrchestrator::new(
            blobs.clone(),
            metadata.clone(),
            catalog.clone(),
            bus.clone(),
            settings.files_collection.clone(),
        );
        let previews = PreviewResolver::new(blobs.clone(), catalog.clone(), bus.clone(), clock.clone());

        Self {
            blobs,
            metadata,
            clock,
            bus,
            catalog,
            uploads,
            deletes,
            previews,
        }
    }
}

pub fn text_file(name: &str, body: &str) -> LocalFile {
    LocalFile::new(name, body.to_string().into_bytes()).with_content_type("text/plain")
}

pub fn drain(receiver: &mut broadcast::Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

pub fn notifications(events: &[CoreEvent]) -> Vec<Notification> {
    events
        .iter()
        .filter_map(|event| event.as_notification().cloned())
        .collect()
}
