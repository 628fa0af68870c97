//! # File Catalog
//!
//! The in-memory list of the signed-in user's files, reconciled against the
//! metadata store.
//!
//! ## Consistency
//!
//! Every mutation (`refresh`, `apply_insert`, `apply_removal`,
//! `attach_access_url`, `clear`) runs under one async mutex and publishes a
//! whole new list through a `watch` channel. Readers therefore only ever see
//! complete lists. A refresh keeps the mutex for the duration of its query,
//! so an optimistic insert that lands meanwhile is applied on top of the
//! refreshed list instead of being overwritten by it.
//!
//! A failed refresh leaves the previous list untouched.
//!
//! After [`clear`](FileCatalog::clear) the catalog is signed out: inserts
//! are rejected until a refresh (or [`open_for`](FileCatalog::open_for))
//! names the next owner, so an upload finishing after sign-out cannot
//! repopulate the list.

use crate::error::{Result, SyncError};
use crate::models::{FileRecord, RecordId};
use bridge_traits::{AccessUrl, MetadataStore};
use core_auth::UserId;
use core_runtime::events::{CoreEvent, EventBus, FileEvent, Notification};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

/// Shared, immutable view of the list.
pub type FileList = Arc<Vec<FileRecord>>;

struct CatalogState {
    owner: Option<UserId>,
    signed_out: bool,
    records: FileList,
}

/// Single owner of the cached file list.
pub struct FileCatalog {
    store: Arc<dyn MetadataStore>,
    collection: String,
    default_content_type: String,
    event_bus: EventBus,
    state: Mutex<CatalogState>,
    snapshot: watch::Sender<FileList>,
}

impl FileCatalog {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        collection: impl Into<String>,
        default_content_type: impl Into<String>,
        event_bus: EventBus,
    ) -> Self {
        let (snapshot, _) = watch::channel(FileList::default());
        Self {
            store,
            collection: collection.into(),
            default_content_type: default_content_type.into(),
            event_bus,
            state: Mutex::new(CatalogState {
                owner: None,
                signed_out: false,
                records: FileList::default(),
            }),
            snapshot,
        }
    }

    /// Replace the list with every record owned by `owner`.
    ///
    /// # Errors
    ///
    /// [`SyncError::Unavailable`] when the query fails. The cached list and
    /// its owner are left exactly as they were.
    #[instrument(skip(self), fields(owner_id = %owner))]
    pub async fn refresh(&self, owner: &UserId) -> Result<FileList> {
        let mut state = self.state.lock().await;

        let documents = match self
            .store
            .query_by_owner(&self.collection, owner.as_str())
            .await
        {
            Ok(documents) => documents,
            Err(e) => {
                warn!(error = %e, "Failed to load file list");
                let _ = self.event_bus.emit(CoreEvent::Files(FileEvent::RefreshFailed {
                    owner_id: owner.to_string(),
                    message: e.to_string(),
                }));
                self.event_bus.notify(Notification::error(
                    "Error Loading Files",
                    "Failed to load files. Please try refreshing.",
                ));
                return Err(SyncError::Unavailable(e.to_string()));
            }
        };

        let mut records: Vec<FileRecord> = documents
            .into_iter()
            .map(|document| FileRecord::from_document(document, &self.default_content_type))
            .filter(|record| {
                let own = &record.owner_id == owner;
                if !own {
                    warn!(record_id = %record.id, "Query returned a record of another owner");
                }
                own
            })
            .collect();
        sort_records(&mut records);

        // Keep URLs already resolved for records that are still present.
        for record in records.iter_mut() {
            if let Some(previous) = state.records.iter().find(|r| r.id == record.id) {
                record.access_url = previous.access_url.clone();
            }
        }

        let records = Arc::new(records);
        state.owner = Some(owner.clone());
        state.signed_out = false;
        state.records = Arc::clone(&records);
        self.snapshot.send_replace(Arc::clone(&records));

        info!(file_count = records.len(), "File list refreshed");
        let _ = self.event_bus.emit(CoreEvent::Files(FileEvent::ListRefreshed {
            owner_id: owner.to_string(),
            file_count: records.len(),
        }));

        Ok(records)
    }

    /// Add a record written by a successful upload.
    ///
    /// Inserting an id that is already present replaces that entry. A record
    /// of another owner is rejected, and so is every record while the
    /// catalog is signed out; a fresh catalog adopts the record's owner.
    #[instrument(skip(self, record), fields(record_id = %record.id))]
    pub async fn apply_insert(&self, record: FileRecord) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.signed_out {
            return Err(SyncError::SignedOut {
                record_id: record.id.to_string(),
            });
        }

        match &state.owner {
            Some(owner) if owner != &record.owner_id => {
                return Err(SyncError::ForeignOwner {
                    record_id: record.id.to_string(),
                    record_owner: record.owner_id.to_string(),
                    catalog_owner: owner.to_string(),
                });
            }
            Some(_) => {}
            None => state.owner = Some(record.owner_id.clone()),
        }

        let mut records: Vec<FileRecord> = state
            .records
            .iter()
            .filter(|r| r.id != record.id)
            .cloned()
            .collect();
        let event = FileEvent::FileAdded {
            record_id: record.id.to_string(),
            name: record.display_name.clone(),
            size_bytes: record.size_bytes,
        };
        records.push(record);
        sort_records(&mut records);

        self.publish(&mut state, records);
        let _ = self.event_bus.emit(CoreEvent::Files(event));
        Ok(())
    }

    /// Drop a record after a successful delete. Returns whether it was present.
    #[instrument(skip(self), fields(record_id = %id))]
    pub async fn apply_removal(&self, id: &RecordId) -> bool {
        let mut state = self.state.lock().await;

        let Some(removed) = state.records.iter().find(|r| &r.id == id).cloned() else {
            debug!("Record not in catalog");
            return false;
        };
        let records = state
            .records
            .iter()
            .filter(|r| &r.id != id)
            .cloned()
            .collect();

        self.publish(&mut state, records);
        let _ = self.event_bus.emit(CoreEvent::Files(FileEvent::FileRemoved {
            record_id: id.to_string(),
            name: removed.display_name,
        }));
        true
    }

    /// Remember a resolved access URL on a record. Returns whether it was present.
    pub async fn attach_access_url(&self, id: &RecordId, url: AccessUrl) -> bool {
        let mut state = self.state.lock().await;

        if !state.records.iter().any(|r| &r.id == id) {
            return false;
        }
        let records = state
            .records
            .iter()
            .map(|r| {
                if &r.id == id {
                    r.clone().with_access_url(url.clone())
                } else {
                    r.clone()
                }
            })
            .collect();

        self.publish(&mut state, records);
        true
    }

    /// Forget every record and the owner after sign-out.
    #[instrument(skip(self))]
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.owner = None;
        state.signed_out = true;
        self.publish(&mut state, Vec::new());
        let _ = self.event_bus.emit(CoreEvent::Files(FileEvent::Cleared));
    }

    /// Accept records of `owner` again after a sign-out, before the first
    /// refresh has succeeded. Does nothing unless the catalog is signed out.
    pub async fn open_for(&self, owner: &UserId) {
        let mut state = self.state.lock().await;
        if state.signed_out {
            state.signed_out = false;
            state.owner = Some(owner.clone());
        }
    }

    /// Current list.
    pub fn snapshot(&self) -> FileList {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Receiver notified with every new list.
    pub fn subscribe(&self) -> watch::Receiver<FileList> {
        self.snapshot.subscribe()
    }

    pub fn get(&self, id: &RecordId) -> Option<FileRecord> {
        self.snapshot.borrow().iter().find(|r| &r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// User whose files are cached, if any.
    pub async fn owner(&self) -> Option<UserId> {
        self.state.lock().await.owner.clone()
    }

    fn publish(&self, state: &mut CatalogState, records: Vec<FileRecord>) {
        let records = Arc::new(records);
        state.records = Arc::clone(&records);
        self.snapshot.send_replace(records);
    }
}

fn sort_records(records: &mut [FileRecord]) {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}
