//! # Upload Orchestrator
//!
//! Drives each selected file through put → read back → record → cache.
//!
//! ## Workflow
//!
//! For every file of a batch:
//! 1. Compute `{storage_root}/{owner}/{millis}-{random}_{name}`
//! 2. Stream the bytes to the blob store, tracking progress
//! 3. Read the stored blob's metadata back from the blob store
//! 4. Insert a record into the metadata store
//! 5. Add the record to the [`FileCatalog`]
//!
//! Files run concurrently, at most `max_concurrent_uploads` at a time. One
//! file's failure never cancels another. Outcomes are delivered in completion
//! order, each only after its record is in the catalog.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut batch = uploads.submit(files, &owner);
//! while let Some(outcome) = batch.next_outcome().await {
//!     println!("{}: {}", outcome.name, outcome.success);
//! }
//! let report = batch.finish().await;
//! println!("{} uploaded, {} failed", report.succeeded(), report.failed());
//! ```

use crate::catalog::FileCatalog;
use crate::error::UploadError;
use crate::models::{
    destination_path, upload_discriminator, BatchId, FileRecord, RecordId, UploadOutcome,
    UploadState, UploadTask,
};
use crate::notify;
use bridge_traits::{BlobStore, Clock, FileDocument, LocalFile, MetadataStore, ProgressReporter};
use core_auth::UserId;
use core_runtime::config::DriveConfig;
use core_runtime::events::{CoreEvent, EventBus, Notification, UploadEvent};
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Upload settings taken from [`DriveConfig`].
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub storage_root: String,
    pub files_collection: String,
    pub default_content_type: String,
    pub max_concurrent_uploads: usize,
}

impl UploadSettings {
    pub fn from_config(config: &DriveConfig) -> Self {
        Self {
            storage_root: config.storage_root.clone(),
            files_collection: config.files_collection.clone(),
            default_content_type: config.default_content_type.clone(),
            max_concurrent_uploads: config.max_concurrent_uploads,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            storage_root: core_runtime::config::DEFAULT_STORAGE_ROOT.to_string(),
            files_collection: core_runtime::config::DEFAULT_FILES_COLLECTION.to_string(),
            default_content_type: core_runtime::config::DEFAULT_CONTENT_TYPE.to_string(),
            max_concurrent_uploads: 4,
        }
    }
}

/// Starts upload batches.
#[derive(Clone)]
pub struct UploadOrchestrator {
    inner: Arc<Pipeline>,
}

struct Pipeline {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    catalog: Arc<FileCatalog>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    settings: UploadSettings,
}

struct FileJob {
    index: usize,
    path: String,
    file: LocalFile,
}

impl UploadOrchestrator {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        catalog: Arc<FileCatalog>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Pipeline {
                blobs,
                metadata,
                catalog,
                event_bus,
                clock,
                settings,
            }),
        }
    }

    /// Start uploading `files` for `owner` and return a handle to the batch.
    ///
    /// Must be called from within a Tokio runtime. An empty batch completes
    /// immediately without contacting the backend.
    #[instrument(skip(self, files), fields(owner_id = %owner, file_count = files.len()))]
    pub fn submit(&self, files: Vec<LocalFile>, owner: &UserId) -> UploadBatch {
        let batch_id = BatchId::new();
        let millis = self.inner.clock.unix_timestamp_millis();

        let jobs: Vec<FileJob> = files
            .into_iter()
            .enumerate()
            .map(|(index, file)| FileJob {
                index,
                path: destination_path(
                    &self.inner.settings.storage_root,
                    owner,
                    upload_discriminator(millis),
                    &file.name,
                ),
                file,
            })
            .collect();
        let tasks: Vec<UploadTask> = jobs
            .iter()
            .map(|job| UploadTask::new(job.index, job.file.name.clone(), job.path.clone()))
            .collect();

        let (task_tx, task_rx) = watch::channel(tasks.clone());
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        if jobs.is_empty() {
            debug!("Empty upload batch");
            return UploadBatch::new(batch_id, tasks, task_rx, outcome_rx, None);
        }

        info!(batch_id = %batch_id, "Upload batch started");
        let _ = self.inner.event_bus.emit(CoreEvent::Upload(UploadEvent::BatchStarted {
            batch_id: batch_id.to_string(),
            file_count: jobs.len(),
        }));

        let pipeline = Arc::clone(&self.inner);
        let owner = owner.clone();
        let driver = tokio::spawn(async move {
            pipeline
                .run_batch(batch_id, owner, jobs, task_tx, outcome_tx)
                .await;
        });

        UploadBatch::new(batch_id, tasks, task_rx, outcome_rx, Some(driver))
    }

    /// Upload one file and wait for its outcome.
    pub async fn upload_one(&self, file: LocalFile, owner: &UserId) -> UploadOutcome {
        let name = file.name.clone();
        self.submit(vec![file], owner)
            .finish()
            .await
            .outcomes
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                UploadOutcome::failed(name, UploadError::TransferFailed("no outcome".to_string()))
            })
    }
}

impl Pipeline {
    async fn run_batch(
        &self,
        batch_id: BatchId,
        owner: UserId,
        jobs: Vec<FileJob>,
        tasks: watch::Sender<Vec<UploadTask>>,
        outcomes: mpsc::UnboundedSender<UploadOutcome>,
    ) {
        let limit = self.settings.max_concurrent_uploads.max(1);
        let mut finished = Vec::with_capacity(jobs.len());

        let mut running = stream::iter(jobs)
            .map(|job| self.upload_file(batch_id, &owner, job, &tasks))
            .buffer_unordered(limit);

        while let Some(outcome) = running.next().await {
            // The batch handle may have been dropped; the uploads still finish.
            let _ = outcomes.send(outcome.clone());
            finished.push(outcome);
        }
        drop(running);

        let succeeded = finished.iter().filter(|o| o.success).count();
        let failed = finished.len() - succeeded;
        info!(batch_id = %batch_id, succeeded, failed, "Upload batch completed");
        let _ = self.event_bus.emit(CoreEvent::Upload(UploadEvent::BatchCompleted {
            batch_id: batch_id.to_string(),
            succeeded,
            failed,
        }));
        for notification in notify::upload_notifications(&finished) {
            self.event_bus.notify(notification);
        }
    }

    #[instrument(skip(self, owner, job, tasks), fields(file = %job.file.name, storage_path = %job.path))]
    async fn upload_file(
        &self,
        batch_id: BatchId,
        owner: &UserId,
        job: FileJob,
        tasks: &watch::Sender<Vec<UploadTask>>,
    ) -> UploadOutcome {
        let index = job.index;
        let name = job.file.name.clone();

        let outcome = match self.store_and_record(batch_id, owner, &job, tasks).await {
            Ok(record) => {
                tasks.send_modify(|all| all[index].state = UploadState::Succeeded);
                UploadOutcome::succeeded(name, record)
            }
            Err(e) => {
                warn!(error = %e, "Upload failed");
                tasks.send_modify(|all| all[index].state = UploadState::Failed(e.clone()));
                UploadOutcome::failed(name, e)
            }
        };

        let _ = self.event_bus.emit(CoreEvent::Upload(UploadEvent::FileFinished {
            batch_id: batch_id.to_string(),
            file_name: outcome.name.clone(),
            success: outcome.success,
            error: outcome.error.as_ref().map(|e| e.to_string()),
        }));
        outcome
    }

    async fn store_and_record(
        &self,
        batch_id: BatchId,
        owner: &UserId,
        job: &FileJob,
        tasks: &watch::Sender<Vec<UploadTask>>,
    ) -> Result<FileRecord, UploadError> {
        let index = job.index;
        tasks.send_if_modified(|all| all[index].advance(0.0));

        let (reporter, mut samples) = ProgressReporter::channel();
        let transfer = self.blobs.put(&job.path, &job.file, reporter);
        let track = async {
            let mut last_percent = 0u8;
            while let Some(sample) = samples.recv().await {
                let fraction = sample.fraction();
                if !tasks.send_if_modified(|all| all[index].advance(fraction)) {
                    continue;
                }
                let percent = (fraction * 100.0).round() as u8;
                if percent > last_percent {
                    last_percent = percent;
                    let _ = self.event_bus.emit(CoreEvent::Upload(UploadEvent::Progress {
                        batch_id: batch_id.to_string(),
                        file_name: job.file.name.clone(),
                        percent,
                    }));
                }
            }
        };
        let (stored, ()) = tokio::join!(transfer, track);
        stored.map_err(UploadError::from_transfer)?;
        tasks.send_if_modified(|all| all[index].advance(1.0));

        let blob = self
            .blobs
            .get_metadata(&job.path)
            .await
            .map_err(UploadError::from_transfer)?;

        let content_type = blob
            .content_type
            .clone()
            .filter(|ct| !ct.trim().is_empty())
            .or_else(|| job.file.content_type.clone())
            .unwrap_or_else(|| self.settings.default_content_type.clone());

        let document = FileDocument {
            owner_id: owner.to_string(),
            name: job.file.name.clone(),
            full_path: job.path.clone(),
            size: blob.size,
            content_type: content_type.clone(),
            time_created: blob.created_at,
        };

        let inserted = self
            .metadata
            .insert(&self.settings.files_collection, document)
            .await
            .map_err(|e| {
                error!(error = %e, "Blob stored but its record was not written; blob is orphaned");
                UploadError::MetadataWriteFailed {
                    storage_path: job.path.clone(),
                    reason: e.to_string(),
                }
            })?;

        let record = FileRecord {
            id: RecordId::new(inserted.id),
            owner_id: owner.clone(),
            display_name: job.file.name.clone(),
            storage_path: job.path.clone(),
            size_bytes: blob.size,
            content_type,
            created_at: inserted.created_at,
            blob_created_at: Some(blob.created_at),
            access_url: None,
        };

        if let Err(e) = self.catalog.apply_insert(record.clone()).await {
            // The catalog was cleared or switched users while this file was in flight.
            warn!(error = %e, "Uploaded record not added to catalog");
        }

        debug!(record_id = %record.id, size = record.size_bytes, "File uploaded");
        Ok(record)
    }
}

/// Handle to a running upload batch.
///
/// Dropping the handle does not stop the uploads.
pub struct UploadBatch {
    id: BatchId,
    initial: Vec<UploadTask>,
    tasks: watch::Receiver<Vec<UploadTask>>,
    receiver: mpsc::UnboundedReceiver<UploadOutcome>,
    received: Vec<UploadOutcome>,
    driver: Option<JoinHandle<()>>,
}

impl UploadBatch {
    fn new(
        id: BatchId,
        initial: Vec<UploadTask>,
        tasks: watch::Receiver<Vec<UploadTask>>,
        receiver: mpsc::UnboundedReceiver<UploadOutcome>,
        driver: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            id,
            initial,
            tasks,
            receiver,
            received: Vec::new(),
            driver,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Number of files submitted.
    pub fn len(&self) -> usize {
        self.initial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.initial.is_empty()
    }

    /// Per-file state, updated as transfers progress.
    pub fn tasks(&self) -> watch::Receiver<Vec<UploadTask>> {
        self.tasks.clone()
    }

    /// Wait for the next file to finish. `None` once every outcome was delivered.
    pub async fn next_outcome(&mut self) -> Option<UploadOutcome> {
        let outcome = self.receiver.recv().await?;
        self.received.push(outcome.clone());
        Some(outcome)
    }

    /// Outcomes in completion order.
    pub fn outcomes(&mut self) -> impl Stream<Item = UploadOutcome> + '_ {
        stream::unfold(self, |batch| async move {
            let outcome = batch.next_outcome().await?;
            Some((outcome, batch))
        })
    }

    /// Wait for the whole batch and collect every outcome, including those
    /// already taken through [`next_outcome`](Self::next_outcome).
    pub async fn finish(mut self) -> UploadReport {
        while self.next_outcome().await.is_some() {}

        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                error!(batch_id = %self.id, error = %e, "Upload batch task failed");
            }
        }

        // A file can only lack an outcome if the batch task died.
        let mut delivered: Vec<&str> = self.received.iter().map(|o| o.name.as_str()).collect();
        let mut missing = Vec::new();
        for task in &self.initial {
            match delivered.iter().position(|name| *name == task.local_name) {
                Some(position) => {
                    delivered.swap_remove(position);
                }
                None => missing.push(UploadOutcome::failed(
                    task.local_name.clone(),
                    UploadError::TransferFailed("upload was interrupted".to_string()),
                )),
            }
        }
        self.received.extend(missing);

        UploadReport {
            batch_id: self.id,
            outcomes: self.received,
        }
    }
}

/// Every outcome of a finished batch.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub batch_id: BatchId,
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.name.as_str())
            .collect()
    }

    /// Records added by this batch.
    pub fn records(&self) -> Vec<&FileRecord> {
        self.outcomes.iter().filter_map(|o| o.record.as_ref()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// The notifications published when the batch completed.
    pub fn notifications(&self) -> Vec<Notification> {
        notify::upload_notifications(&self.outcomes)
    }
}
