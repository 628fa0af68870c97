//! The drive facade.

use std::sync::Arc;

use bridge_traits::storage::LocalFile;
use core_auth::{AuthError, AuthManager, SessionProvider, SessionState, SessionUser, UserId};
use core_runtime::config::DriveConfig;
use core_runtime::events::{CoreEvent, EventBus};
use core_sync::{
    ConfirmedDelete, DeleteOrchestrator, DeleteResult, DownloadLink, FileCatalog, FileList,
    FileRecord, Preview, PreviewResolver, SyncError, UploadBatch, UploadOrchestrator,
    UploadOutcome, UploadSettings,
};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{CoreError, Result};

enum Lifecycle {
    Idle,
    Running(JoinHandle<()>, CancellationToken),
    Stopped,
}

struct Inner {
    event_bus: EventBus,
    session: SessionProvider,
    auth: AuthManager,
    catalog: Arc<FileCatalog>,
    uploads: UploadOrchestrator,
    deletes: DeleteOrchestrator,
    previews: PreviewResolver,
    /// Owner the catalog was last loaded for
    loaded: Mutex<Option<UserId>>,
}

impl Inner {
    /// Bring the catalog in line with `user`: load their files, or clear the
    /// list when nobody is signed in.
    async fn sync_catalog(&self, user: Option<UserId>) {
        let mut loaded = self.loaded.lock().await;
        if *loaded == user {
            return;
        }

        match &user {
            Some(owner) => {
                self.catalog.open_for(owner).await;
                if let Err(e) = self.catalog.refresh(owner).await {
                    warn!(owner_id = %owner, error = %e, "Initial file list load failed");
                }
            }
            None => {
                self.catalog.clear().await;
                self.previews.clear_cache().await;
            }
        }
        *loaded = user;
    }

    async fn wait_for_session(&self, expected: Option<&UserId>) {
        let mut receiver = self.session.subscribe();
        let _ = receiver
            .wait_for(|state| !state.is_resolving && state.user_id() == expected)
            .await;
    }
}

/// One signed-in drive: session, file list, uploads, deletes and previews.
///
/// # Lifecycle
///
/// 1. [`DriveService::new`] wires the configured bridges together.
/// 2. [`start`](DriveService::start) subscribes to the session observer,
///    waits for the first session observation and loads that user's files.
///    From then on every sign-in reloads the list and every sign-out clears it.
/// 3. [`shutdown`](DriveService::shutdown) detaches from the observer. The
///    service cannot be started again.
///
/// Logging is configured by the host through
/// [`core_runtime::logging::init_logging`].
///
/// # Example
///
/// ```ignore
/// let service = DriveService::new(config)?;
/// service.start().await?;
///
/// service.sign_in("ada@example.com", "secret1").await?;
/// let batch = service.upload(files)?;
/// let report = batch.finish().await;
/// ```
pub struct DriveService {
    inner: Arc<Inner>,
    lifecycle: Mutex<Lifecycle>,
}

impl DriveService {
    pub fn new(config: DriveConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let catalog = Arc::new(FileCatalog::new(
            config.metadata_store.clone(),
            config.files_collection.clone(),
            config.default_content_type.clone(),
            event_bus.clone(),
        ));
        let uploads = UploadOrchestrator::new(
            config.blob_store.clone(),
            config.metadata_store.clone(),
            catalog.clone(),
            event_bus.clone(),
            config.clock.clone(),
            UploadSettings::from_config(&config),
        );
        let deletes = DeleteOrchestrator::new(
            config.blob_store.clone(),
            config.metadata_store.clone(),
            catalog.clone(),
            event_bus.clone(),
            config.files_collection.clone(),
        );
        let previews = PreviewResolver::new(
            config.blob_store.clone(),
            catalog.clone(),
            event_bus.clone(),
            config.clock.clone(),
        )
        .with_url_cache_capacity(config.url_cache_capacity);

        Ok(Self {
            inner: Arc::new(Inner {
                session: SessionProvider::new(config.identity_provider.clone(), event_bus.clone()),
                auth: AuthManager::new(config.identity_provider.clone(), event_bus.clone()),
                event_bus,
                catalog,
                uploads,
                deletes,
                previews,
                loaded: Mutex::new(None),
            }),
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }

    /// Start following the session.
    ///
    /// Returns once the first session observation has been applied and, when
    /// a user is signed in, their file list has been loaded.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if !matches!(*lifecycle, Lifecycle::Idle) {
            return Err(AuthError::AlreadyStarted.into());
        }

        self.inner.session.start().await?;
        let state = self.inner.session.wait_until_resolved().await;
        self.inner.sync_catalog(state.user_id().cloned()).await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(follow_session(
            Arc::clone(&self.inner),
            self.inner.session.subscribe(),
            cancel.clone(),
        ));
        *lifecycle = Lifecycle::Running(handle, cancel);

        info!(signed_in = state.is_signed_in(), "Drive service started");
        Ok(())
    }

    /// Stop following the session. The last known state stays readable.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if let Lifecycle::Running(handle, cancel) =
            std::mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "Session follower ended abnormally");
            }
        }
        self.inner.session.shutdown().await;
        info!("Drive service stopped");
    }

    async fn ensure_running(&self) -> Result<()> {
        match *self.lifecycle.lock().await {
            Lifecycle::Running(..) => Ok(()),
            Lifecycle::Idle => Err(CoreError::InitializationFailed(
                "DriveService::start must be called first".to_string(),
            )),
            Lifecycle::Stopped => Err(CoreError::InitializationFailed(
                "DriveService has been shut down".to_string(),
            )),
        }
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Create an account. Returns once the session and file list reflect it.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SessionUser> {
        self.ensure_running().await?;
        let user = self.inner.auth.sign_up(email, password).await?;
        self.settle(Some(&user.id)).await;
        Ok(user)
    }

    /// Sign in. Returns once the session and file list reflect the user.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionUser> {
        self.ensure_running().await?;
        let user = self.inner.auth.sign_in(email, password).await?;
        self.settle(Some(&user.id)).await;
        Ok(user)
    }

    /// Sign out and clear the cached file list.
    pub async fn sign_out(&self) -> Result<()> {
        self.ensure_running().await?;
        self.inner.auth.sign_out().await?;
        self.settle(None).await;
        Ok(())
    }

    async fn settle(&self, user: Option<&UserId>) {
        self.inner.wait_for_session(user).await;
        self.inner.sync_catalog(user.cloned()).await;
    }

    pub fn session(&self) -> SessionState {
        self.inner.session.state()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<SessionState> {
        self.inner.session.subscribe()
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.inner.session.current_user()
    }

    fn require_user(&self) -> Result<SessionUser> {
        Ok(self.inner.session.require_user()?)
    }

    // ========================================================================
    // Files
    // ========================================================================

    /// Reload the signed-in user's file list.
    pub async fn refresh(&self) -> Result<FileList> {
        let user = self.require_user()?;
        Ok(self.inner.catalog.refresh(&user.id).await?)
    }

    pub fn files(&self) -> FileList {
        self.inner.catalog.snapshot()
    }

    pub fn subscribe_files(&self) -> watch::Receiver<FileList> {
        self.inner.catalog.subscribe()
    }

    /// Start uploading `files` for the signed-in user.
    pub fn upload(&self, files: Vec<LocalFile>) -> Result<UploadBatch> {
        let user = self.require_user()?;
        Ok(self.inner.uploads.submit(files, &user.id))
    }

    pub async fn upload_one(&self, file: LocalFile) -> Result<UploadOutcome> {
        let user = self.require_user()?;
        Ok(self.inner.uploads.upload_one(file, &user.id).await)
    }

    /// Text to show before building a [`ConfirmedDelete`].
    pub fn confirmation_prompt(&self, record: &FileRecord) -> String {
        core_sync::confirmation_prompt(record)
    }

    pub async fn delete(&self, request: ConfirmedDelete) -> Result<DeleteResult> {
        let user = self.require_user()?;
        self.ensure_owned(&user, request.record())?;
        Ok(self.inner.deletes.delete(request).await?)
    }

    pub async fn preview(&self, record: &FileRecord) -> Result<Preview> {
        let user = self.require_user()?;
        self.ensure_owned(&user, record)?;
        Ok(self.inner.previews.preview(record).await?)
    }

    pub async fn download_link(&self, record: &FileRecord) -> Result<DownloadLink> {
        let user = self.require_user()?;
        self.ensure_owned(&user, record)?;
        Ok(self.inner.previews.download_link(record).await?)
    }

    fn ensure_owned(&self, user: &SessionUser, record: &FileRecord) -> Result<()> {
        if record.owner_id == user.id {
            return Ok(());
        }
        Err(SyncError::ForeignOwner {
            record_id: record.id.to_string(),
            record_owner: record.owner_id.to_string(),
            catalog_owner: user.id.to_string(),
        }
        .into())
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.inner.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }
}

impl Drop for DriveService {
    fn drop(&mut self) {
        if let Ok(lifecycle) = self.lifecycle.try_lock() {
            if let Lifecycle::Running(_, cancel) = &*lifecycle {
                cancel.cancel();
            }
        }
    }
}

async fn follow_session(
    inner: Arc<Inner>,
    mut session: watch::Receiver<SessionState>,
    cancel: CancellationToken,
) {
    loop {
        let state = session.borrow_and_update().clone();
        if !state.is_resolving {
            inner.sync_catalog(state.user_id().cloned()).await;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = session.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Session follower stopped");
}
