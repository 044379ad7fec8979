use std::sync::Arc;
use std::time::Duration;

use pseudo_core::next_local_id;
use pseudo_remote::{FileUpdate, RemoteError, RemoteFileClient};
use tokio::sync::Mutex as AsyncMutex;

use crate::{ErrorClass, SessionError};


/// Listing text shown in place of the file list while signed out.
pub const ANONYMOUS_PLACEHOLDER: &str = "sign in to manage your files";

const DEFAULT_FILE_ID: &str = "default";
const DEFAULT_FILE_NAME: &str = "untitled.pseudo";
const DEFAULT_FILE_CONTENT: &str =
    "DECLARE x : INTEGER\nx <- 10\nOUTPUT \"Hello, World!\"\nOUTPUT \"x =\", x";
const NEW_FILE_CONTENT: &str = "// new file\n";
const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Tunables for [`FileSessionManager`] and its autosave loop.
pub struct FileSessionConfig {
    pub autosave_interval: Duration,
    pub default_file_name: String,
    pub default_file_content: String,
    pub new_file_content: String,
}

impl Default for FileSessionConfig {
    fn default() -> Self {
        Self {
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            default_file_name: DEFAULT_FILE_NAME.to_string(),
            default_file_content: DEFAULT_FILE_CONTENT.to_string(),
            new_file_content: NEW_FILE_CONTENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Cached document body; remote files start out `NotLoaded` until first opened.
pub enum FileContent {
    NotLoaded,
    Loaded(String),
}

impl FileContent {
    pub fn as_loaded(&self) -> Option<&str> {
        match self {
            Self::NotLoaded => None,
            Self::Loaded(content) => Some(content),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub content: FileContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListItem {
    pub id: String,
    pub name: String,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What the file list panel renders.
pub enum FileListing {
    SignInPlaceholder,
    /// Signed in, but the account's files have not loaded yet.
    Unavailable,
    Entries(Vec<FileListItem>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Result of a save; remote failures are reported here rather than as errors.
pub enum SaveOutcome {
    /// Nothing to persist.
    Skipped,
    /// Written to the cache only (anonymous, or signed in before the files loaded).
    LocalOnly,
    Synced,
    /// Cached locally; the remote write failed and will be retried by the next save.
    SyncFailed,
}

/// File manager shared between the UI and the autosave task.
pub type SharedFileSession = Arc<AsyncMutex<FileSessionManager>>;

pub fn shared_file_session(manager: FileSessionManager) -> SharedFileSession {
    Arc::new(AsyncMutex::new(manager))
}

/// Owns the document cache, the current-file pointer, and the live editor buffer.
///
/// Remote persistence is only attempted while remote sync is enabled, which
/// [`SessionModeController`](crate::SessionModeController) toggles on login
/// and logout, and only once [`load_all`](Self::load_all) has replaced the
/// anonymous cache with the account's files. Until then the next autosave tick
/// or file operation retries the load.
pub struct FileSessionManager {
    remote: Arc<dyn RemoteFileClient>,
    config: FileSessionConfig,
    files: Vec<FileEntry>,
    current: Option<String>,
    buffer: String,
    remote_sync: bool,
    remote_loaded: bool,
}

impl FileSessionManager {
    /// Starts in anonymous mode with the single default document open.
    pub fn new(remote: Arc<dyn RemoteFileClient>, config: FileSessionConfig) -> Self {
        let buffer = config.default_file_content.clone();
        let files = vec![FileEntry {
            id: DEFAULT_FILE_ID.to_string(),
            name: config.default_file_name.clone(),
            content: FileContent::Loaded(buffer.clone()),
        }];
        Self {
            remote,
            config,
            files,
            current: Some(DEFAULT_FILE_ID.to_string()),
            buffer,
            remote_sync: false,
            remote_loaded: false,
        }
    }

    pub fn config(&self) -> &FileSessionConfig {
        &self.config
    }

    pub fn is_remote_synced(&self) -> bool {
        self.remote_sync
    }

    /// Signed in, but the remote listing has not been loaded yet.
    pub fn is_reload_pending(&self) -> bool {
        self.remote_sync && !self.remote_loaded
    }

    fn remote_ready(&self) -> bool {
        self.remote_sync && self.remote_loaded
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_file(&self) -> Option<&FileEntry> {
        self.current.as_deref().and_then(|id| self.file(id))
    }

    pub fn file(&self, id: &str) -> Option<&FileEntry> {
        self.files.iter().find(|file| file.id == id)
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The live editor text, which may be ahead of the cached copy.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn set_buffer(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
    }

    pub fn listing(&self) -> FileListing {
        if !self.remote_sync {
            return FileListing::SignInPlaceholder;
        }
        if !self.remote_loaded {
            return FileListing::Unavailable;
        }
        FileListing::Entries(
            self.files
                .iter()
                .map(|file| FileListItem {
                    id: file.id.clone(),
                    name: file.name.clone(),
                    is_current: self.current.as_deref() == Some(file.id.as_str()),
                })
                .collect(),
        )
    }

    pub(crate) fn enable_remote_sync(&mut self) {
        self.remote_sync = true;
        self.remote_loaded = false;
    }

    /// Drops remote state and keeps the open buffer as the only local document.
    pub(crate) fn enter_anonymous(&mut self) {
        self.remote_sync = false;
        self.remote_loaded = false;
        self.files = vec![FileEntry {
            id: DEFAULT_FILE_ID.to_string(),
            name: self.config.default_file_name.clone(),
            content: FileContent::Loaded(self.buffer.clone()),
        }];
        self.current = Some(DEFAULT_FILE_ID.to_string());
    }

    /// Replaces the cache with the remote listing and opens the first file.
    ///
    /// Anonymous content is discarded, not uploaded. An empty listing creates
    /// exactly one remote file. A failure leaves the previous cache in place,
    /// and a cache that never loaded is still never written to the service.
    pub async fn load_all(&mut self) -> Result<(), SessionError> {
        if !self.remote_sync {
            return Ok(());
        }

        let listing = self.remote.list_files().await.map_err(|error| {
            log_remote_failure("list files", &error);
            error
        })?;
        tracing::debug!(count = listing.len(), "remote file listing loaded");

        let previous_files = std::mem::take(&mut self.files);
        let previous_current = self.current.take();
        let previously_loaded = std::mem::replace(&mut self.remote_loaded, true);
        if listing.is_empty() {
            if let Err(error) = self.create_inner().await {
                self.files = previous_files;
                self.current = previous_current;
                self.remote_loaded = previously_loaded;
                return Err(error);
            }
            return Ok(());
        }

        self.files = listing
            .into_iter()
            .map(|summary| FileEntry {
                id: summary.id,
                name: summary.name,
                content: FileContent::NotLoaded,
            })
            .collect();
        let first = self.files[0].id.clone();
        self.switch_inner(&first, true).await
    }

    async fn ensure_loaded(&mut self) -> Result<(), SessionError> {
        if self.is_reload_pending() {
            self.load_all().await?;
        }
        Ok(())
    }

    /// Moves the current-file pointer, saving the outgoing buffer first unless `skip_save`.
    ///
    /// A failed remote save or fetch never blocks the switch; a failed fetch
    /// opens the file with an empty buffer.
    pub async fn switch_to(&mut self, id: &str, skip_save: bool) -> Result<(), SessionError> {
        self.ensure_loaded().await?;
        self.switch_inner(id, skip_save).await
    }

    async fn switch_inner(&mut self, id: &str, skip_save: bool) -> Result<(), SessionError> {
        if self.file(id).is_none() {
            return Err(SessionError::UnknownFile(id.to_string()));
        }
        if !skip_save {
            self.save_current().await;
        }
        self.current = Some(id.to_string());

        let content = match self.file(id).map(|file| &file.content) {
            Some(FileContent::Loaded(content)) => content.clone(),
            _ => {
                let content = self.fetch_content(id).await;
                if let Some(entry) = self.entry_mut(id) {
                    entry.content = FileContent::Loaded(content.clone());
                }
                content
            }
        };
        self.buffer = content;
        tracing::debug!(file_id = id, skip_save, "switched current file");
        Ok(())
    }

    /// Persists the live buffer into the current file.
    pub async fn save_current(&mut self) -> SaveOutcome {
        let Some(id) = self.current.clone() else {
            return SaveOutcome::Skipped;
        };
        let content = self.buffer.clone();
        if let Some(entry) = self.entry_mut(&id) {
            entry.content = FileContent::Loaded(content.clone());
        }
        self.persist(&id, content).await
    }

    /// Saves `id`: the live buffer when it is current, otherwise its cached content.
    pub async fn save(&mut self, id: &str) -> Result<SaveOutcome, SessionError> {
        let Some(entry) = self.file(id) else {
            return Err(SessionError::UnknownFile(id.to_string()));
        };
        if self.current.as_deref() == Some(id) {
            return Ok(self.save_current().await);
        }
        match entry.content.as_loaded() {
            Some(content) if self.remote_ready() => {
                let content = content.to_string();
                Ok(self.persist(id, content).await)
            }
            _ => Ok(SaveOutcome::Skipped),
        }
    }

    /// One autosave firing; only acts while remote sync is on and a file is open.
    ///
    /// While the remote listing is still missing the tick retries the load
    /// instead of saving.
    pub async fn autosave_tick(&mut self) -> SaveOutcome {
        if !self.remote_sync {
            return SaveOutcome::Skipped;
        }
        if !self.remote_loaded {
            if let Err(error) = self.load_all().await {
                tracing::debug!(%error, "remote file listing still unavailable");
            }
            return SaveOutcome::Skipped;
        }
        if self.current.is_none() {
            return SaveOutcome::Skipped;
        }
        self.save_current().await
    }

    /// Creates a new document and switches to it, returning its id.
    pub async fn create_file(&mut self) -> Result<String, SessionError> {
        self.ensure_loaded().await?;
        self.create_inner().await
    }

    async fn create_inner(&mut self) -> Result<String, SessionError> {
        let name = format!("untitled_{}.pseudo", self.files.len());
        let entry = if self.remote_ready() {
            let created = self.remote.create_file(&name).await.map_err(|error| {
                log_remote_failure("create file", &error);
                error
            })?;
            FileEntry {
                id: created.id,
                name: created.name,
                content: FileContent::Loaded(created.content),
            }
        } else {
            FileEntry {
                id: next_local_id("file"),
                name,
                content: FileContent::Loaded(self.config.new_file_content.clone()),
            }
        };
        let id = entry.id.clone();
        tracing::debug!(file_id = id.as_str(), name = entry.name.as_str(), "file created");
        self.files.push(entry);
        self.switch_inner(&id, false).await?;
        Ok(id)
    }

    /// Renames `id`; returns `Ok(false)` when the trimmed name is empty or unchanged.
    ///
    /// The new name is shown immediately and rolled back if the remote update fails.
    pub async fn rename(&mut self, id: &str, new_name: &str) -> Result<bool, SessionError> {
        self.ensure_loaded().await?;
        let new_name = new_name.trim();
        let Some(entry) = self.entry_mut(id) else {
            return Err(SessionError::UnknownFile(id.to_string()));
        };
        if new_name.is_empty() || entry.name == new_name {
            return Ok(false);
        }
        let previous = std::mem::replace(&mut entry.name, new_name.to_string());
        if !self.remote_ready() {
            return Ok(true);
        }

        if let Err(error) = self
            .remote
            .update_file(id, FileUpdate::rename(new_name))
            .await
        {
            log_remote_failure("rename file", &error);
            if let Some(entry) = self.entry_mut(id) {
                entry.name = previous;
            }
            return Err(error.into());
        }
        Ok(true)
    }

    /// Deletes `id`, refusing to remove the last file.
    ///
    /// The remote delete happens first; on failure nothing changes locally.
    pub async fn delete(&mut self, id: &str) -> Result<(), SessionError> {
        self.ensure_loaded().await?;
        let Some(index) = self.files.iter().position(|file| file.id == id) else {
            return Err(SessionError::UnknownFile(id.to_string()));
        };
        if self.files.len() == 1 {
            return Err(SessionError::LastFile);
        }
        if self.remote_ready() {
            self.remote.delete_file(id).await.map_err(|error| {
                log_remote_failure("delete file", &error);
                error
            })?;
        }

        self.files.remove(index);
        tracing::debug!(file_id = id, "file deleted");
        if self.current.as_deref() == Some(id) {
            self.current = None;
            let next = self.files[0].id.clone();
            self.switch_inner(&next, false).await?;
        }
        Ok(())
    }

    fn entry_mut(&mut self, id: &str) -> Option<&mut FileEntry> {
        self.files.iter_mut().find(|file| file.id == id)
    }

    async fn fetch_content(&self, id: &str) -> String {
        if !self.remote_ready() {
            return String::new();
        }
        match self.remote.fetch_file(id).await {
            Ok(file) => file.content,
            Err(error) => {
                log_remote_failure("fetch file", &error);
                String::new()
            }
        }
    }

    async fn persist(&self, id: &str, content: String) -> SaveOutcome {
        if !self.remote_ready() {
            return SaveOutcome::LocalOnly;
        }
        match self
            .remote
            .update_file(id, FileUpdate::content(content))
            .await
        {
            Ok(()) => SaveOutcome::Synced,
            Err(error) => {
                log_remote_failure("save file", &error);
                SaveOutcome::SyncFailed
            }
        }
    }
}

fn log_remote_failure(operation: &str, error: &RemoteError) {
    let class = if error.is_rejection() {
        ErrorClass::RemoteRejection
    } else {
        ErrorClass::NetworkFailure
    };
    tracing::warn!(operation, error_class = class.as_str(), %error, "remote file call failed");
}
