//! Client-side session core of the pseudocode editor.
//!
//! `ExecutionSession` drives remote program runs through their input
//! round-trips, `FileSessionManager` owns the editable document cache and its
//! remote synchronization, and `SessionModeController` switches both between
//! anonymous and authenticated operation.
mod autosave;
mod error;
mod execution;
mod files;
mod mode;
mod uploads;

#[cfg(test)]
mod test_support;

pub use autosave::AutosaveHandle;
pub use error::{ErrorClass, SessionError};
pub use execution::{
    ExecutionOutcome, ExecutionSession, ExecutionSnapshot, ExecutionStatus, InputPrompter,
    RunOptions, EXECUTION_ABORTED_MESSAGE, INPUT_DECLINED_NOTICE,
};
pub use files::{
    shared_file_session, FileContent, FileEntry, FileListItem, FileListing, FileSessionConfig,
    FileSessionManager, SaveOutcome, SharedFileSession, ANONYMOUS_PLACEHOLDER,
};
pub use mode::{RegistrationForm, SessionMode, SessionModeController};
pub use uploads::{UploadedFile, UploadedFileStore};
