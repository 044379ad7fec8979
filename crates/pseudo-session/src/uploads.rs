use pseudo_core::next_local_id;

use crate::SessionError;

const UPLOAD_EXTENSION: &str = ".txt";

#[derive(Debug, Clone, PartialEq, Eq)]
/// A text file attached to the session for programs to read.
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    /// Size in bytes.
    pub size: usize,
    pub content: String,
}

impl UploadedFile {
    pub fn size_label(&self) -> String {
        format!("{:.2} KB", self.size as f64 / 1024.0)
    }
}

#[derive(Debug, Clone, Default)]
/// In-memory list of uploaded files, in upload order.
pub struct UploadedFileStore {
    files: Vec<UploadedFile>,
}

impl UploadedFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `.txt` upload and returns the stored entry.
    pub fn add(
        &mut self,
        name: &str,
        content: impl Into<String>,
    ) -> Result<&UploadedFile, SessionError> {
        let name = name.trim();
        if !name.to_ascii_lowercase().ends_with(UPLOAD_EXTENSION) {
            return Err(SessionError::UnsupportedUpload(name.to_string()));
        }
        let content = content.into();
        let file = UploadedFile {
            id: next_local_id("upload"),
            name: name.to_string(),
            size: content.len(),
            content,
        };
        tracing::debug!(
            upload_id = file.id.as_str(),
            size = file.size,
            "uploaded file added"
        );
        self.files.push(file);
        let index = self.files.len() - 1;
        Ok(&self.files[index])
    }

    pub fn remove(&mut self, id: &str) -> Option<UploadedFile> {
        let index = self.files.iter().position(|file| file.id == id)?;
        Some(self.files.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|file| file.id == id)
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
