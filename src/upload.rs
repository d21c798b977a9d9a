//! File selection for upload.
//!
//! Only PDFs are accepted, and only up to the backend's size limit. A
//! [`SelectedFile`] can only be built through these checks, so anything that
//! reaches the network has already passed them.

use std::path::Path;

/// The only MIME type the backend analyses.
pub const PDF_MIME: &str = "application/pdf";

/// Backend rejects uploads larger than 10 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Please upload a PDF file ({file_name} is {mime})")]
    NotPdf { file_name: String, mime: String },

    #[error("{file_name} is too large ({size} bytes, maximum is {limit} bytes)")]
    TooLarge {
        file_name: String,
        size: u64,
        limit: u64,
    },

    #[error("{0} is empty")]
    Empty(String),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A validated PDF ready to be sent to `/api/upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    file_name: String,
    bytes: Vec<u8>,
}

impl SelectedFile {
    /// Accept in-memory content with an explicitly declared MIME type.
    pub fn new(file_name: &str, mime: &str, bytes: Vec<u8>) -> Result<Self, UploadError> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        if !essence.eq_ignore_ascii_case(PDF_MIME) {
            return Err(UploadError::NotPdf {
                file_name: file_name.to_string(),
                mime: mime.to_string(),
            });
        }

        let size = bytes.len() as u64;
        if size == 0 {
            return Err(UploadError::Empty(file_name.to_string()));
        }
        if size > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge {
                file_name: file_name.to_string(),
                size,
                limit: MAX_UPLOAD_BYTES,
            });
        }

        Ok(Self {
            file_name: file_name.to_string(),
            bytes,
        })
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    ///
    /// The type check runs before the file is read, so a rejected selection
    /// never touches its contents.
    pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        if mime.essence_str() != PDF_MIME {
            return Err(UploadError::NotPdf {
                file_name,
                mime: mime.essence_str().to_string(),
            });
        }

        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::new(&file_name, PDF_MIME, bytes)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime(&self) -> &'static str {
        PDF_MIME
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF_HEADER: &[u8] = b"%PDF-1.4\n%test\n";

    #[test]
    fn accepts_pdf_mime() {
        let file = SelectedFile::new("labs.pdf", "application/pdf", PDF_HEADER.to_vec()).unwrap();
        assert_eq!(file.file_name(), "labs.pdf");
        assert_eq!(file.mime(), PDF_MIME);
        assert_eq!(file.size(), PDF_HEADER.len() as u64);
    }

    #[test]
    fn mime_parameters_and_case_are_ignored() {
        assert!(SelectedFile::new("a.pdf", "Application/PDF; charset=binary", PDF_HEADER.to_vec()).is_ok());
    }

    #[test]
    fn rejects_non_pdf_mime() {
        let err = SelectedFile::new("scan.png", "image/png", vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, UploadError::NotPdf { ref mime, .. } if mime == "image/png"));
        assert!(err.to_string().contains("Please upload a PDF file"));
    }

    #[test]
    fn rejects_empty_file() {
        let err = SelectedFile::new("empty.pdf", PDF_MIME, Vec::new()).unwrap_err();
        assert!(matches!(err, UploadError::Empty(_)));
    }

    #[test]
    fn rejects_oversized_file() {
        let bytes = vec![0u8; (MAX_UPLOAD_BYTES + 1) as usize];
        let err = SelectedFile::new("huge.pdf", PDF_MIME, bytes).unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { size, .. } if size == MAX_UPLOAD_BYTES + 1));
    }

    #[tokio::test]
    async fn from_path_reads_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blood_panel.pdf");
        std::fs::write(&path, PDF_HEADER).unwrap();

        let file = SelectedFile::from_path(&path).await.unwrap();
        assert_eq!(file.file_name(), "blood_panel.pdf");
        assert_eq!(file.bytes(), PDF_HEADER);
    }

    #[tokio::test]
    async fn from_path_rejects_other_extensions_without_reading() {
        // The file does not exist: a read attempt would surface as Io instead.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");

        let err = SelectedFile::from_path(&path).await.unwrap_err();
        assert!(matches!(err, UploadError::NotPdf { ref mime, .. } if mime == "text/plain"));
    }

    #[tokio::test]
    async fn from_path_missing_pdf_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SelectedFile::from_path(&dir.path().join("missing.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Io { .. }));
    }
}
