//! Upload staging and parsing

use std::io::Write;
use std::path::{Path, PathBuf};

use super::parser::{FileParser, ParsedDocument};
use crate::error::{Error, Result};
use crate::types::{FileType, UploadedFile};

/// Longest file-name prefix kept for a staged upload
const MAX_PREFIX_CHARS: usize = 32;

/// Turns an upload into parsed documents.
///
/// The upload is written to a uniquely named file inside the scratch
/// directory and read back from there. The staged file is owned by a
/// [`tempfile::NamedTempFile`] guard, so it is removed on every exit path,
/// including parse failures and panics on the blocking pool.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    scratch_dir: PathBuf,
}

impl DocumentLoader {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Stage and parse one upload
    pub async fn load(&self, file: &UploadedFile) -> Result<Vec<ParsedDocument>> {
        let name = file.name.clone();
        let content = file.content.clone();
        let dir = self.scratch_dir.clone();
        let file_type = file.file_type();

        tracing::debug!(
            "Staging '{}' ({}, {} bytes, {}) in {}",
            file.name,
            file_type.display_name(),
            file.size(),
            file.content_type,
            self.scratch_dir.display()
        );

        let parsed =
            tokio::task::spawn_blocking(move || stage_and_parse(&dir, &name, file_type, &content))
                .await
                .map_err(|e| Error::internal(format!("Loader task failed: {}", e)))
                .and_then(|result| result);

        match parsed {
            Ok(doc) => {
                tracing::info!(
                    "Loaded '{}': {} page(s), {} chars",
                    doc.filename,
                    doc.pages.len(),
                    doc.char_count()
                );
                Ok(vec![doc])
            }
            Err(e) => Err(Error::ingestion(&file.name, e)),
        }
    }
}

fn stage_and_parse(
    dir: &Path,
    name: &str,
    file_type: FileType,
    content: &[u8],
) -> Result<ParsedDocument> {
    if !file_type.is_supported() {
        return Err(Error::UnsupportedFileType(format!(
            "{} - only PDF and plain text files are accepted",
            name
        )));
    }

    std::fs::create_dir_all(dir)?;

    let mut staged = tempfile::Builder::new()
        .prefix(&staging_prefix(name))
        .suffix(&format!(".{}", file_type.extension()))
        .tempfile_in(dir)?;
    staged.write_all(content)?;
    staged.flush()?;

    let data = std::fs::read(staged.path())?;
    FileParser::parse(name, &data)
}

/// Filesystem-safe prefix derived from the upload's stem
fn staging_prefix(name: &str) -> String {
    let stem: String = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_PREFIX_CHARS)
        .collect();

    if stem.is_empty() {
        "upload-".to_string()
    } else {
        format!("{}-", stem)
    }
}
