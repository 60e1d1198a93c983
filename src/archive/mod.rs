use crate::cancel::CancelFlag;
use crate::config::{ExtractOptions, SelectorConfig};
use crate::error::{ExtractError, Result};
use crate::output::{ExtractionResult, FilePreview, SkippedBlock};
use crate::parser::{Document, TextEncoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub const DOCUMENT_FILE: &str = "document.html";
pub const METADATA_FILE: &str = "metadata.json";
pub const PREVIEW_FILE: &str = "preview.txt";

/// Self-describing record stored next to the archived document. Carries
/// everything needed to replay extraction later without the source file:
/// the encoding and the exact selector rules in effect at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub source_name: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub file_size: u64,
    pub encoding: TextEncoding,
    pub selectors: SelectorConfig,
}

/// A loaded archive: the original document bytes verbatim plus metadata
/// and the preview listing computed at save time. Immutable; extraction
/// from an archive is deterministic given the stored selectors.
#[derive(Debug)]
pub struct Archive {
    pub document: Vec<u8>,
    pub metadata: ArchiveMetadata,
    pub preview: String,
    path: PathBuf,
}

impl Archive {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replay extraction from the stored document using the stored
    /// selectors and encoding. Equivalent to extracting the original
    /// document directly with the same configuration.
    pub fn extract(&self, output_root: &Path, options: &ExtractOptions) -> Result<ExtractionResult> {
        self.extract_with_cancel(output_root, options, &CancelFlag::new())
    }

    pub fn extract_with_cancel(
        &self,
        output_root: &Path,
        options: &ExtractOptions,
        cancel: &CancelFlag,
    ) -> Result<ExtractionResult> {
        let options = options.clone().with_encoding(Some(self.metadata.encoding));
        crate::extract_with_cancel(
            &self.document,
            &self.metadata.selectors,
            output_root,
            &options,
            cancel,
        )
    }
}

/// Builds directory archives: the document bytes, `metadata.json`, and a
/// precomputed `preview.txt` listing what extraction will produce.
pub struct ArchiveWriter {
    dest_dir: PathBuf,
    selectors: SelectorConfig,
    encoding: TextEncoding,
    source_name: Option<String>,
    preview_chars: usize,
}

impl ArchiveWriter {
    pub fn new<P: Into<PathBuf>>(dest_dir: P) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            selectors: SelectorConfig::default(),
            encoding: TextEncoding::Utf8,
            source_name: None,
            preview_chars: ExtractOptions::default().preview_chars,
        }
    }

    pub fn with_selectors(mut self, selectors: SelectorConfig) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_source_name<S: Into<String>>(mut self, name: S) -> Self {
        self.source_name = Some(name.into());
        self
    }

    /// Write the archive, returning its directory. The default name is the
    /// source stem plus a timestamp, so repeated saves never collide.
    pub fn save(&self, document: &[u8], name: Option<&str>) -> Result<PathBuf> {
        self.selectors.validate()?;
        let parsed = Document::parse(document, Some(self.encoding))?;

        let source_name = self
            .source_name
            .clone()
            .unwrap_or_else(|| DOCUMENT_FILE.to_string());
        let dir_name = match name {
            Some(name) => name.to_string(),
            None => {
                let stem = Path::new(&source_name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "document".to_string());
                format!("{}_{}", stem, Utc::now().format("%Y%m%d_%H%M%S"))
            }
        };

        let archive_dir = self.dest_dir.join(dir_name);
        if archive_dir.join(METADATA_FILE).exists() {
            return Err(ExtractError::ArchiveExists {
                path: archive_dir.display().to_string(),
            });
        }
        fs::create_dir_all(&archive_dir)?;

        fs::write(archive_dir.join(DOCUMENT_FILE), document)?;

        let options = ExtractOptions::default()
            .with_encoding(Some(self.encoding))
            .with_preview_chars(self.preview_chars);
        let report = crate::preview(document, &self.selectors, &options)?;
        fs::write(
            archive_dir.join(PREVIEW_FILE),
            render_preview(&report.files, &report.skipped),
        )?;

        let metadata = ArchiveMetadata {
            source_name,
            title: parsed.title(),
            created_at: Utc::now(),
            file_size: document.len() as u64,
            encoding: self.encoding,
            selectors: self.selectors.clone(),
        };
        write_metadata(&archive_dir, &metadata)?;

        debug!(path = %archive_dir.display(), "archive saved");
        Ok(archive_dir)
    }
}

// Metadata lands last and atomically, so a directory containing
// metadata.json is always a complete archive.
fn write_metadata(archive_dir: &Path, metadata: &ArchiveMetadata) -> Result<()> {
    let json = serde_json::to_string_pretty(metadata).map_err(|e| ExtractError::ArchiveFormat {
        message: format!("failed to serialize metadata: {}", e),
    })?;

    let temp = NamedTempFile::new_in(archive_dir)?;
    fs::write(temp.path(), json)?;
    temp.persist(archive_dir.join(METADATA_FILE))
        .map_err(|e| ExtractError::Io(e.error))?;
    Ok(())
}

pub fn load_archive<P: AsRef<Path>>(archive_dir: P) -> Result<Archive> {
    let archive_dir = archive_dir.as_ref();
    if !archive_dir.is_dir() {
        return Err(ExtractError::ArchiveNotFound {
            path: archive_dir.display().to_string(),
        });
    }

    let metadata_path = archive_dir.join(METADATA_FILE);
    if !metadata_path.exists() {
        return Err(ExtractError::ArchiveFormat {
            message: format!("missing {}", METADATA_FILE),
        });
    }
    let metadata: ArchiveMetadata = serde_json::from_str(&fs::read_to_string(&metadata_path)?)
        .map_err(|e| ExtractError::ArchiveFormat {
            message: format!("invalid {}: {}", METADATA_FILE, e),
        })?;
    metadata
        .selectors
        .validate()
        .map_err(|e| ExtractError::ArchiveFormat {
            message: format!("stored selectors are invalid: {}", e),
        })?;

    let document = read_document(archive_dir)?;
    let preview = fs::read_to_string(archive_dir.join(PREVIEW_FILE)).unwrap_or_default();

    Ok(Archive {
        document,
        metadata,
        preview,
        path: archive_dir.to_path_buf(),
    })
}

fn read_document(archive_dir: &Path) -> Result<Vec<u8>> {
    let canonical = archive_dir.join(DOCUMENT_FILE);
    if canonical.exists() {
        return Ok(fs::read(canonical)?);
    }

    // Older archives stored the document under its original basename.
    let mut entries: Vec<PathBuf> = fs::read_dir(archive_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
                .unwrap_or(false)
        })
        .collect();
    entries.sort();

    match entries.first() {
        Some(path) => Ok(fs::read(path)?),
        None => Err(ExtractError::ArchiveFormat {
            message: "no HTML document found in archive".to_string(),
        }),
    }
}

/// Enumerate archive directories under `dir` (any subdirectory holding a
/// metadata file), sorted by name. A missing `dir` is an empty listing,
/// not an error.
pub fn list_archives<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut archives: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && path.join(METADATA_FILE).exists())
        .collect();
    archives.sort();
    Ok(archives)
}

fn render_preview(files: &[FilePreview], skipped: &[SkippedBlock]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} file(s) will be extracted\n\n", files.len()));
    for file in files {
        out.push_str(&format!(
            "{} ({} lines)\n",
            file.relative_path.display(),
            file.line_count
        ));
        for line in file.snippet.lines() {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    if !skipped.is_empty() {
        out.push_str("Skipped:\n");
        for skip in skipped {
            out.push_str(&format!("  {}: {}\n", skip.raw_path, skip.reason));
        }
    }
    out
}
