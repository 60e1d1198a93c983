pub mod archive;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod matcher;
pub mod output;
pub mod parser;

// Public API re-exports
pub use archive::{list_archives, load_archive, Archive, ArchiveMetadata, ArchiveWriter};
pub use cancel::CancelFlag;
pub use cli::Cli;
pub use config::{ExtractOptions, OverwritePolicy, SelectorConfig};
pub use error::{ExtractError, Result, UserFriendlyError};
pub use matcher::CodeBlock;
pub use output::{ExtractionResult, FilePreview, SkippedBlock};
pub use parser::{Document, TextEncoding};

use output::Plan;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::debug;

/// What preview mode reports: the files extraction would create, in the
/// same order, plus everything that would be skipped. Produced from the
/// same plan extraction consumes, so the two can never disagree about
/// which files exist.
#[derive(Debug, Clone, Default)]
pub struct PreviewReport {
    pub files: Vec<FilePreview>,
    pub skipped: Vec<SkippedBlock>,
    pub notes: Vec<String>,
}

impl PreviewReport {
    pub fn relative_paths(&self) -> Vec<&Path> {
        self.files.iter().map(|f| f.relative_path.as_path()).collect()
    }
}

fn build_plan(bytes: &[u8], config: &SelectorConfig, options: &ExtractOptions) -> Result<Plan> {
    let selectors = config.compile()?;
    let document = Document::parse(bytes, options.encoding)?;
    let outcome = matcher::match_blocks(&document, &selectors);
    Ok(output::plan_files(outcome, document.encoding(), options))
}

/// Run the full pipeline: parse, match, reconstruct, sanitize, write.
///
/// Only document-level problems (unparseable input, invalid selectors)
/// return an error; per-block and per-file problems accumulate in the
/// result's `skipped` list and the run completes. A document that simply
/// matches nothing yields an empty result, not an error.
pub fn parse_and_extract(
    bytes: &[u8],
    config: &SelectorConfig,
    output_root: &Path,
    options: &ExtractOptions,
) -> Result<ExtractionResult> {
    extract_with_cancel(bytes, config, output_root, options, &CancelFlag::new())
}

pub fn extract_with_cancel(
    bytes: &[u8],
    config: &SelectorConfig,
    output_root: &Path,
    options: &ExtractOptions,
    cancel: &CancelFlag,
) -> Result<ExtractionResult> {
    let plan = build_plan(bytes, config, options)?;
    debug!(files = plan.files.len(), "materializing plan");
    output::materialize(plan, output_root, options, cancel)
}

/// Report what extraction would create, without touching the filesystem.
pub fn preview(
    bytes: &[u8],
    config: &SelectorConfig,
    options: &ExtractOptions,
) -> Result<PreviewReport> {
    let plan = build_plan(bytes, config, options)?;
    let files = plan
        .files
        .iter()
        .map(|file| FilePreview {
            relative_path: file.relative_path.clone(),
            line_count: file.line_count,
            snippet: file.content.chars().take(options.preview_chars).collect(),
        })
        .collect();
    Ok(PreviewReport {
        files,
        skipped: plan.skipped,
        notes: plan.notes,
    })
}

/// Main library interface: a selector configuration plus run options and
/// a shared cancellation flag, reusable across extractions.
pub struct HtmlCodeExtractor {
    config: SelectorConfig,
    options: ExtractOptions,
    cancel: CancelFlag,
}

impl HtmlCodeExtractor {
    pub fn new(config: SelectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            options: ExtractOptions::default(),
            cancel: CancelFlag::new(),
        })
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// A clone of the flag driving this extractor; cancelling it stops
    /// in-flight runs between file writes.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn extract_bytes(&self, bytes: &[u8], output_root: &Path) -> Result<ExtractionResult> {
        extract_with_cancel(bytes, &self.config, output_root, &self.options, &self.cancel)
    }

    pub fn extract_file(&self, input: &Path, output_root: &Path) -> Result<ExtractionResult> {
        let bytes = std::fs::read(input)?;
        self.extract_bytes(&bytes, output_root)
    }

    /// Blocking extraction moved onto a worker thread, leaving the caller
    /// free to stay responsive and to cancel via `cancel_flag`.
    pub async fn extract_file_async(
        &self,
        input: PathBuf,
        output_root: PathBuf,
    ) -> Result<ExtractionResult> {
        let config = self.config.clone();
        let options = self.options.clone();
        let cancel = self.cancel.clone();

        task::spawn_blocking(move || {
            let bytes = std::fs::read(&input)?;
            extract_with_cancel(&bytes, &config, &output_root, &options, &cancel)
        })
        .await
        .map_err(|e| ExtractError::Config {
            message: format!("Extraction task failed: {}", e),
        })?
    }

    pub fn preview_bytes(&self, bytes: &[u8]) -> Result<PreviewReport> {
        preview(bytes, &self.config, &self.options)
    }

    pub fn preview_file(&self, input: &Path) -> Result<PreviewReport> {
        let bytes = std::fs::read(input)?;
        self.preview_bytes(&bytes)
    }

    /// Archive `input` for deferred extraction with this extractor's
    /// selectors. The encoding recorded in the archive is the one that
    /// would be used to extract the document now.
    pub fn save_archive(
        &self,
        input: &Path,
        dest_dir: &Path,
        name: Option<&str>,
    ) -> Result<PathBuf> {
        let bytes = std::fs::read(input)?;
        let source_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| archive::DOCUMENT_FILE.to_string());
        self.save_archive_bytes(&bytes, &source_name, dest_dir, name)
    }

    pub fn save_archive_bytes(
        &self,
        bytes: &[u8],
        source_name: &str,
        dest_dir: &Path,
        name: Option<&str>,
    ) -> Result<PathBuf> {
        let encoding = Document::parse(bytes, self.options.encoding)?.encoding();
        ArchiveWriter::new(dest_dir)
            .with_selectors(self.config.clone())
            .with_encoding(encoding)
            .with_source_name(source_name)
            .save(bytes, name)
    }

    /// Extract a previously saved archive. The archive's stored selectors
    /// and encoding are used, not this extractor's, so the replay matches
    /// the original live extraction.
    pub fn extract_archive(&self, archive_dir: &Path, output_root: &Path) -> Result<ExtractionResult> {
        let archive = load_archive(archive_dir)?;
        archive.extract_with_cancel(output_root, &self.options, &self.cancel)
    }
}
