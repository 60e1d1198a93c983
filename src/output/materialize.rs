use crate::cancel::CancelFlag;
use crate::config::{ExtractOptions, OverwritePolicy};
use crate::error::Result;
use crate::matcher::MatchOutcome;
use crate::output::sanitize::sanitize_path;
use crate::parser::TextEncoding;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SKIP_EMPTY_BLOCK: &str = "no code lines extracted";
pub const SKIP_CANCELLED: &str = "cancelled";

/// A block whose file was not created, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedBlock {
    pub raw_path: String,
    pub reason: String,
}

impl SkippedBlock {
    pub fn new<P: Into<String>, R: Into<String>>(raw_path: P, reason: R) -> Self {
        Self {
            raw_path: raw_path.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome of one extraction run. Created paths are relative to the output
/// root and listed in document order; nothing here is mutated after return.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionResult {
    pub created: Vec<PathBuf>,
    pub skipped: Vec<SkippedBlock>,
    /// Non-silent record of defensive path rewrites applied by the
    /// sanitizer (absolute paths made relative, reserved names renamed).
    pub notes: Vec<String>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.skipped.is_empty()
    }
}

/// A block that passed sanitization and is ready to write. The raw path
/// text is kept alongside the sanitized one so skip entries stay keyed by
/// what the document actually said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedFile {
    pub raw_path: String,
    pub relative_path: PathBuf,
    pub content: String,
    pub line_count: usize,
}

/// One file as reported by preview mode: what would be created, how many
/// lines it has, and the first characters of its content.
#[derive(Debug, Clone, Serialize)]
pub struct FilePreview {
    pub relative_path: PathBuf,
    pub line_count: usize,
    pub snippet: String,
}

/// The shared product of matching, reconstruction, and sanitization.
/// Preview and extraction both consume a `Plan`, so the set of files they
/// report can never diverge.
#[derive(Debug)]
pub struct Plan {
    pub files: Vec<SanitizedFile>,
    pub skipped: Vec<SkippedBlock>,
    pub notes: Vec<String>,
    pub encoding: TextEncoding,
}

pub fn plan_files(outcome: MatchOutcome, encoding: TextEncoding, options: &ExtractOptions) -> Plan {
    let mut plan = Plan {
        files: Vec::new(),
        skipped: outcome.skipped,
        notes: Vec::new(),
        encoding,
    };

    for block in outcome.blocks {
        if options.skip_empty && block.lines.is_empty() {
            debug!(path = %block.source_path, "skipping empty block");
            plan.skipped
                .push(SkippedBlock::new(block.source_path, SKIP_EMPTY_BLOCK));
            continue;
        }
        match sanitize_path(&block.source_path) {
            Ok(sanitized) => {
                for note in &sanitized.notes {
                    warn!(path = %block.source_path, note = %note, "path rewritten");
                }
                plan.notes.extend(sanitized.notes);
                let file = SanitizedFile {
                    relative_path: sanitized.relative_path,
                    content: block.lines.join("\n"),
                    line_count: block.lines.len(),
                    raw_path: block.source_path,
                };
                // Repeated labels for the same path keep one file: the
                // position of the first occurrence, the content of the last.
                if let Some(existing) = plan
                    .files
                    .iter_mut()
                    .find(|f| f.relative_path == file.relative_path)
                {
                    debug!(path = %file.raw_path, "duplicate path, replacing earlier block");
                    *existing = file;
                } else {
                    plan.files.push(file);
                }
            }
            Err(reason) => {
                warn!(path = %block.source_path, reason = %reason, "unsafe path skipped");
                plan.skipped
                    .push(SkippedBlock::new(block.source_path, reason));
            }
        }
    }

    plan
}

/// Write the planned files under `output_root`.
///
/// Parent directories are created as needed; a failure on one file is
/// recorded and the batch continues. Cancellation is honored between
/// files, never mid-write, so a cancelled run leaves a clean prefix of the
/// plan on disk and reports the remainder as skipped.
pub fn materialize(
    plan: Plan,
    output_root: &Path,
    options: &ExtractOptions,
    cancel: &CancelFlag,
) -> Result<ExtractionResult> {
    fs::create_dir_all(output_root)?;

    let mut result = ExtractionResult {
        created: Vec::new(),
        skipped: plan.skipped,
        notes: plan.notes,
    };

    for file in plan.files {
        if cancel.is_cancelled() {
            result
                .skipped
                .push(SkippedBlock::new(file.raw_path, SKIP_CANCELLED));
            continue;
        }
        match write_file(output_root, &file, options.overwrite, plan.encoding) {
            Ok(()) => result.created.push(file.relative_path),
            Err(reason) => {
                warn!(path = %file.relative_path.display(), reason = %reason, "write failed");
                result.skipped.push(SkippedBlock::new(file.raw_path, reason));
            }
        }
    }

    Ok(result)
}

fn write_file(
    root: &Path,
    file: &SanitizedFile,
    policy: OverwritePolicy,
    encoding: TextEncoding,
) -> std::result::Result<(), String> {
    let dest = root.join(&file.relative_path);

    // The sanitizer guarantees this; anything else reaching here is a bug
    // worth refusing loudly.
    if !dest.starts_with(root) {
        return Err("path escapes output root".to_string());
    }

    if dest.exists() {
        match policy {
            OverwritePolicy::Overwrite => {}
            OverwritePolicy::SkipIfExists => return Err("file already exists".to_string()),
            OverwritePolicy::FailIfExists => {
                return Err("refusing to overwrite existing file".to_string())
            }
        }
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
    }

    fs::write(&dest, encoding.encode(&file.content))
        .map_err(|e| format!("cannot write {}: {}", dest.display(), e))
}
