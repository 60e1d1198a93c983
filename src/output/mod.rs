mod materialize;
mod sanitize;

pub use materialize::{
    materialize, plan_files, ExtractionResult, FilePreview, Plan, SanitizedFile, SkippedBlock,
    SKIP_CANCELLED, SKIP_EMPTY_BLOCK,
};
pub use sanitize::{sanitize_path, Sanitized};
