mod blocks;
mod lines;

pub use blocks::{match_blocks, CodeBlock, MatchOutcome, SKIP_EMPTY_LABEL, SKIP_NO_BLOCK};
pub use lines::reconstruct_lines;
