use crate::config::CompiledSelectors;
use crate::matcher::lines::reconstruct_lines;
use crate::output::SkippedBlock;
use crate::parser::Document;
use ego_tree::iter::Edge;
use ego_tree::NodeId;
use scraper::ElementRef;
use tracing::debug;

pub const SKIP_NO_BLOCK: &str = "no associated code block";
pub const SKIP_EMPTY_LABEL: &str = "empty path label";

/// One matched file: the raw path text captured from its label and the
/// reconstructed code lines in original vertical order. The path is
/// unsanitized here and must not touch the filesystem until it has passed
/// through the path sanitizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub source_path: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub blocks: Vec<CodeBlock>,
    pub skipped: Vec<SkippedBlock>,
}

/// Pair path labels with their code containers in one pass over the tree.
///
/// Path labels partition the document into non-overlapping regions: the
/// container associated with a label is the nearest node in document order
/// that matches the container rule before the next label. The first
/// qualifying container in a region wins; later ones are ignored. A label
/// whose region holds no container is recorded as skipped. Matched subtrees
/// are not rescanned, so a rule matching both a node and its descendants
/// fires once.
pub fn match_blocks(document: &Document, selectors: &CompiledSelectors) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();
    // State machine: the label still waiting for its container, if any.
    let mut pending: Option<String> = None;
    let mut skip_until: Option<NodeId> = None;

    for edge in document.html().tree.root().traverse() {
        let node = match edge {
            Edge::Close(node) => {
                if skip_until == Some(node.id()) {
                    skip_until = None;
                }
                continue;
            }
            Edge::Open(node) => node,
        };
        if skip_until.is_some() {
            continue;
        }
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let class = element.value().attr("class").unwrap_or("");
        if class.is_empty() {
            continue;
        }

        if selectors.matches_path_label(class) {
            if let Some(unmatched) = pending.take() {
                debug!(path = %unmatched, "path label without a code block");
                outcome.skipped.push(SkippedBlock::new(unmatched, SKIP_NO_BLOCK));
            }
            match label_text(&element) {
                Some(path) => pending = Some(path),
                None => outcome
                    .skipped
                    .push(SkippedBlock::new(String::new(), SKIP_EMPTY_LABEL)),
            }
            skip_until = Some(node.id());
        } else if selectors.matches_code_container(class) {
            // Containers preceding any label are ignored, matching the
            // region semantics above.
            if let Some(path) = pending.take() {
                let lines = reconstruct_lines(&element, selectors);
                debug!(path = %path, lines = lines.len(), "matched code block");
                outcome.blocks.push(CodeBlock {
                    source_path: path,
                    lines,
                });
            }
            skip_until = Some(node.id());
        }
    }

    if let Some(unmatched) = pending.take() {
        debug!(path = %unmatched, "trailing path label without a code block");
        outcome.skipped.push(SkippedBlock::new(unmatched, SKIP_NO_BLOCK));
    }

    outcome
}

/// Label text with presentation artifacts removed: surrounding whitespace
/// and the trailing colon some viewers append to the path.
fn label_text(element: &ElementRef) -> Option<String> {
    let text = element.text().collect::<String>();
    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix(':').unwrap_or(trimmed).trim_end();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
