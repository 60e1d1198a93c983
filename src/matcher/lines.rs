use crate::config::CompiledSelectors;
use ego_tree::iter::Edge;
use ego_tree::NodeId;
use scraper::ElementRef;

/// Reconstruct a container's code lines in original vertical order.
///
/// Every descendant matching the code-line rule contributes exactly one
/// line, including empty rows, so blank lines in the source survive.
/// Only markup-introduced artifacts are removed from a row: the gutter
/// cell with the line number, a diff-marker cell, and a single trailing
/// newline from the rendering. Whitespace belonging to the code itself,
/// indentation included, is kept verbatim.
pub fn reconstruct_lines(container: &ElementRef, selectors: &CompiledSelectors) -> Vec<String> {
    let mut lines = Vec::new();
    let mut skip_until: Option<NodeId> = None;

    for edge in container.traverse() {
        let node = match edge {
            Edge::Close(node) => {
                if skip_until == Some(node.id()) {
                    skip_until = None;
                }
                continue;
            }
            Edge::Open(node) => node,
        };
        if skip_until.is_some() || node.id() == container.id() {
            continue;
        }
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let class = element.value().attr("class").unwrap_or("");
        if !class.is_empty() && selectors.matches_code_line(class) {
            lines.push(row_text(&element));
            skip_until = Some(node.id());
        }
    }

    lines
}

/// Extract one row's code text.
///
/// Rows with cells are read cell-wise so markup whitespace around the
/// `<td>` tags never leaks into the code. The leading cell is dropped
/// when it is a line number gutter (empty or digits only), and a
/// following cell holding just the diff marker is dropped too; the sole
/// remaining cell is always kept, so a code line consisting of a single
/// `+` survives. Only a cell-less row (a plain `<div>` line) falls back
/// to the row's own text.
fn row_text(row: &ElementRef) -> String {
    let cells: Vec<ElementRef> = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .collect();

    let text = if cells.is_empty() {
        row.text().collect::<String>()
    } else {
        let mut cells = &cells[..];
        if cells.len() > 1 && is_gutter_cell(&cells[0]) {
            cells = &cells[1..];
        }
        if cells.len() > 1 && is_marker_cell(&cells[0]) {
            cells = &cells[1..];
        }
        cells
            .iter()
            .flat_map(|cell| cell.text())
            .collect::<String>()
    };

    trim_trailing_newline(text)
}

fn is_gutter_cell(cell: &ElementRef) -> bool {
    let text = cell.text().collect::<String>();
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.chars().all(|c| c.is_ascii_digit())
}

fn is_marker_cell(cell: &ElementRef) -> bool {
    let text = cell.text().collect::<String>();
    matches!(text.trim(), "+" | "-")
}

fn trim_trailing_newline(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::parser::Document;

    fn reconstruct(container_html: &str) -> Vec<String> {
        let html = format!("<html><body>{}</body></html>", container_html);
        let document = Document::parse(html.as_bytes(), None).unwrap();
        let selectors = SelectorConfig::default().compile().unwrap();
        let container_rule = scraper::Selector::parse(".syntax-highlight").unwrap();
        let container = document
            .html()
            .select(&container_rule)
            .next()
            .expect("test html must contain a container");
        reconstruct_lines(&container, &selectors)
    }

    #[test]
    fn test_blank_lines_preserved() {
        let lines = reconstruct(
            r#"<table class="syntax-highlight">
                <tr class="line added"><td>line1</td></tr>
                <tr class="line added"><td></td></tr>
                <tr class="line added"><td>line3</td></tr>
            </table>"#,
        );
        assert_eq!(lines, vec!["line1", "", "line3"]);
    }

    #[test]
    fn test_indentation_preserved() {
        let lines = reconstruct(
            r#"<table class="syntax-highlight"><tr class="line added"><td>    return x  </td></tr></table>"#,
        );
        assert_eq!(lines, vec!["    return x  "]);
    }

    #[test]
    fn test_gutter_cell_stripped() {
        let lines = reconstruct(
            r#"<table class="syntax-highlight">
                <tr class="line added"><td>12</td><td>def foo():</td></tr>
                <tr class="line added"><td></td><td>    pass</td></tr>
            </table>"#,
        );
        assert_eq!(lines, vec!["def foo():", "    pass"]);
    }

    #[test]
    fn test_marker_cell_stripped() {
        let lines = reconstruct(
            r#"<table class="syntax-highlight">
                <tr class="line added"><td>3</td><td>+</td><td>x = 1</td></tr>
            </table>"#,
        );
        assert_eq!(lines, vec!["x = 1"]);
    }

    #[test]
    fn test_sole_cell_is_never_dropped() {
        // A code line that is just "+" must not be mistaken for a marker.
        let lines = reconstruct(
            r#"<table class="syntax-highlight">
                <tr class="line added"><td>7</td><td>+</td></tr>
            </table>"#,
        );
        assert_eq!(lines, vec!["+"]);
    }

    #[test]
    fn test_non_matching_rows_ignored() {
        let lines = reconstruct(
            r#"<table class="syntax-highlight">
                <tr class="line added"><td>kept</td></tr>
                <tr class="line removed"><td>dropped</td></tr>
                <tr class="line"><td>context</td></tr>
            </table>"#,
        );
        assert_eq!(lines, vec!["kept"]);
    }

    #[test]
    fn test_inline_spans_concatenated() {
        let lines = reconstruct(
            r#"<table class="syntax-highlight">
                <tr class="line added"><td><span>def</span> <span>foo</span>():</td></tr>
            </table>"#,
        );
        assert_eq!(lines, vec!["def foo():"]);
    }

    #[test]
    fn test_non_table_rows_supported() {
        let lines = reconstruct(
            r#"<div class="syntax-highlight">
                <div class="line added">alpha</div>
                <div class="line added"></div>
            </div>"#,
        );
        assert_eq!(lines, vec!["alpha", ""]);
    }

    #[test]
    fn test_pretty_printed_markup_indentation_not_captured() {
        // Whitespace text nodes inside <tr> but outside <td> are markup
        // formatting, not code.
        let lines = reconstruct(
            "<table class=\"syntax-highlight\">\n\
             \x20   <tr class=\"line added\">\n\
             \x20       <td>line1</td>\n\
             \x20   </tr>\n\
             \x20   <tr class=\"line added\">\n\
             \x20       <td></td>\n\
             \x20   </tr>\n\
             \x20   <tr class=\"line added\">\n\
             \x20       <td>line3</td>\n\
             \x20   </tr>\n\
             </table>",
        );
        assert_eq!(lines, vec!["line1", "", "line3"]);
    }

    #[test]
    fn test_numeric_code_line_without_gutter_kept() {
        // A single-cell row whose content is a number is code, not a gutter.
        let lines = reconstruct(
            r#"<table class="syntax-highlight"><tr class="line added"><td>42</td></tr></table>"#,
        );
        assert_eq!(lines, vec!["42"]);
    }
}
