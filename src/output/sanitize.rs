use std::path::PathBuf;

/// Names Windows reserves for devices; a file with one of these stems is
/// unwritable there regardless of extension.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// A path that is safe to join under the output root, plus a note for every
/// rewrite that was applied to get there. Notes surface in the extraction
/// result so transformations are reported, never silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub relative_path: PathBuf,
    pub notes: Vec<String>,
}

/// Turn a raw path captured from markup into a safe relative path.
///
/// This is the security boundary: every path must pass through here before
/// any filesystem write. Absolute markers and unsafe characters are
/// rewritten with a note; parent-directory segments are rejected outright
/// with the returned reason, which callers record under `skipped`. The
/// result contains only normal components, so joining it under any root
/// cannot escape that root. Reserved device names are rewritten on every
/// host so extracted trees stay portable.
pub fn sanitize_path(raw: &str) -> Result<Sanitized, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty path".to_string());
    }

    let mut notes = Vec::new();
    let normalized = trimmed.replace('\\', "/");
    let mut rest = normalized.as_str();

    let bytes = rest.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        rest = &rest[2..];
        notes.push(format!("stripped drive prefix from '{}'", trimmed));
    }
    if rest.starts_with('/') {
        rest = rest.trim_start_matches('/');
        notes.push(format!("absolute path '{}' treated as relative", trimmed));
    }

    let mut components = Vec::new();
    for segment in rest.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err("path traversal".to_string());
        }
        let cleaned = clean_component(segment, &mut notes);
        if cleaned.is_empty() {
            notes.push(format!("dropped unusable path component '{}'", segment));
            continue;
        }
        components.push(cleaned);
    }

    if components.is_empty() {
        return Err("no usable path components".to_string());
    }

    Ok(Sanitized {
        relative_path: components.iter().collect(),
        notes,
    })
}

fn clean_component(segment: &str, notes: &mut Vec<String>) -> String {
    let mut cleaned = String::with_capacity(segment.len());
    let mut replaced = false;
    for ch in segment.chars() {
        match ch {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => {
                cleaned.push('_');
                replaced = true;
            }
            c if c.is_control() => {
                cleaned.push('_');
                replaced = true;
            }
            c => cleaned.push(c),
        }
    }
    if replaced {
        notes.push(format!("replaced unsafe characters in '{}'", segment));
    }

    // Trailing dots and spaces are stripped by Windows at creation time,
    // which would silently change the name.
    let trimmed = cleaned.trim_end_matches([' ', '.']);
    if trimmed.len() != cleaned.len() && !trimmed.is_empty() {
        notes.push(format!("trimmed trailing dots/spaces from '{}'", segment));
    }
    let mut name = trimmed.to_string();

    let stem = name.split('.').next().unwrap_or("");
    if RESERVED_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
    {
        name = match name.split_once('.') {
            Some((stem, extension)) => format!("{}_.{}", stem, extension),
            None => format!("{}_", name),
        };
        notes.push(format!("renamed reserved device name '{}'", segment));
    }

    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_plain_relative_path_untouched() {
        let sanitized = sanitize_path("src/b/c.py").unwrap();
        assert_eq!(sanitized.relative_path, Path::new("src/b/c.py"));
        assert!(sanitized.notes.is_empty());
    }

    #[test]
    fn test_traversal_rejected() {
        assert_eq!(sanitize_path("../../etc/passwd"), Err("path traversal".to_string()));
        assert_eq!(sanitize_path("src/../../x"), Err("path traversal".to_string()));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(sanitize_path("").is_err());
        assert!(sanitize_path("   ").is_err());
        assert!(sanitize_path("///").is_err());
        assert!(sanitize_path("./.").is_err());
    }

    #[test]
    fn test_absolute_path_made_relative() {
        let sanitized = sanitize_path("/etc/app.conf").unwrap();
        assert_eq!(sanitized.relative_path, Path::new("etc/app.conf"));
        assert_eq!(sanitized.notes.len(), 1);
        assert!(sanitized.notes[0].contains("treated as relative"));
    }

    #[test]
    fn test_windows_paths_normalized() {
        let sanitized = sanitize_path(r"C:\project\src\main.rs").unwrap();
        assert_eq!(sanitized.relative_path, Path::new("project/src/main.rs"));
        assert!(!sanitized.notes.is_empty());
    }

    #[test]
    fn test_reserved_names_suffixed() {
        let sanitized = sanitize_path("src/CON.py").unwrap();
        assert_eq!(sanitized.relative_path, Path::new("src/CON_.py"));
        assert!(sanitized.notes.iter().any(|n| n.contains("reserved")));

        let sanitized = sanitize_path("aux").unwrap();
        assert_eq!(sanitized.relative_path, Path::new("aux_"));

        let sanitized = sanitize_path("lpt9.txt").unwrap();
        assert_eq!(sanitized.relative_path, Path::new("lpt9_.txt"));
    }

    #[test]
    fn test_unsafe_characters_replaced() {
        let sanitized = sanitize_path("src/what?.py").unwrap();
        assert_eq!(sanitized.relative_path, Path::new("src/what_.py"));
        assert!(sanitized.notes.iter().any(|n| n.contains("unsafe characters")));
    }

    #[test]
    fn test_trailing_dots_trimmed() {
        let sanitized = sanitize_path("dir./file.txt").unwrap();
        assert_eq!(sanitized.relative_path, Path::new("dir/file.txt"));
    }

    #[test]
    fn test_result_never_escapes_root() {
        for raw in ["/abs/path.txt", r"D:\x\y.txt", "a//b/./c.txt", "con.txt"] {
            let sanitized = sanitize_path(raw).unwrap();
            let joined = Path::new("/out").join(&sanitized.relative_path);
            assert!(joined.starts_with("/out"), "{} escaped the root", raw);
            assert!(sanitized
                .relative_path
                .components()
                .all(|c| matches!(c, std::path::Component::Normal(_))));
        }
    }
}
