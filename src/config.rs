use crate::error::{ExtractError, Result};
use crate::parser::TextEncoding;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default rule for elements whose text is a file path (as emitted by the
/// code-review viewer this tool was written against).
pub const DEFAULT_PATH_LABEL: &str = "text-sm text-zinc-400 mb-2 font-mono";
/// Default rule for the table holding one file's code lines.
pub const DEFAULT_CODE_CONTAINER: &str = "syntax-highlight";
/// Default rule for rows representing an added line of code.
pub const DEFAULT_CODE_LINE: &str = "line added";

/// The three matching rules that drive extraction.
///
/// Each rule is a regular expression searched against an element's
/// space-joined `class` attribute. Rules are compared structurally; two
/// configs with the same patterns are equal regardless of provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub path_label: String,
    pub code_container: String,
    pub code_line: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            path_label: DEFAULT_PATH_LABEL.to_string(),
            code_container: DEFAULT_CODE_CONTAINER.to_string(),
            code_line: DEFAULT_CODE_LINE.to_string(),
        }
    }
}

impl SelectorConfig {
    pub fn new<S: Into<String>>(path_label: S, code_container: S, code_line: S) -> Result<Self> {
        let config = Self {
            path_label: path_label.into(),
            code_container: code_container.into(),
            code_line: code_line.into(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, rule) in [
            ("path_label", &self.path_label),
            ("code_container", &self.code_container),
            ("code_line", &self.code_line),
        ] {
            if rule.trim().is_empty() {
                return Err(ExtractError::Selector {
                    message: format!("{} rule must not be empty", name),
                });
            }
            Regex::new(rule).map_err(|e| ExtractError::Selector {
                message: format!("{} rule is not a valid pattern: {}", name, e),
            })?;
        }
        Ok(())
    }

    /// Compile the rules for matching. Validation and compilation are the
    /// same operation; a config that validates always compiles.
    pub fn compile(&self) -> Result<CompiledSelectors> {
        self.validate()?;
        let compile = |rule: &str| {
            Regex::new(rule).map_err(|e| ExtractError::Selector {
                message: e.to_string(),
            })
        };
        Ok(CompiledSelectors {
            path_label: compile(&self.path_label)?,
            code_container: compile(&self.code_container)?,
            code_line: compile(&self.code_line)?,
        })
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ExtractError::Config {
                message: format!("Selector file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ExtractError::Config {
            message: format!("Failed to read selector file {}: {}", path.display(), e),
        })?;

        let file: SelectorFile = toml::from_str(&content).map_err(|e| ExtractError::Config {
            message: format!("Failed to parse selector file {}: {}", path.display(), e),
        })?;

        file.selectors.validate()?;
        Ok(file.selectors)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_toml()?).map_err(ExtractError::Io)
    }

    pub fn to_toml(&self) -> Result<String> {
        let file = SelectorFile {
            selectors: self.clone(),
        };
        toml::to_string_pretty(&file).map_err(|e| ExtractError::Config {
            message: format!("Failed to serialize selectors: {}", e),
        })
    }
}

/// On-disk layout of a selector file: a single `[selectors]` table.
#[derive(Debug, Serialize, Deserialize)]
struct SelectorFile {
    selectors: SelectorConfig,
}

pub struct CompiledSelectors {
    pub path_label: Regex,
    pub code_container: Regex,
    pub code_line: Regex,
}

impl CompiledSelectors {
    pub fn matches_path_label(&self, class: &str) -> bool {
        self.path_label.is_match(class)
    }

    pub fn matches_code_container(&self, class: &str) -> bool {
        self.code_container.is_match(class)
    }

    pub fn matches_code_line(&self, class: &str) -> bool {
        self.code_line.is_match(class)
    }
}

/// What happens when a destination file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    Overwrite,
    SkipIfExists,
    FailIfExists,
}

impl Default for OverwritePolicy {
    fn default() -> Self {
        OverwritePolicy::Overwrite
    }
}

/// Per-run options shared by extraction and preview.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Requested input encoding; `None` means UTF-8 with Latin-1 fallback.
    pub encoding: Option<TextEncoding>,
    pub overwrite: OverwritePolicy,
    /// Blocks that matched a label but reconstructed zero lines are skipped
    /// instead of producing empty files.
    pub skip_empty: bool,
    /// Maximum characters of content shown per file in previews.
    pub preview_chars: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            overwrite: OverwritePolicy::default(),
            skip_empty: true,
            preview_chars: 200,
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoding(mut self, encoding: Option<TextEncoding>) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = policy;
        self
    }

    pub fn with_skip_empty(mut self, skip_empty: bool) -> Self {
        self.skip_empty = skip_empty;
        self
    }

    pub fn with_preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_selectors_validate() {
        let config = SelectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.path_label, DEFAULT_PATH_LABEL);
        assert_eq!(config.code_container, DEFAULT_CODE_CONTAINER);
        assert_eq!(config.code_line, DEFAULT_CODE_LINE);
    }

    #[test]
    fn test_empty_rule_rejected() {
        let mut config = SelectorConfig::default();
        config.code_line = "   ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ExtractError::Selector { .. })
        ));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut config = SelectorConfig::default();
        config.path_label = "[unclosed".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_structural_equality() {
        let a = SelectorConfig::default();
        let b = SelectorConfig::new(
            DEFAULT_PATH_LABEL,
            DEFAULT_CODE_CONTAINER,
            DEFAULT_CODE_LINE,
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_compiled_rules_match_class_attribute() {
        let selectors = SelectorConfig::default().compile().unwrap();
        assert!(selectors.matches_path_label("text-sm text-zinc-400 mb-2 font-mono"));
        assert!(selectors.matches_code_container("syntax-highlight w-full"));
        assert!(selectors.matches_code_line("line added"));
        assert!(!selectors.matches_code_line("line removed"));
    }

    #[test]
    fn test_selector_file_round_trip() {
        let config = SelectorConfig::new("header", "code", "row").unwrap();
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();
        let loaded = SelectorConfig::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config, loaded);
    }

    #[test]
    fn test_partial_selector_file_uses_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(
            temp_file.path(),
            "[selectors]\ncode_line = \"diff-add\"\n",
        )
        .unwrap();

        let loaded = SelectorConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.code_line, "diff-add");
        assert_eq!(loaded.path_label, DEFAULT_PATH_LABEL);
    }

    #[test]
    fn test_extract_options_builder() {
        let options = ExtractOptions::new()
            .with_overwrite(OverwritePolicy::SkipIfExists)
            .with_skip_empty(false)
            .with_preview_chars(50);

        assert_eq!(options.overwrite, OverwritePolicy::SkipIfExists);
        assert!(!options.skip_empty);
        assert_eq!(options.preview_chars, 50);
    }
}
