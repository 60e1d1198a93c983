use crate::config::{ExtractOptions, OverwritePolicy, SelectorConfig};
use crate::error::Result;
use crate::parser::TextEncoding;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "htmlcode",
    version,
    about = "Reconstruct source trees from HTML code-review exports",
    long_about = "Extracts the files embedded in an HTML code-review export: every \
path label and its table of added code lines becomes a file under the output \
directory. Documents can also be saved as self-contained archives and \
extracted later."
)]
pub struct Cli {
    /// HTML document to extract, or an archive directory to replay
    #[arg(required_unless_present = "generate_selectors")]
    pub input: Option<PathBuf>,

    /// Directory the extracted tree is written to
    #[arg(short, long, default_value = "extracted")]
    pub output: PathBuf,

    /// Show what would be extracted without writing any files
    #[arg(long)]
    pub preview: bool,

    /// Save the input as an archive under this directory instead of extracting
    #[arg(long, value_name = "DIR")]
    pub archive: Option<PathBuf>,

    /// Archive name (default: source stem plus timestamp)
    #[arg(long, requires = "archive")]
    pub name: Option<String>,

    /// Input text encoding (utf-8 or latin-1; default: auto-detect)
    #[arg(short, long)]
    pub encoding: Option<String>,

    /// TOML file with a [selectors] table overriding the default rules
    #[arg(long, value_name = "FILE")]
    pub selectors: Option<PathBuf>,

    /// Class pattern for file-path labels
    #[arg(long, value_name = "PATTERN")]
    pub path_class: Option<String>,

    /// Class pattern for code containers
    #[arg(long, value_name = "PATTERN")]
    pub container_class: Option<String>,

    /// Class pattern for added code lines
    #[arg(long, value_name = "PATTERN")]
    pub line_class: Option<String>,

    /// What to do when a destination file already exists
    #[arg(long, value_enum, default_value_t = ConflictPolicy::Overwrite)]
    pub on_conflict: ConflictPolicy,

    /// Create files even for blocks with no reconstructed lines
    #[arg(long)]
    pub include_empty: bool,

    /// Characters of content shown per file in previews
    #[arg(long, default_value_t = 200)]
    pub preview_chars: usize,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print a sample selectors TOML file and exit
    #[arg(long)]
    pub generate_selectors: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    Overwrite,
    Skip,
    Fail,
}

impl From<ConflictPolicy> for OverwritePolicy {
    fn from(policy: ConflictPolicy) -> Self {
        match policy {
            ConflictPolicy::Overwrite => OverwritePolicy::Overwrite,
            ConflictPolicy::Skip => OverwritePolicy::SkipIfExists,
            ConflictPolicy::Fail => OverwritePolicy::FailIfExists,
        }
    }
}

impl Cli {
    /// Resolve the selector configuration: file first, then per-rule
    /// flag overrides on top.
    pub fn selector_config(&self) -> Result<SelectorConfig> {
        let mut config = match &self.selectors {
            Some(path) => SelectorConfig::load_from_file(path)?,
            None => SelectorConfig::default(),
        };

        if let Some(ref rule) = self.path_class {
            config.path_label = rule.clone();
        }
        if let Some(ref rule) = self.container_class {
            config.code_container = rule.clone();
        }
        if let Some(ref rule) = self.line_class {
            config.code_line = rule.clone();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn extract_options(&self) -> Result<ExtractOptions> {
        let encoding = match &self.encoding {
            Some(name) => Some(TextEncoding::from_name(name)?),
            None => None,
        };

        Ok(ExtractOptions::default()
            .with_encoding(encoding)
            .with_overwrite(self.on_conflict.into())
            .with_skip_empty(!self.include_empty)
            .with_preview_chars(self.preview_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("htmlcode").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_minimal_invocation() {
        let cli = parse(&["page.html"]);
        assert_eq!(cli.input, Some(PathBuf::from("page.html")));
        assert_eq!(cli.output, PathBuf::from("extracted"));
        assert!(!cli.preview);
        assert_eq!(cli.on_conflict, ConflictPolicy::Overwrite);
    }

    #[test]
    fn test_input_required_unless_generating_selectors() {
        assert!(Cli::try_parse_from(["htmlcode"]).is_err());
        let cli = parse(&["--generate-selectors"]);
        assert!(cli.input.is_none());
    }

    #[test]
    fn test_selector_overrides() {
        let cli = parse(&["page.html", "--line-class", "diff-add"]);
        let config = cli.selector_config().unwrap();
        assert_eq!(config.code_line, "diff-add");
        assert_eq!(config.path_label, crate::config::DEFAULT_PATH_LABEL);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let cli = parse(&["page.html", "--path-class", "[bad"]);
        assert!(cli.selector_config().is_err());
    }

    #[test]
    fn test_extract_options_mapping() {
        let cli = parse(&[
            "page.html",
            "--encoding",
            "latin-1",
            "--on-conflict",
            "skip",
            "--include-empty",
            "--preview-chars",
            "64",
        ]);
        let options = cli.extract_options().unwrap();
        assert_eq!(options.encoding, Some(TextEncoding::Latin1));
        assert_eq!(options.overwrite, OverwritePolicy::SkipIfExists);
        assert!(!options.skip_empty);
        assert_eq!(options.preview_chars, 64);
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        let cli = parse(&["page.html", "--encoding", "utf-16"]);
        assert!(cli.extract_options().is_err());
    }

    #[test]
    fn test_archive_name_requires_archive() {
        assert!(Cli::try_parse_from(["htmlcode", "page.html", "--name", "x"]).is_err());
        let cli = parse(&["page.html", "--archive", "archives", "--name", "x"]);
        assert_eq!(cli.name.as_deref(), Some("x"));
    }
}
