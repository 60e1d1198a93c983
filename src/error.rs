use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to parse document: {message}")]
    Parse { message: String },

    #[error("Invalid selector configuration: {message}")]
    Selector { message: String },

    #[error("Unknown text encoding: {name}")]
    Encoding { name: String },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid archive: {message}")]
    ArchiveFormat { message: String },

    #[error("Archive not found: {path}")]
    ArchiveNotFound { path: String },

    #[error("Archive destination already exists: {path}")]
    ArchiveExists { path: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation was cancelled")]
    Cancelled,
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for ExtractError {
    fn user_message(&self) -> String {
        match self {
            ExtractError::Parse { message } => {
                format!("The document could not be read as HTML: {}", message)
            }
            ExtractError::Selector { message } => {
                format!("Selector configuration is invalid: {}", message)
            }
            ExtractError::Encoding { name } => {
                format!("Unknown text encoding: {}", name)
            }
            ExtractError::ArchiveFormat { message } => {
                format!("Archive is corrupt or incomplete: {}", message)
            }
            ExtractError::ArchiveNotFound { path } => {
                format!("Archive not found: {}", path)
            }
            ExtractError::ArchiveExists { path } => {
                format!("Archive destination already exists: {}", path)
            }
            ExtractError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            ExtractError::Cancelled => "Operation was cancelled".to_string(),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            ExtractError::Parse { .. } => Some(
                "Check that the input file is a saved HTML page and not empty.".to_string(),
            ),
            ExtractError::Selector { .. } => Some(
                "Each selector rule must be a non-empty regular expression matched against an element's class attribute.".to_string(),
            ),
            ExtractError::Encoding { .. } => Some(
                "Supported encodings are utf-8 and latin-1 (iso-8859-1, cp1252).".to_string(),
            ),
            ExtractError::ArchiveFormat { .. } => Some(
                "A valid archive directory contains metadata.json and the original HTML document.".to_string(),
            ),
            ExtractError::ArchiveNotFound { .. } => Some(
                "Check the archive path, or list available archives with the library's list_archives helper.".to_string(),
            ),
            ExtractError::ArchiveExists { .. } => Some(
                "Choose a different archive name with --name or remove the existing directory.".to_string(),
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ExtractError {
    fn from(error: toml::de::Error) -> Self {
        ExtractError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_friendly_messages() {
        let error = ExtractError::Selector {
            message: "path_label rule is empty".to_string(),
        };
        assert!(error.user_message().contains("Selector configuration"));
        assert!(error.suggestion().is_some());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = ExtractError::from(io_error);
        assert!(matches!(error, ExtractError::Io(_)));
    }

    #[test]
    fn test_cancelled_has_no_suggestion() {
        assert!(ExtractError::Cancelled.suggestion().is_none());
    }
}
