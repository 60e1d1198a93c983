use crate::error::{ExtractError, Result};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use tracing::warn;

/// Text encodings the pipeline can decode and encode.
///
/// Latin-1 decodes any byte sequence, so it doubles as the fallback for
/// documents that are not valid UTF-8. The legacy single-byte names the
/// original exports carry (iso-8859-1, cp1252) are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(
        rename = "latin-1",
        alias = "latin1",
        alias = "iso-8859-1",
        alias = "cp1252"
    )]
    Latin1,
}

impl TextEncoding {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "cp1252" => Ok(TextEncoding::Latin1),
            _ => Err(ExtractError::Encoding {
                name: name.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
        }
    }

    /// Decode without failing: invalid sequences are replaced, never raised.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes),
            TextEncoding::Latin1 => Cow::Owned(latin1_to_string(bytes)),
        }
    }

    /// Encode for output. Characters outside Latin-1 degrade to `?`, the
    /// same substitution the decoding side applies to invalid input.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// A parsed HTML document plus the encoding that was actually used to
/// decode it. Owns the tree for the duration of one extraction call; the
/// rest of the pipeline only borrows it.
pub struct Document {
    html: Html,
    encoding: TextEncoding,
}

impl Document {
    /// Parse raw bytes. With no requested encoding, strict UTF-8 is tried
    /// first and Latin-1 is used as the fallback; with a requested encoding
    /// the bytes are decoded under it with replacement, never an error.
    /// Fails only when the input cannot be markup at all (empty input).
    pub fn parse(bytes: &[u8], encoding: Option<TextEncoding>) -> Result<Self> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ExtractError::Parse {
                message: "document is empty".to_string(),
            });
        }

        let (text, used) = match encoding {
            Some(requested) => (requested.decode(bytes), requested),
            None => match std::str::from_utf8(bytes) {
                Ok(text) => (Cow::Borrowed(text), TextEncoding::Utf8),
                Err(_) => {
                    warn!("document is not valid UTF-8, falling back to latin-1");
                    (
                        Cow::Owned(latin1_to_string(bytes)),
                        TextEncoding::Latin1,
                    )
                }
            },
        };

        Ok(Self {
            html: Html::parse_document(&text),
            encoding: used,
        })
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// The document's `<title>` text, if present and non-empty.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        let element = self.html.select(&selector).next()?;
        let title = element.text().collect::<String>().trim().to_string();
        (!title.is_empty()).then_some(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_a_parse_error() {
        assert!(matches!(
            Document::parse(b"", None),
            Err(ExtractError::Parse { .. })
        ));
        assert!(matches!(
            Document::parse(b"  \n\t ", None),
            Err(ExtractError::Parse { .. })
        ));
    }

    #[test]
    fn test_utf8_detected_by_default() {
        let doc = Document::parse("<p>caf\u{e9}</p>".as_bytes(), None).unwrap();
        assert_eq!(doc.encoding(), TextEncoding::Utf8);
    }

    #[test]
    fn test_latin1_fallback_for_invalid_utf8() {
        // 0xE9 is 'é' in Latin-1 but an invalid UTF-8 sequence here.
        let doc = Document::parse(b"<p>caf\xe9</p>", None).unwrap();
        assert_eq!(doc.encoding(), TextEncoding::Latin1);
    }

    #[test]
    fn test_requested_encoding_never_fails() {
        let doc = Document::parse(b"<p>caf\xe9</p>", Some(TextEncoding::Utf8)).unwrap();
        assert_eq!(doc.encoding(), TextEncoding::Utf8);
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!(TextEncoding::from_name("UTF-8").unwrap(), TextEncoding::Utf8);
        assert_eq!(
            TextEncoding::from_name("iso-8859-1").unwrap(),
            TextEncoding::Latin1
        );
        assert_eq!(
            TextEncoding::from_name("cp1252").unwrap(),
            TextEncoding::Latin1
        );
        assert!(TextEncoding::from_name("utf-16").is_err());
    }

    #[test]
    fn test_latin1_round_trip() {
        let encoding = TextEncoding::Latin1;
        let text = encoding.decode(b"caf\xe9");
        assert_eq!(text, "caf\u{e9}");
        assert_eq!(encoding.encode(&text), b"caf\xe9");
    }

    #[test]
    fn test_latin1_encode_substitutes_unmappable() {
        assert_eq!(TextEncoding::Latin1.encode("a\u{2603}b"), b"a?b");
    }

    #[test]
    fn test_title_extraction() {
        let doc =
            Document::parse(b"<html><head><title> Review </title></head></html>", None).unwrap();
        assert_eq!(doc.title(), Some("Review".to_string()));

        let doc = Document::parse(b"<html><body></body></html>", None).unwrap();
        assert_eq!(doc.title(), None);
    }
}
