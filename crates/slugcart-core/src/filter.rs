//! Display-name to slug-token filtering.
//!
//! Turns arbitrary catalog names ("Café Süß 2-Pack!") into URL-safe tokens
//! ("cafe-suess-pack"). The pipeline is strictly ordered: markup strip,
//! literal substitution rules, case folding, character removal, whitespace
//! collapsing, short-word drop, percent-encoding. The whole thing is a pure
//! function of the input and the loaded configuration, and is idempotent:
//! `filter(filter(x)) == filter(x)`.

use anyhow::Result;
use regex::Regex;

use crate::config::{RemoveChars, SeoConfig};

/// Compiled slug filter. Build once, reuse for every lookup.
#[derive(Debug)]
pub struct SlugFilter {
    rules: Vec<(String, String)>,
    markup: Regex,
    remove: Regex,
    whitespace: Regex,
    short_word_length: usize,
    unicode: bool,
}

impl SlugFilter {
    pub fn new(config: &SeoConfig) -> Result<Self> {
        // The removal classes deliberately preserve `-` and `%`: hyphens and
        // percent-escapes are what this filter itself emits, and stripping
        // them on a second pass would break idempotence.
        let remove = match (config.remove_chars, config.unicode_aware) {
            (RemoveChars::Punctuation, true) => r"[[\p{P}\p{S}]--[\-%]]",
            (RemoveChars::Punctuation, false) => {
                r##"[!"#$&'()*+,./:;<=>?@\[\\\]^_`{|}~]"##
            }
            (RemoveChars::NonAlphanumerical, true) => r"[^\p{L}\p{N}\s%-]",
            (RemoveChars::NonAlphanumerical, false) => r"[^a-zA-Z0-9\s%-]",
        };

        Ok(Self {
            rules: config.substitution_rules(),
            markup: Regex::new(r"<[^>]*>")?,
            remove: Regex::new(remove)?,
            whitespace: Regex::new(r"\s+")?,
            short_word_length: config.short_word_length,
            unicode: config.unicode_aware,
        })
    }

    /// Sanitizes a display name into a slug token.
    ///
    /// An empty result means the name is not resolvable; callers must treat
    /// that as "invalid link parameters", never as an empty slug.
    pub fn filter(&self, name: &str) -> String {
        let stripped = self.markup.replace_all(name, "");
        let mut value = stripped.trim().to_string();

        for (find, replace) in &self.rules {
            value = value.replace(find.as_str(), replace);
        }

        value = if self.unicode {
            value.to_lowercase()
        } else {
            value.to_ascii_lowercase()
        };

        let value = self.remove.replace_all(&value, "");
        let value = self.whitespace.replace_all(&value, "-");

        let joined = value
            .split('-')
            .filter(|word| {
                !word.is_empty()
                    && (self.short_word_length == 0
                        || word.chars().count() > self.short_word_length)
            })
            .collect::<Vec<_>>()
            .join("-");

        percent_encode(&joined)
    }
}

/// Conservative percent-encoding for slug text.
///
/// Keeps unreserved characters (RFC 3986) untouched and never re-encodes an
/// existing `%`, so an already-encoded slug passes through unchanged. Hex
/// digits are emitted lowercase so the filter's case-folding step is a no-op
/// on its own output.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'%' => {
                out.push(byte as char);
            }
            _ => {
                out.push_str(&format!("%{byte:02x}"));
            }
        }
    }
    out
}
