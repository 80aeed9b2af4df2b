//! Line scanner for the Cartfile grammar
//!
//! Each entry line is `<kind> "<identifier>" [<specifier>]` with `#`
//! starting a trailing comment anywhere outside a double-quoted span.

use crate::error::{Result, UticaError};
use crate::specifier::VersionSpecifier;
use crate::version::SemanticVersion;

/// A cursor over one logical Cartfile line
pub struct Scanner<'a> {
    line: &'a str,
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { line, rest: line }
    }

    fn error(&self, reason: impl Into<String>) -> UticaError {
        UticaError::CartfileParseFailed {
            line: self.line.to_string(),
            reason: reason.into(),
        }
    }

    /// Skip leading whitespace, reporting whether any was consumed
    pub fn skip_whitespace(&mut self) -> bool {
        let trimmed = self.rest.trim_start();
        let skipped = trimmed.len() != self.rest.len();
        self.rest = trimmed;
        skipped
    }

    pub fn is_at_end(&self) -> bool {
        self.rest.is_empty()
    }

    /// Consume a bare word (the dependency kind)
    pub fn scan_word(&mut self) -> Option<&'a str> {
        let end = self
            .rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(self.rest.len());
        if end == 0 {
            return None;
        }
        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(word)
    }

    /// Consume a double-quoted string, requiring leading whitespace before it
    ///
    /// Failure modes carry the messages callers surface verbatim: a missing
    /// opening quote is "expected string after dependency type"; a missing
    /// closing quote or empty content is "empty or unterminated string after
    /// dependency type".
    pub fn scan_quoted_after_kind(&mut self) -> Result<&'a str> {
        if !self.skip_whitespace() || !self.rest.starts_with('"') {
            return Err(self.error("expected string after dependency type"));
        }
        self.scan_quoted()
            .ok_or_else(|| self.error("empty or unterminated string after dependency type"))
    }

    /// Consume a double-quoted string at the cursor
    pub fn scan_quoted(&mut self) -> Option<&'a str> {
        let after_open = self.rest.strip_prefix('"')?;
        let close = after_open.find('"')?;
        let content = &after_open[..close];
        if content.is_empty() {
            return None;
        }
        self.rest = &after_open[close + 1..];
        Some(content)
    }

    /// Consume the optional trailing version specifier
    pub fn scan_specifier(&mut self) -> Result<VersionSpecifier> {
        self.skip_whitespace();
        if self.is_at_end() {
            return Ok(VersionSpecifier::Any);
        }

        type Build = fn(SemanticVersion) -> VersionSpecifier;
        for (operator, build) in [
            ("~>", VersionSpecifier::CompatibleWith as Build),
            (">=", VersionSpecifier::AtLeast as Build),
            ("==", VersionSpecifier::Exactly as Build),
        ] {
            if let Some(rest) = self.rest.strip_prefix(operator) {
                let version_text = rest.trim();
                if version_text.is_empty() {
                    return Err(self.error(format!("expected version after `{operator}`")));
                }
                let version = SemanticVersion::parse(version_text).map_err(|e| {
                    self.error(format!("invalid version after `{operator}`: {e}"))
                })?;
                self.rest = "";
                return Ok(build(version));
            }
        }

        if self.rest.starts_with('"') {
            let reference = self
                .scan_quoted()
                .ok_or_else(|| self.error("empty or unterminated git reference"))?;
            self.skip_whitespace();
            if !self.is_at_end() {
                return Err(self.error("unexpected trailing characters after git reference"));
            }
            return Ok(VersionSpecifier::GitReference(reference.to_string()));
        }

        Err(self.error(format!("unexpected version specifier `{}`", self.rest)))
    }
}

/// Strip a trailing `#` comment, honoring double-quoted spans
pub fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (index, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..index],
            _ => {}
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comment_outside_quotes() {
        assert_eq!(strip_comment("github \"a/b\" # latest"), "github \"a/b\" ");
        assert_eq!(strip_comment("# full line"), "");
        assert_eq!(strip_comment("git \"url#fragment\""), "git \"url#fragment\"");
    }

    #[test]
    fn test_scan_word_and_quoted() {
        let mut scanner = Scanner::new("github \"owner/name\"");
        assert_eq!(scanner.scan_word(), Some("github"));
        assert_eq!(scanner.scan_quoted_after_kind().unwrap(), "owner/name");
        assert!(scanner.is_at_end());
    }

    #[test]
    fn test_missing_string_after_kind() {
        let mut scanner = Scanner::new("github ");
        scanner.scan_word();
        let err = scanner.scan_quoted_after_kind().unwrap_err();
        assert!(err
            .to_string()
            .contains("expected string after dependency type"));
    }

    #[test]
    fn test_unterminated_string_after_kind() {
        let mut scanner = Scanner::new("github \"owner/name");
        scanner.scan_word();
        let err = scanner.scan_quoted_after_kind().unwrap_err();
        assert!(err
            .to_string()
            .contains("empty or unterminated string after dependency type"));
    }

    #[test]
    fn test_empty_string_after_kind() {
        let mut scanner = Scanner::new("github \"\"");
        scanner.scan_word();
        assert!(scanner.scan_quoted_after_kind().is_err());
    }

    #[test]
    fn test_scan_specifier_forms() {
        let cases: [(&str, fn(&VersionSpecifier) -> bool); 5] = [
            ("", |s| matches!(s, VersionSpecifier::Any)),
            ("~> 1.2.0", |s| {
                matches!(s, VersionSpecifier::CompatibleWith(v) if v.to_string() == "1.2.0")
            }),
            (">= 2.0.0", |s| {
                matches!(s, VersionSpecifier::AtLeast(v) if v.to_string() == "2.0.0")
            }),
            ("== 3.1.4", |s| {
                matches!(s, VersionSpecifier::Exactly(v) if v.to_string() == "3.1.4")
            }),
            ("\"development\"", |s| {
                matches!(s, VersionSpecifier::GitReference(r) if r == "development")
            }),
        ];
        for (input, check) in cases {
            let specifier = Scanner::new(input).scan_specifier().unwrap();
            assert!(check(&specifier), "input {input:?} gave {specifier:?}");
        }
    }

    #[test]
    fn test_scan_specifier_rejects_garbage() {
        assert!(Scanner::new("about 1.0").scan_specifier().is_err());
        assert!(Scanner::new("~> banana").scan_specifier().is_err());
        assert!(Scanner::new("~>").scan_specifier().is_err());
    }
}
