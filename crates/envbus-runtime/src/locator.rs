//! Envelope locator: which envelope serves a given file.
//!
//! Patterns are matched against the whole file name and support `*` as a
//! wildcard for any run of characters (including none). Matching is
//! case-sensitive. The first matching mapping wins.

use envbus_core::protocol::TargetOrigin;

/// Compiled file pattern, split on `*`.
#[derive(Debug, Clone)]
struct FilePattern {
    raw: String,
    parts: Vec<String>,
}

impl FilePattern {
    fn compile(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            parts: raw.split('*').map(str::to_string).collect(),
        }
    }

    fn matches(&self, name: &str) -> bool {
        // No wildcard: exact match.
        let [first, middle @ .., last] = self.parts.as_slice() else {
            return self.raw == name;
        };

        let Some(mut rest) = name.strip_prefix(first.as_str()) else {
            return false;
        };
        for part in middle {
            match rest.find(part.as_str()) {
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
        }
        rest.len() >= last.len() && rest.ends_with(last.as_str())
    }
}

/// Where the envelope for one kind of file lives.
#[derive(Debug, Clone)]
pub struct EnvelopeMapping {
    pub mapping_type: String,
    pattern: FilePattern,
    pub resources_path_prefix: String,
    pub envelope_path: String,
}

impl EnvelopeMapping {
    pub fn new(
        mapping_type: &str,
        file_pattern: &str,
        resources_path_prefix: &str,
        envelope_path: &str,
    ) -> Self {
        Self {
            mapping_type: mapping_type.to_string(),
            pattern: FilePattern::compile(file_pattern),
            resources_path_prefix: resources_path_prefix.to_string(),
            envelope_path: envelope_path.to_string(),
        }
    }

    pub fn file_pattern(&self) -> &str {
        &self.pattern.raw
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.pattern.matches(file_name)
    }
}

/// Resolves file names to envelope mappings for one host.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeLocator {
    /// Origin the embedded envelopes are served from.
    pub target_origin: TargetOrigin,
    mappings: Vec<EnvelopeMapping>,
}

impl EnvelopeLocator {
    pub fn new(target_origin: TargetOrigin, mappings: Vec<EnvelopeMapping>) -> Self {
        Self {
            target_origin,
            mappings,
        }
    }

    pub fn mapping_for(&self, file_name: &str) -> Option<&EnvelopeMapping> {
        self.mappings.iter().find(|m| m.matches(file_name))
    }

    pub fn mappings(&self) -> &[EnvelopeMapping] {
        &self.mappings
    }
}
