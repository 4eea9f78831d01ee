use std::time::Duration;

use serde::Deserialize;

use envbus_core::error::{BusError, Result};
use envbus_core::protocol::TargetOrigin;

use crate::lifecycle::RetryPolicy;
use crate::locator::{EnvelopeLocator, EnvelopeMapping};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    pub version: u32,

    #[serde(default)]
    pub endpoint: EndpointSection,

    #[serde(default)]
    pub handshake: HandshakeSection,

    #[serde(default)]
    pub locator: LocatorSection,
}

impl BusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(BusError::UnsupportedVersion);
        }

        self.endpoint.validate()?;
        self.handshake.validate()?;
        self.locator.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSection {
    /// Our own origin, seen by the peer as the sender origin.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Accepted peer origin (`"*"` disables the check).
    #[serde(default)]
    pub target_origin: TargetOrigin,
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            target_origin: TargetOrigin::Any,
        }
    }
}

impl EndpointSection {
    pub fn validate(&self) -> Result<()> {
        if self.origin.trim().is_empty() {
            return Err(BusError::Config("endpoint.origin must not be empty".into()));
        }
        if let TargetOrigin::Exact(o) = &self.target_origin {
            if o.is_empty() {
                return Err(BusError::Config(
                    "endpoint.target_origin must be \"*\" or a non-empty origin".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandshakeSection {
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// `None` keeps retrying until disposal.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for HandshakeSection {
    fn default() -> Self {
        Self {
            retry_interval_ms: default_retry_interval_ms(),
            max_attempts: None,
        }
    }
}

impl HandshakeSection {
    pub fn validate(&self) -> Result<()> {
        if !(10..=60000).contains(&self.retry_interval_ms) {
            return Err(BusError::Config(
                "handshake.retry_interval_ms must be between 10 and 60000".into(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(BusError::Config(
                "handshake.max_attempts must be at least 1 (omit it for unbounded)".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(self.retry_interval_ms),
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LocatorSection {
    #[serde(default)]
    pub target_origin: TargetOrigin,

    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
}

impl LocatorSection {
    pub fn validate(&self) -> Result<()> {
        for m in &self.mappings {
            if m.file_pattern.trim().is_empty() {
                return Err(BusError::Config(format!(
                    "locator mapping {} has an empty file_pattern",
                    m.mapping_type
                )));
            }
            if m.envelope_path.trim().is_empty() {
                return Err(BusError::Config(format!(
                    "locator mapping {} has an empty envelope_path",
                    m.mapping_type
                )));
            }
        }
        Ok(())
    }

    pub fn build_locator(&self) -> EnvelopeLocator {
        EnvelopeLocator::new(
            self.target_origin.clone(),
            self.mappings
                .iter()
                .map(|m| {
                    EnvelopeMapping::new(
                        &m.mapping_type,
                        &m.file_pattern,
                        &m.resources_path_prefix,
                        &m.envelope_path,
                    )
                })
                .collect(),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingConfig {
    #[serde(rename = "type")]
    pub mapping_type: String,
    pub file_pattern: String,
    #[serde(default)]
    pub resources_path_prefix: String,
    pub envelope_path: String,
}

fn default_origin() -> String {
    "null".into()
}
fn default_retry_interval_ms() -> u64 {
    100
}
