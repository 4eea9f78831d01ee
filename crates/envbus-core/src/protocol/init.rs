//! Handshake payload.
//!
//! The channel's init request carries `data = [InitRequest, InitContext]`.
//! The envelope needs the context (file extension, locale, ...) before it can
//! build its implementation and answer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BusError, Result};

/// Method name of the init request.
pub const INIT_REQUEST: &str = "envelopeBus_initRequest";

/// Kind of host embedding the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelType {
    VscodeDesktop,
    VscodeWeb,
    Online,
    OnlineMultiFile,
    Github,
    Desktop,
    Embedded,
    Standalone,
    Other,
}

/// Who is asking: the channel's origin and endpoint id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    pub origin: String,
    pub envelope_server_id: String,
}

/// What the envelope needs to know before it can serve requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitContext {
    pub file_extension: String,
    #[serde(default)]
    pub resources_path_prefix: String,
    pub initial_locale: String,
    #[serde(default)]
    pub is_read_only: bool,
    pub channel: ChannelType,
}

/// Build the `data` field of an init request.
pub fn encode_init(req: &InitRequest, ctx: &InitContext) -> Result<Value> {
    Ok(serde_json::to_value((req, ctx))?)
}

/// Parse the `data` field of an init request.
pub fn decode_init(data: Option<&Value>) -> Result<(InitRequest, InitContext)> {
    let data = data.ok_or_else(|| BusError::Malformed("init request without data".into()))?;
    serde_json::from_value(data.clone())
        .map_err(|e| BusError::Malformed(format!("invalid init payload: {e}")))
}
