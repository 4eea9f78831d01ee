//! Wire-level bus message (JSON).
//!
//! Every frame posted between a channel and its envelope is one
//! `EnvelopeBusMessage`. `purpose` decides how the receiver dispatches it,
//! `type` names the method or shared value it targets.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{BusError, RemoteError, Result};

/// How a receiver dispatches a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Purpose {
    Request,
    Response,
    Notification,
    SharedValueUpdate,
    SharedValueGetDefault,
}

impl Purpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::Request => "REQUEST",
            Purpose::Response => "RESPONSE",
            Purpose::Notification => "NOTIFICATION",
            Purpose::SharedValueUpdate => "SHARED_VALUE_UPDATE",
            Purpose::SharedValueGetDefault => "SHARED_VALUE_GET_DEFAULT",
        }
    }

    /// Whether messages of this purpose carry a `requestId`.
    pub fn is_correlated(self) -> bool {
        matches!(self, Purpose::Request | Purpose::Response)
    }
}

/// One unit of wire traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeBusMessage {
    pub purpose: Purpose,
    /// Method or shared value name (field name is `type` in JSON).
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Connection id (the channel endpoint's id) this message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_endpoint_id: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

// A field that is present but `null` stays `Some(Value::Null)` so re-encoding
// reproduces the frame exactly.
fn present<'de, D>(d: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(d).map(Some)
}

impl EnvelopeBusMessage {
    fn bare(purpose: Purpose, msg_type: impl Into<String>) -> Self {
        Self {
            purpose,
            msg_type: msg_type.into(),
            request_id: None,
            target_endpoint_id: None,
            data: None,
            error: None,
        }
    }

    pub fn request(msg_type: impl Into<String>, request_id: impl Into<String>, data: Value) -> Self {
        Self {
            request_id: Some(request_id.into()),
            data: Some(data),
            ..Self::bare(Purpose::Request, msg_type)
        }
    }

    pub fn response_ok(msg_type: impl Into<String>, request_id: impl Into<String>, data: Value) -> Self {
        Self {
            request_id: Some(request_id.into()),
            data: Some(data),
            ..Self::bare(Purpose::Response, msg_type)
        }
    }

    pub fn response_err(
        msg_type: impl Into<String>,
        request_id: impl Into<String>,
        error: &RemoteError,
    ) -> Result<Self> {
        Ok(Self {
            request_id: Some(request_id.into()),
            error: Some(serde_json::to_value(error)?),
            ..Self::bare(Purpose::Response, msg_type)
        })
    }

    pub fn notification(msg_type: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::bare(Purpose::Notification, msg_type)
        }
    }

    pub fn shared_value_update(msg_type: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::bare(Purpose::SharedValueUpdate, msg_type)
        }
    }

    pub fn shared_value_get_default(msg_type: impl Into<String>) -> Self {
        Self::bare(Purpose::SharedValueGetDefault, msg_type)
    }

    /// Stamp the connection id.
    pub fn addressed_to(mut self, endpoint_id: Option<&str>) -> Self {
        self.target_endpoint_id = endpoint_id.map(str::to_owned);
        self
    }

    /// Structural checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.msg_type.is_empty() {
            return Err(BusError::Malformed("empty type".into()));
        }
        if self.purpose.is_correlated() && self.request_id.is_none() {
            return Err(BusError::Malformed(format!(
                "{} without requestId",
                self.purpose.as_str()
            )));
        }
        if self.error.is_some() && self.purpose != Purpose::Response {
            return Err(BusError::Malformed(format!(
                "error field on {}",
                self.purpose.as_str()
            )));
        }
        Ok(())
    }

    /// Outcome carried by a `RESPONSE`: `data` on success, `error` on failure.
    pub fn into_outcome(self) -> std::result::Result<Value, RemoteError> {
        match self.error {
            Some(raw) => Err(serde_json::from_value::<RemoteError>(raw.clone())
                .unwrap_or_else(|_| RemoteError::new("REMOTE", raw.to_string()))),
            None => Ok(self.data.unwrap_or(Value::Null)),
        }
    }
}

/// Encode a message to its JSON wire form.
pub fn encode(msg: &EnvelopeBusMessage) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| BusError::Codec(format!("encode failed: {e}")))
}

/// Decode and validate a JSON wire frame.
pub fn decode(raw: &str) -> Result<EnvelopeBusMessage> {
    let msg: EnvelopeBusMessage = serde_json::from_str(raw)
        .map_err(|e| BusError::Malformed(format!("invalid message json: {e}")))?;
    msg.validate()?;
    Ok(msg)
}
