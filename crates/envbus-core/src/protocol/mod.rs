//! Protocol modules.
//!
//! - `message`: the JSON envelope every frame is wrapped in.
//! - `origin`: target origin filter (`"*"` or exact).
//! - `init`: handshake payload shared by channel and envelope.
//!
//! Decoding is panic-free: malformed input is reported as `BusError`, never
//! as a crash, because frames come from a sandbox we do not trust.

pub mod init;
pub mod message;
pub mod origin;

pub use init::{ChannelType, InitContext, InitRequest, INIT_REQUEST};
pub use message::{EnvelopeBusMessage, Purpose};
pub use origin::TargetOrigin;
