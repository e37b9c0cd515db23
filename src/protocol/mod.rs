//! MESH inter-agent protocol.
//!
//! - Envelopes with correlation IDs and reply routing
//! - Open set of message types
//! - Wire codec tolerant of malformed nested messages

pub mod codec;
pub mod envelope;
pub mod types;

pub use codec::{decode_request, encode_message, CodecError};
pub use envelope::{Envelope, Payload, ReplyTo, MESH_PROTOCOL, UNKNOWN};
pub use types::MessageType;
