//! Wire protocol: JSON frames exchanged over the WebSocket.
//!
//! ```text
//! Phone → Desktop:  {"event":"message","data":{"type":"text","content":"hi"}}
//!                   {"event":"file","data":{"name":"a.png","type":"image/png","data":"iVBO..."}}
//! Desktop → Phone:  {"event":"file-ack","data":{"status":"received","filename":"a.png"}}
//! ```
//!
//! - [`frames`] – the outer `{"event","data"}` envelope and event names.
//! - [`envelope`] – decoding `message` bodies into [`envelope::MessageEnvelope`].
//! - [`file`] – decoding `file` bodies and validating untrusted filenames.
//! - [`error`] – [`error::DecodeError`], shared by all of the above.

pub mod envelope;
pub mod error;
pub mod file;
pub mod frames;
