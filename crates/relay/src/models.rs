//! These models represent the objects passed through the routing layer
//!
//! There are a few related formats we need to interact with:
//! - the chat interface's request payload (camelCase JSON, attachments inline)
//! - openai-style messages, sent upstream to the compatible providers
//! - anthropic-style messages, sent upstream with a separate system field
//!
//! Inbound payloads are converted into the internal structs immediately; the
//! wire-specific shapes are produced only at the provider boundary.
pub mod attachment;
pub mod content;
pub mod message;
pub mod role;
