//! Terminal handlers invoked ahead of the chat proxy when the intent
//! classifier signals a match. Each returns one finished assistant message
//! (success or classified failure); missing preconditions never reach here,
//! they fall through to plain chat during classification.
pub mod convert;
pub mod files;
pub mod image;
