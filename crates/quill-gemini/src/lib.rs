//! quill-gemini
//!
//! Gemini `generateContent` adapter for the `GenerativeService` port.

pub mod client;
pub mod wire;

pub use self::client::{GeminiService, classify_status};
