//! Secret types for keeping room credentials out of logs.
//!
//! Re-exports the [`secrecy`] types used for anything that grants access to a
//! room: encoded room tokens, signaling passwords, signatures.
//!
//! `SecretString` implements `Debug` with redaction, so a struct that derives
//! `Debug` and holds a token stays safe to pass to `tracing` fields.
//! The inner value is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct JoinCredentials {
//!     room_hint: String,
//!     token: SecretString,
//! }
//!
//! let creds = JoinCredentials {
//!     room_hint: "lobby".to_string(),
//!     token: SecretString::from("eyJ0b2tlbklkIjoiNTU5ZWU1MGUifQ=="),
//! };
//!
//! assert!(!format!("{creds:?}").contains("eyJ0"));
//! assert!(creds.token.expose_secret().starts_with("eyJ0"));
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
