//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports [`secrecy`] types. Everything that can grant access in this
//! workspace goes through them: the JWT signing secret, the admin API key,
//! and issued bearer tokens held by the client-side cache.
//!
//! `SecretString` implements `Debug` with redaction, so a struct deriving
//! `Debug` around one stays safe to log. The value is zeroized on drop.
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct SigningMaterial {
//!     issuer: String,
//!     secret: SecretString,
//! }
//!
//! let material = SigningMaterial {
//!     issuer: "https://id.marquee.test".to_string(),
//!     secret: SecretString::from("not-for-logs"),
//! };
//!
//! assert!(!format!("{material:?}").contains("not-for-logs"));
//! assert_eq!(material.secret.expose_secret(), "not-for-logs");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
