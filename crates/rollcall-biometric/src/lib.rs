//! Fingerprint template matching for the Rollcall attendance server.
//!
//! Scanners upload a raw 512-byte template with every attendance scan. The
//! server identifies the student by comparing that template against every
//! enrolled template and picking the most similar one above a threshold.
//!
//! The similarity metric is intentionally simple: the percentage of byte
//! positions at which both templates hold the same value. Templates already
//! enrolled in deployed databases were accepted under this metric, so it
//! must stay byte-positional (not bitwise Hamming distance, not a vendor
//! score).
//!
//! # Examples
//!
//! ```
//! use rollcall_biometric::{ByteEqualityMatcher, TemplateMatcher};
//! use rollcall_core::Template;
//!
//! let enrolled = vec![7u8; 512];
//! let probe = Template::from_bytes(&enrolled).unwrap();
//!
//! let matcher = ByteEqualityMatcher::default();
//! let found = matcher
//!     .best_match(&probe, vec![(42_i64, enrolled.as_slice())])
//!     .unwrap();
//!
//! assert_eq!(found.key, 42);
//! assert_eq!(found.confidence(), 100);
//! ```

pub mod matcher;

pub use matcher::{ByteEqualityMatcher, Match, TemplateMatcher, similarity};
