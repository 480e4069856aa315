//! Render fingerprinting and an in-memory frame cache.
//!
//! A [`Fingerprint`] identifies a fully determined render: shader source,
//! resolved input values, time code, and output dimensions. Two requests
//! with the same fingerprint produce byte-identical frames, so the cache
//! can hand back the encoded PNG without touching the engine.

pub mod cache;
pub mod fingerprint;

pub use cache::{CacheStats, RenderCache};
pub use fingerprint::{CanonValue, Fingerprint};
