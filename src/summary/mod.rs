// src/summary/mod.rs
//! Post normalization and recap prompt construction.

pub mod normalize;
pub mod prompt;

pub use normalize::{normalize, Field, NormalizedPost, RawPostRecord};
pub use prompt::{build_prompt, ACCESS_METHOD, MAX_POST_CHARS};
