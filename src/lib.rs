// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod agent;
pub mod api;
pub mod chat;
pub mod config;
pub mod frames;
pub mod generation;
pub mod sela;
pub mod summary;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::chat::{ChatMessage, ChatOrchestrator, Role};
pub use crate::frames::StreamFrame;
