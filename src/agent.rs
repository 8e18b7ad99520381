// src/agent.rs
//! System instruction handed to the generation provider on every call.

use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_AGENT_DEFINITION: &str = "You are a Twitter research assistant that retrieves and \
summarizes a user's recent tweeting activity.";

/// Read the agent definition, falling back to the built-in one when the file
/// is missing or empty.
pub fn load_agent_definition<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(s) if !s.trim().is_empty() => {
            info!(path = %path.display(), bytes = s.len(), "agent definition loaded");
            s.trim().to_string()
        }
        Ok(_) => {
            warn!(path = %path.display(), "agent definition is empty, using default");
            DEFAULT_AGENT_DEFINITION.to_string()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "agent definition not readable, using default");
            DEFAULT_AGENT_DEFINITION.to_string()
        }
    }
}
