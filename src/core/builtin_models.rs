//! Built-in model catalog
//!
//! The catalog is embedded from `builtin_models.toml` at build time and lists
//! the models each recognized backend offers by default.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinBackend {
    pub id: String,
    pub display_name: String,
    pub models: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BuiltinModelsConfig {
    backends: Vec<BuiltinBackend>,
}

/// Load built-in backends from the embedded configuration
pub fn load_builtin_backends() -> Vec<BuiltinBackend> {
    const CONFIG_CONTENT: &str = include_str!("../builtin_models.toml");

    let config: BuiltinModelsConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_models.toml");

    config.backends
}

/// Find a built-in backend by ID (case-insensitive)
pub fn find_builtin_backend(id: &str) -> Option<BuiltinBackend> {
    load_builtin_backends()
        .into_iter()
        .find(|b| b.id.eq_ignore_ascii_case(id))
}
