//! Backend identifiers and the per-backend model catalog.

use std::fmt;
use std::str::FromStr;

use crate::core::builtin_models::find_builtin_backend;
use crate::core::config::Config;
use crate::core::error::SettingsError;
use crate::core::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Gemini,
    OpenAi,
}

impl Endpoint {
    pub const ALL: [Endpoint; 2] = [Endpoint::Gemini, Endpoint::OpenAi];

    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Gemini => "gemini",
            Endpoint::OpenAi => "openai",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Endpoint::Gemini => "Google Gemini",
            Endpoint::OpenAi => "OpenAI",
        }
    }

    /// Exact match only; session values are stored lowercase.
    pub fn parse(value: &str) -> Option<Endpoint> {
        match value {
            "gemini" => Some(Endpoint::Gemini),
            "openai" => Some(Endpoint::OpenAi),
            _ => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::parse(&s.trim().to_lowercase())
            .ok_or_else(|| SettingsError::UnknownEndpoint(s.to_string()))
    }
}

/// Models available per backend (`list_available_models`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCatalog {
    pub gemini: Vec<String>,
    pub openai: Vec<String>,
}

impl ModelCatalog {
    pub fn builtin() -> Self {
        let models_of = |endpoint: Endpoint| {
            find_builtin_backend(endpoint.as_str())
                .map(|b| b.models)
                .unwrap_or_default()
        };
        Self {
            gemini: models_of(Endpoint::Gemini),
            openai: models_of(Endpoint::OpenAi),
        }
    }

    /// Built-in catalog with any `[models]` overrides from config applied.
    pub fn load(config: &Config) -> Self {
        let mut catalog = Self::builtin();
        if let Some(gemini) = &config.models.gemini {
            catalog.gemini = gemini.clone();
        }
        if let Some(openai) = &config.models.openai {
            catalog.openai = openai.clone();
        }
        catalog
    }

    pub fn models(&self, endpoint: Endpoint) -> &[String] {
        match endpoint {
            Endpoint::Gemini => &self.gemini,
            Endpoint::OpenAi => &self.openai,
        }
    }

    pub fn contains(&self, endpoint: Endpoint, model: &str) -> bool {
        self.models(endpoint).iter().any(|m| m == model)
    }
}

/// Catalog entry for the session's current endpoint; empty for an endpoint
/// we do not recognize.
pub fn list_model_options(catalog: &ModelCatalog, session: &Session) -> Vec<String> {
    match Endpoint::parse(&session.endpoint_to_use) {
        Some(endpoint) => catalog.models(endpoint).to_vec(),
        None => Vec::new(),
    }
}

/// Re-resolve the model options and make sure the selected model is one of
/// them. A selection outside the new list falls back to its first entry, or is
/// cleared when the list is empty.
pub fn update_model_options(catalog: &ModelCatalog, session: &mut Session) {
    session.model_options = list_model_options(catalog, session);
    if !session.model_options.contains(&session.model_to_use) {
        session.model_to_use = session.model_options.first().cloned().unwrap_or_default();
    }
}
