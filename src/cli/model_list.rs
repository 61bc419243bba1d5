//! Model listing functionality

use std::error::Error;

use crate::core::config::Config;
use crate::core::models::{Endpoint, ModelCatalog};

pub fn list_models(config: &Config, endpoint: Option<&str>) -> Result<(), Box<dyn Error>> {
    let catalog = ModelCatalog::load(config);
    let endpoints = match endpoint {
        Some(name) => vec![name.parse::<Endpoint>()?],
        None => Endpoint::ALL.to_vec(),
    };
    print!("{}", format_model_list(&catalog, &endpoints, &config.session.model));
    Ok(())
}

pub fn format_model_list(catalog: &ModelCatalog, endpoints: &[Endpoint], default_model: &str) -> String {
    let mut out = String::new();
    for endpoint in endpoints {
        out.push_str(&format!("🤖 {} ({})\n", endpoint.display_name(), endpoint));
        let models = catalog.models(*endpoint);
        if models.is_empty() {
            out.push_str("  No models configured.\n");
        }
        for model in models {
            if model == default_model {
                out.push_str(&format!("  • {model} (default)\n"));
            } else {
                out.push_str(&format!("  • {model}\n"));
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::test_catalog;

    #[test]
    fn lists_each_endpoint_with_default_marker() {
        let text = format_model_list(&test_catalog(), &Endpoint::ALL, "gemini-pro");
        assert!(text.contains("🤖 Google Gemini (gemini)\n  • gemini-pro (default)\n  • gemini-1.5-flash\n"));
        assert!(text.contains("🤖 OpenAI (openai)\n  • gpt-3.5-turbo\n  • gpt-4\n"));
    }

    #[test]
    fn empty_catalog_entry_is_called_out() {
        let catalog = ModelCatalog {
            gemini: Vec::new(),
            openai: Vec::new(),
        };
        let text = format_model_list(&catalog, &[Endpoint::OpenAi], "");
        assert!(text.contains("No models configured."));
    }
}
