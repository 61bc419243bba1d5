//! One-shot `say` command

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::backends::{HttpBackendFactory, ImageAttachment};
use crate::core::config::Config;
use crate::core::dispatcher::BackendDispatcher;
use crate::core::keyring::KeyringStore;
use crate::core::message::Message;
use crate::core::models::ModelCatalog;
use crate::ui::chat_loop::initial_session;

pub async fn run_say(
    config: &Config,
    prompt: Vec<String>,
    image: Option<PathBuf>,
    endpoint: Option<&str>,
    model: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: mmchat say <prompt>");
        std::process::exit(1);
    }

    let catalog = ModelCatalog::load(config);
    let session = initial_session(config, &catalog, endpoint, model)?;
    let image = image
        .map(|path| ImageAttachment::from_path(&path))
        .transpose()?;

    let factory = HttpBackendFactory::new(config.clone(), Arc::new(KeyringStore::new()))?;
    let dispatcher = BackendDispatcher::new(Arc::new(factory), catalog);

    let history = [Message::user(prompt.as_str())];
    match dispatcher
        .chat(&session, &prompt, &history, image.as_ref())
        .await
    {
        Ok(reply) => {
            println!("{reply}");
            Ok(())
        }
        Err(err) => {
            eprintln!("❌ Error: {err}");
            std::process::exit(1);
        }
    }
}
