//! gChat binary.
//!
//! Loads `config.toml`, starts logging and checks that a coordinator can be
//! built from the configuration. The relay that feeds chat into the
//! coordinator embeds the library; this binary does not serve connections.

use std::sync::Arc;

use tracing::{error, info};

use gchat::participant::MemoryMetadataStore;
use gchat::placeholder::{MetadataPlaceholders, StandardPlaceholders};
use gchat::{BroadcastCoordinator, Config, PlaceholderRegistry, SessionRegistry};

fn main() {
    // Load configuration
    let config = match Config::load("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    // Initialize logging
    if let Err(e) = gchat::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        if let Err(e) = gchat::logging::init_console_only(&config.logging.level) {
            eprintln!("Failed to initialize console logging: {e}");
        }
    }

    info!("gChat - chat formatting and broadcast");

    let metadata = Arc::new(MemoryMetadataStore::new());
    let placeholders = PlaceholderRegistry::new();
    placeholders.register(Arc::new(StandardPlaceholders::new(metadata.clone())));
    placeholders.register(Arc::new(MetadataPlaceholders::new(metadata.clone())));

    let sessions = Arc::new(SessionRegistry::new());
    let coordinator =
        match BroadcastCoordinator::from_config(&config, Arc::new(placeholders), sessions, metadata)
        {
            Ok(coordinator) => coordinator,
            Err(e) => {
                error!("Invalid configuration: {e}");
                std::process::exit(1);
            }
        };

    let formats = coordinator.formats().snapshot();
    for context in formats.context_names() {
        let ids: Vec<&str> = formats
            .context(context)
            .map(|set| set.formats().iter().map(|f| f.id()).collect())
            .unwrap_or_default();
        info!(context, formats = ?ids, "formats loaded");
    }
}
