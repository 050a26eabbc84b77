use std::sync::Arc;

use card::{CardConfiguration, CardInfo, CardRegistry, RANGE_PUBLISHER_KEY, RefreshOrchestrator};
use settings::Settings;

use crate::adapter::range_selection::RangeSelection;

mod adapter;
mod card;
mod core;
pub mod port;
mod settings;

#[tokio::main(flavor = "multi_thread")]
pub async fn main() {
    let settings = Settings::new().expect("Error reading configuration");
    settings.monitoring.init().expect("Error initializing monitoring");

    let card_config = match card_configuration(&settings) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!("Invalid card configuration: {}", e);
            eprintln!("Invalid card configuration: {e}");
            std::process::exit(1);
        }
    };

    let mut registry = CardRegistry::default();
    if let Err(e) = registry.register(CardInfo::cop_card()) {
        tracing::error!("Error registering card: {}", e);
    }
    for info in registry.cards() {
        tracing::info!("Available card {}: {}", info.card_type, info.description);
    }

    let host = settings
        .homeassistant
        .new_host()
        .expect("Error initializing Home Assistant connection");

    tracing::info!("Loading current entity states");
    if let Err(e) = host.refresh_states().await {
        tracing::warn!("Error loading current entity states, starting without: {:?}", e);
    }

    let mut orchestrator =
        RefreshOrchestrator::new(card_config.clone(), settings.refresh.policy, settings.refresh.mean_weighting);
    let state_rx = orchestrator.subscribe();
    orchestrator.on_attach(host.clone());

    let selection = Arc::new(RangeSelection::default());
    host.register_publisher(RANGE_PUBLISHER_KEY, selection.clone());
    let state_refresher = settings.homeassistant.new_state_refresher(host.clone());

    let http_server_exec = {
        let selection = selection.clone();
        let card_config = card_config.clone();

        async move {
            settings
                .http_server
                .run_server(move || {
                    vec![
                        adapter::http::card_routes(state_rx.clone(), card_config.clone()),
                        adapter::http::range_routes(selection.clone()),
                    ]
                })
                .await
                .expect("HTTP server execution failed");
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Error waiting for shutdown signal: {}", e);
        }
        tracing::info!("Shutting down");
    };

    tracing::info!("Starting main loop");

    tokio::select!(
        _ = orchestrator.run(shutdown) => {},
        _ = http_server_exec => {},
        _ = state_refresher => {},
    );
}

fn card_configuration(settings: &Settings) -> Result<CardConfiguration, card::ConfigurationError> {
    match &settings.card {
        Some(raw) => CardConfiguration::from_raw(raw.clone()),
        None => {
            tracing::warn!("No card configured, using example configuration");
            Ok(CardConfiguration::stub())
        }
    }
}
