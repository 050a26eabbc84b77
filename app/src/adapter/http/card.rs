use std::sync::Arc;

use actix_web::{HttpResponse, web};
use serde::Serialize;
use tokio::sync::watch;

use crate::card::{CardConfiguration, CardState};

use super::ApiResponse;

pub fn routes(state_rx: watch::Receiver<CardState>, config: Arc<CardConfiguration>) -> actix_web::Scope {
    web::scope("/card")
        .route("/state", web::get().to(get_state))
        .route("/config", web::get().to(get_config))
        .app_data(web::Data::new(state_rx))
        .app_data(web::Data::from(config))
}

async fn get_state(state_rx: web::Data<watch::Receiver<CardState>>) -> ApiResponse {
    let state = state_rx.borrow().clone();
    Ok(HttpResponse::Ok().json(state))
}

async fn get_config(config: web::Data<CardConfiguration>) -> ApiResponse {
    #[derive(Serialize)]
    struct ConfigView<'a> {
        #[serde(flatten)]
        config: &'a CardConfiguration,
        card_size: usize,
    }

    Ok(HttpResponse::Ok().json(ConfigView {
        config: config.get_ref(),
        card_size: config.card_size(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{AggregatedValue, Phase};
    use actix_web::{App, test};
    use assert_json_diff::assert_json_include;
    use serde_json::json;

    #[actix_web::test]
    async fn serves_current_state() {
        let mut state = CardState::default();
        state.values.insert("sensor.elec".to_string(), AggregatedValue::new("5", "kWh"));
        state.cop = "2,00".to_string();
        state.phase = Phase::Idle;
        let (_tx, rx) = watch::channel(state);
        let app = test::init_service(App::new().service(routes(rx, Arc::new(CardConfiguration::stub())))).await;

        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/card/state").to_request()).await;

        assert_json_include!(
            actual: body,
            expected: json!({
                "values": { "sensor.elec": { "value": "5", "unit": "kWh" } },
                "cop": "2,00",
                "phase": "idle"
            })
        );
    }

    #[actix_web::test]
    async fn serves_config_with_size() {
        let (_tx, rx) = watch::channel(CardState::default());
        let config = Arc::new(CardConfiguration::stub());
        let expected_size = config.card_size();
        let app = test::init_service(App::new().service(routes(rx, config))).await;

        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/card/config").to_request()).await;

        assert_eq!(body["card_size"], json!(expected_size));
        assert_eq!(body["title"], json!("Heat pump"));
    }
}
