use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, bail};
use futures::{SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::card::PeriodGranularity;
use crate::core::time::DateTime;
use crate::port::{RawStatisticPoint, StatisticType, StatisticsQuery, StatisticsResult};

const STATISTICS_REQUEST_ID: u64 = 1;

/// Recorder access over the Home Assistant WebSocket API. Every query uses its own connection.
#[derive(Debug, Clone)]
pub struct HaWebSocketClient {
    url: String,
    token: String,
    timeout: Duration,
}

impl HaWebSocketClient {
    pub fn new(base_url: &str, token: &str) -> anyhow::Result<Self> {
        Ok(Self {
            url: websocket_url(base_url)?,
            token: token.to_owned(),
            timeout: Duration::from_secs(30),
        })
    }

    #[tracing::instrument(skip_all, fields(entity_ids = ?query.entity_ids, period = %query.period))]
    pub async fn statistics_during_period(&self, query: &StatisticsQuery) -> anyhow::Result<StatisticsResult> {
        tokio::time::timeout(self.timeout, self.query_statistics(query))
            .await
            .with_context(|| format!("Timeout after {:?} waiting for statistics", self.timeout))?
    }

    async fn query_statistics(&self, query: &StatisticsQuery) -> anyhow::Result<StatisticsResult> {
        let (mut ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .with_context(|| format!("Error connecting to {}", self.url))?;

        self.authenticate(&mut ws).await?;

        let request = StatisticsRequest::new(STATISTICS_REQUEST_ID, query);
        ws.send(Message::text(serde_json::to_string(&request)?))
            .await
            .context("Error sending statistics request")?;

        let result = loop {
            match next_message(&mut ws).await? {
                ServerMessage::Result {
                    id,
                    success,
                    result,
                    error,
                } if id == request.id => {
                    if !success {
                        let reason = error.map(|e| format!("{}: {}", e.code, e.message)).unwrap_or_default();
                        bail!("Statistics request failed: {}", reason);
                    }
                    break result.unwrap_or(serde_json::Value::Null);
                }
                other => tracing::trace!("Ignoring message {:?}", other),
            }
        };

        if let Err(e) = ws.close(None).await {
            tracing::debug!("Error closing websocket: {}", e);
        }

        parse_statistics(result)
    }

    async fn authenticate<S>(&self, ws: &mut S) -> anyhow::Result<()>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>>
            + futures::Sink<Message, Error = tungstenite::Error>
            + Unpin,
    {
        loop {
            match next_message(ws).await? {
                ServerMessage::AuthRequired => {
                    let auth = AuthMessage {
                        kind: "auth",
                        access_token: &self.token,
                    };
                    ws.send(Message::text(serde_json::to_string(&auth)?))
                        .await
                        .context("Error sending auth message")?;
                }
                ServerMessage::AuthOk => return Ok(()),
                ServerMessage::AuthInvalid { message } => {
                    bail!("Authentication failed: {}", message.unwrap_or_default())
                }
                other => tracing::trace!("Ignoring message {:?} before authentication", other),
            }
        }
    }
}

async fn next_message<S>(ws: &mut S) -> anyhow::Result<ServerMessage>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(message) = ws.next().await {
        let message = message.context("Error reading from websocket")?;

        if message.is_close() {
            break;
        }
        if !message.is_text() {
            continue;
        }

        let text = message.to_text()?;
        return serde_json::from_str(text).with_context(|| format!("Error parsing message {}", text));
    }

    bail!("Websocket closed by Home Assistant")
}

fn websocket_url(base_url: &str) -> anyhow::Result<String> {
    let base_url = base_url.trim_end_matches('/');

    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        bail!("Unsupported Home Assistant url {}", base_url);
    };

    Ok(format!("{}/api/websocket", ws_base))
}

fn parse_statistics(result: serde_json::Value) -> anyhow::Result<StatisticsResult> {
    if result.is_null() {
        return Ok(StatisticsResult::new());
    }

    let wire: HashMap<String, Vec<WirePoint>> =
        serde_json::from_value(result).context("Error parsing statistics result")?;

    Ok(wire
        .into_iter()
        .map(|(entity_id, points)| (entity_id, points.into_iter().map(RawStatisticPoint::from).collect()))
        .collect())
}

#[derive(Serialize)]
struct AuthMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    access_token: &'a str,
}

#[derive(Debug, Serialize)]
struct StatisticsRequest<'a> {
    id: u64,
    #[serde(rename = "type")]
    kind: &'static str,
    start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<String>,
    statistic_ids: &'a [String],
    period: PeriodGranularity,
    types: &'a [StatisticType],
}

impl<'a> StatisticsRequest<'a> {
    fn new(id: u64, query: &'a StatisticsQuery) -> Self {
        Self {
            id,
            kind: "recorder/statistics_during_period",
            start_time: query.start.to_iso_string(),
            end_time: query.end.as_ref().map(DateTime::to_iso_string),
            statistic_ids: &query.entity_ids,
            period: query.period,
            types: &query.types,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    AuthRequired,
    AuthOk,
    AuthInvalid {
        message: Option<String>,
    },
    Result {
        id: u64,
        success: bool,
        result: Option<serde_json::Value>,
        error: Option<ResultError>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ResultError {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WirePoint {
    start: Option<WireTimestamp>,
    end: Option<WireTimestamp>,
    change: Option<f64>,
    mean: Option<f64>,
}

/// Recent Home Assistant versions send epoch millis, older ones ISO strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Millis(f64),
    Iso(String),
}

impl WireTimestamp {
    fn to_datetime(&self) -> Option<DateTime> {
        match self {
            WireTimestamp::Millis(millis) => DateTime::from_millis(*millis as i64),
            WireTimestamp::Iso(iso) => DateTime::from_iso(iso).ok(),
        }
    }
}

impl From<WirePoint> for RawStatisticPoint {
    fn from(point: WirePoint) -> Self {
        RawStatisticPoint {
            start: point.start.as_ref().and_then(WireTimestamp::to_datetime),
            end: point.end.as_ref().and_then(WireTimestamp::to_datetime),
            change: point.change,
            mean: point.mean,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::DateRange;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn websocket_url_follows_scheme() {
        assert_eq!(
            websocket_url("http://homeassistant.local:8123/").unwrap(),
            "ws://homeassistant.local:8123/api/websocket"
        );
        assert_eq!(websocket_url("https://ha.example.org").unwrap(), "wss://ha.example.org/api/websocket");
        assert!(websocket_url("ftp://ha").is_err());
    }

    #[test]
    fn statistics_request_matches_recorder_api() {
        let range = DateRange::new(
            DateTime::from_iso("2024-11-01T00:00:00Z").unwrap(),
            Some(DateTime::from_iso("2024-11-11T00:00:00Z").unwrap()),
        )
        .unwrap();
        let query = StatisticsQuery::new("sensor.elec", &range, PeriodGranularity::Day, StatisticType::Change);

        let request = serde_json::to_value(StatisticsRequest::new(7, &query)).unwrap();

        assert_json_eq!(
            request,
            json!({
                "id": 7,
                "type": "recorder/statistics_during_period",
                "start_time": range.start().to_iso_string(),
                "end_time": range.end().unwrap().to_iso_string(),
                "statistic_ids": ["sensor.elec"],
                "period": "day",
                "types": ["change"]
            })
        );
    }

    #[test]
    fn open_range_request_has_no_end_time() {
        let range = DateRange::open(DateTime::from_iso("2024-11-01T00:00:00Z").unwrap());
        let query = StatisticsQuery::new("sensor.temp", &range, PeriodGranularity::Hour, StatisticType::Mean);

        let request = serde_json::to_value(StatisticsRequest::new(1, &query)).unwrap();

        assert!(request.get("end_time").is_none());
        assert_eq!(request["types"], json!(["mean"]));
    }

    #[test]
    fn parses_server_messages() {
        let auth: ServerMessage = serde_json::from_str(r#"{"type":"auth_required","ha_version":"2024.11.0"}"#).unwrap();
        assert!(matches!(auth, ServerMessage::AuthRequired));

        let invalid: ServerMessage =
            serde_json::from_str(r#"{"type":"auth_invalid","message":"Invalid password"}"#).unwrap();
        assert!(matches!(invalid, ServerMessage::AuthInvalid { message: Some(m) } if m == "Invalid password"));

        let failed: ServerMessage = serde_json::from_str(
            r#"{"id":1,"type":"result","success":false,"error":{"code":"invalid_format","message":"bad period"}}"#,
        )
        .unwrap();
        assert!(matches!(failed, ServerMessage::Result { success: false, error: Some(_), .. }));

        let event: ServerMessage = serde_json::from_str(r#"{"type":"event","event":{}}"#).unwrap();
        assert!(matches!(event, ServerMessage::Other));
    }

    #[test]
    fn parses_statistics_with_millis_and_iso_timestamps() {
        let result = parse_statistics(json!({
            "sensor.elec": [
                { "start": 1730419200000i64, "end": 1730505600000i64, "change": 2.5 },
                { "start": "2024-11-02T00:00:00+00:00", "end": "2024-11-03T00:00:00+00:00", "change": null }
            ],
            "sensor.temp": [
                { "start": 1730419200000i64, "mean": 4.2, "min": 1.0, "max": 8.0 }
            ]
        }))
        .unwrap();

        let elec = &result["sensor.elec"];
        assert_eq!(elec.len(), 2);
        assert_eq!(elec[0].change, Some(2.5));
        assert_eq!(elec[0].start, DateTime::from_iso("2024-11-01T00:00:00Z").ok());
        assert_eq!(elec[0].end, DateTime::from_iso("2024-11-02T00:00:00Z").ok());
        assert_eq!(elec[1].change, None);
        assert_eq!(elec[1].start, DateTime::from_iso("2024-11-02T00:00:00Z").ok());

        let temp = &result["sensor.temp"];
        assert_eq!(temp[0].mean, Some(4.2));
        assert_eq!(temp[0].end, None);
    }

    #[test]
    fn null_result_is_empty() {
        assert!(parse_statistics(serde_json::Value::Null).unwrap().is_empty());
    }
}
