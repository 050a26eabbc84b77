use cached::proc_macro::cached;
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Meter};

const METER_NAME: &str = "heatpump_cop";

pub fn increment(name: &'static str, labels: &[(&str, &str)]) {
    counter(name).add(1, &key_values(labels));
}

pub fn set(name: &'static str, value: f64, labels: &[(&str, &str)]) {
    gauge(name).record(value, &key_values(labels));
}

fn key_values(labels: &[(&str, &str)]) -> Vec<KeyValue> {
    labels
        .iter()
        .map(|(k, v)| KeyValue::new(k.to_string(), v.to_string()))
        .collect()
}

fn meter() -> Meter {
    opentelemetry::global::meter(METER_NAME)
}

#[cached]
fn counter(name: &'static str) -> Counter<u64> {
    meter().u64_counter(name).build()
}

#[cached]
fn gauge(name: &'static str) -> Gauge<f64> {
    meter().f64_gauge(name).build()
}
