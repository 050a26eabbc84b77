mod http;
mod ws;

pub use http::HaHttpClient;
pub use ws::HaWebSocketClient;
