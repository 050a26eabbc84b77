pub mod homeassistant;
pub mod http;
pub mod range_selection;
