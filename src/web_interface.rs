// Web Interface module root
pub mod capture;
pub mod live_channel;
pub mod routes;
pub mod types;
pub mod web_server;


// Re-export commonly used items
pub use web_server::{routes, AppState, WebServer};
