use http_intercepter::configuration::config::Config;
use http_intercepter::web_interface::WebServer;
use log::{error, info};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    println!(
        "
==============================================================================
        http-intercepter v{}: capture and inspect inbound HTTP requests
==============================================================================
",
        env!("CARGO_PKG_VERSION")
    );

    info!("Importing configuration");

    let config = match Config::from_args() {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration imported successfully (max_requests={}, retention_seconds={}, proxy_hostname={})",
        config.max_requests,
        config.retention_seconds,
        config.proxy_hostname.as_deref().unwrap_or("none")
    );

    let server = WebServer::new(config);
    if let Err(e) = server.start().await {
        error!("Web server stopped: {}, exiting...", e);
        std::process::exit(1);
    }

    info!("Shutdown complete");
}
