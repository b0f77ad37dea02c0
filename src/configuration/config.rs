use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::{debug, info};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Application configuration structure that defines all runtime parameters.
///
/// Every value can come from a command-line flag, from an environment variable, or from a TOML
/// file passed with `--config`. When a file is given it is the only source: flags other than
/// `--config` are ignored.
///
/// # Fields Overview
///
/// - `bind_address` / `port`: where the HTTP server listens
/// - `max_requests`: maximum number of stored captures, `0` or negative means unlimited
/// - `retention_seconds`: maximum age of a stored capture, `0` or negative means unlimited
/// - `proxy_hostname`: enables stripping of headers injected by the named reverse proxy
/// - `max_body_bytes`: largest inbound payload accepted by the capture endpoint
/// - `frontend_dist_dir`: directory holding a built frontend, served at `/` when present
#[derive(Parser, Deserialize, Debug, Clone, PartialEq)]
#[command(name = "http-intercepter")]
#[command(about = "Capture and inspect arbitrary inbound HTTP requests")]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Network address to bind the server to.
    ///
    /// # Command Line
    /// Use `--bind-address <ADDRESS>` to set this value from the CLI
    #[arg(long, env = "INTERCEPTER_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// TCP port of the HTTP server.
    #[arg(long, env = "INTERCEPTER_PORT", default_value_t = 8181)]
    pub port: u16,

    /// Maximum number of captures kept in memory.
    ///
    /// When the store grows past this count the oldest captures are evicted. Setting this to
    /// `0` (or a negative number) disables the limit.
    #[arg(long, env = "MAX_REQUESTS", default_value_t = 0, allow_hyphen_values = true)]
    pub max_requests: i64,

    /// Retention window in seconds.
    ///
    /// Captures older than this are evicted. Setting this to `0` (or a negative number) keeps
    /// captures forever.
    #[arg(long, env = "RETENTION_SECONDS", default_value_t = 0, allow_hyphen_values = true)]
    pub retention_seconds: i64,

    /// Hostname of the reverse proxy in front of this service.
    #[arg(long, env = "PROXY_HOSTNAME")]
    pub proxy_hostname: Option<String>,

    /// Largest accepted request payload, in bytes.
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Directory containing the built frontend.
    #[arg(long, env = "FRONTEND_DIST_DIR", default_value = "frontend-dist")]
    pub frontend_dist_dir: PathBuf,

    /// TOML configuration file.
    ///
    /// Not part of the file format itself.
    #[arg(long = "config")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0"),
            port: 8181,
            max_requests: 0,
            retention_seconds: 0,
            proxy_hostname: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            frontend_dist_dir: PathBuf::from("frontend-dist"),
            config_file: None,
        }
    }
}

impl Config {
    /// Builds the configuration from the process arguments and environment.
    ///
    /// If `--config <FILE>` is present the file is loaded instead of the flags.
    ///
    /// # Panics
    /// Like any `clap` parser, exits the process with a usage message when the arguments cannot
    /// be parsed.
    pub fn from_args() -> Result<Self, ConfigError> {
        Self::resolve(Config::parse())
    }

    /// Same as [`Config::from_args`] but reads an explicit argument list.
    pub fn try_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let parsed =
            Config::try_parse_from(args).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        Self::resolve(parsed)
    }

    /// Loads and validates a TOML configuration file.
    ///
    /// Missing keys take their default value.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let mut config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.config_file = Some(path.to_path_buf());
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn resolve(mut parsed: Config) -> Result<Self, ConfigError> {
        if let Some(path) = parsed.config_file.clone() {
            return Self::from_file(&path);
        }
        parsed.normalize();
        parsed.validate()?;
        debug!("Configuration resolved from arguments: {:?}", parsed);
        Ok(parsed)
    }

    // An empty PROXY_HOSTNAME in the environment means "no proxy".
    fn normalize(&mut self) {
        if let Some(host) = &self.proxy_hostname {
            let trimmed = host.trim();
            self.proxy_hostname = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            };
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::BadIPFormatting(format!("{}: {}", self.bind_address, e)))?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "max_body_bytes must be greater than 0",
            )));
        }
        Ok(())
    }

    /// Socket address the web server binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self
            .bind_address
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::BadIPFormatting(format!("{}: {}", self.bind_address, e)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const ENV_KEYS: [&str; 7] = [
        "INTERCEPTER_BIND_ADDRESS",
        "INTERCEPTER_PORT",
        "MAX_REQUESTS",
        "RETENTION_SECONDS",
        "PROXY_HOSTNAME",
        "MAX_BODY_BYTES",
        "FRONTEND_DIST_DIR",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_arguments() {
        clear_env();
        let config = Config::try_from_iter(["http-intercepter"]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_from_args() {
        clear_env();
        let config = Config::try_from_iter([
            "http-intercepter",
            "--bind-address",
            "127.0.0.1",
            "--port",
            "9000",
            "--max-requests",
            "50",
            "--retention-seconds",
            "-1",
            "--proxy-hostname",
            "proxy.example",
        ])
        .unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_requests, 50);
        assert_eq!(config.retention_seconds, -1);
        assert_eq!(config.proxy_hostname.as_deref(), Some("proxy.example"));
        assert_eq!(
            config.socket_addr().unwrap(),
            "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    #[serial]
    fn test_environment_fallback() {
        clear_env();
        std::env::set_var("MAX_REQUESTS", "3");
        std::env::set_var("RETENTION_SECONDS", "60");
        std::env::set_var("PROXY_HOSTNAME", "  ");

        let config = Config::try_from_iter(["http-intercepter"]).unwrap();
        clear_env();

        assert_eq!(config.max_requests, 3);
        assert_eq!(config.retention_seconds, 60);
        assert_eq!(config.proxy_hostname, None);
    }

    #[test]
    #[serial]
    fn test_from_file() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "port = 8282\nmax_requests = 10\nproxy_hostname = \"edge.example\""
        )
        .unwrap();

        let config = Config::try_from_iter([
            "http-intercepter".into(),
            "--config".into(),
            file.path().as_os_str().to_owned(),
        ])
        .unwrap();

        assert_eq!(config.port, 8282);
        assert_eq!(config.max_requests, 10);
        assert_eq!(config.retention_seconds, 0);
        assert_eq!(config.proxy_hostname.as_deref(), Some("edge.example"));
        assert_eq!(config.config_file.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_from_file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_sessions = 10").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::TomlError(_)));
    }

    #[test]
    fn test_from_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/http-intercepter.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_validate() {
        let bad_ip = Config {
            bind_address: String::from("not-an-ip"),
            ..Config::default()
        };
        assert!(matches!(
            bad_ip.validate(),
            Err(ConfigError::BadIPFormatting(_))
        ));

        let no_body = Config {
            max_body_bytes: 0,
            ..Config::default()
        };
        assert!(matches!(
            no_body.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
