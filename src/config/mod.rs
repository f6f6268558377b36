//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const LOCAL_CONFIG_BASENAME: &str = "folio";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 4000;
const DEFAULT_ADMIN_PORT: u16 = 4001;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_PUBLIC_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_CACHE_SWEEP_SECS: u64 = 300;
const DEFAULT_JOBS_POLL_SECS: u64 = 15;

/// Command-line arguments for the Folio binary.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Folio content service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Folio HTTP services and job worker.
    Serve(Box<ServeArgs>),
    /// Apply pending database migrations and exit.
    Migrate,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the admin API bearer token.
    #[arg(long = "admin-token", env = "FOLIO_ADMIN_TOKEN", value_name = "TOKEN")]
    pub admin_token: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub public_ttl: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct AdminSettings {
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CollaboratorSettings {
    pub search_url: Option<Url>,
    pub cdn_url: Option<Url>,
    pub summarizer_url: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub jobs: JobsSettings,
    pub admin: AdminSettings,
    pub collaborators: CollaboratorSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    database: RawDatabase,
    #[serde(default)]
    cache: RawCache,
    #[serde(default)]
    jobs: RawJobs,
    #[serde(default)]
    admin: RawAdmin,
    #[serde(default)]
    collaborators: RawCollaborators,
    #[serde(default)]
    logging: RawLogging,
}

#[derive(Debug, Default, Deserialize)]
struct RawServer {
    host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCache {
    public_ttl_seconds: Option<u64>,
    sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawJobs {
    poll_interval_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAdmin {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCollaborators {
    search_url: Option<String>,
    cdn_url: Option<String>,
    summarizer_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLogging {
    level: Option<String>,
    json: Option<bool>,
}

/// Parse CLI arguments and resolve the full settings stack.
pub fn load_with_cli() -> Result<(CliArgs, Settings), ConfigError> {
    let cli = CliArgs::parse();
    let settings = load_settings(&cli)?;
    Ok((cli, settings))
}

pub fn load_settings(cli: &CliArgs) -> Result<Settings, ConfigError> {
    let mut builder =
        Config::builder().add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = &cli.config_file {
        builder = builder.add_source(File::from(path.clone()));
    }

    // try_parsing: environment values arrive as strings but the raw
    // settings carry numeric fields.
    builder = builder.add_source(
        Environment::with_prefix("FOLIO")
            .separator("__")
            .try_parsing(true),
    );

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    let mut settings = Settings::try_from(raw)?;

    if let Some(Command::Serve(args)) = &cli.command {
        settings.apply_overrides(&args.overrides)?;
    }

    Ok(settings)
}

impl TryFrom<RawSettings> for Settings {
    type Error = ConfigError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        let host = raw.server.host.as_deref().unwrap_or(DEFAULT_HOST);
        let public_addr = parse_addr(host, raw.server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT))?;
        let admin_addr = parse_addr(host, raw.server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT))?;

        let max_connections = NonZeroU32::new(
            raw.database
                .max_connections
                .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        )
        .ok_or_else(|| ConfigError::invalid("database.max_connections must be non-zero"))?;

        let level = match raw.logging.level.as_deref() {
            Some(value) => LevelFilter::from_str(value)
                .map_err(|_| ConfigError::invalid(format!("unknown log level `{value}`")))?,
            None => LevelFilter::INFO,
        };
        let format = if raw.logging.json.unwrap_or(false) {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };

        Ok(Settings {
            server: ServerSettings {
                public_addr,
                admin_addr,
            },
            database: DatabaseSettings {
                url: raw.database.url,
                max_connections,
            },
            cache: CacheSettings {
                public_ttl: Duration::from_secs(
                    raw.cache
                        .public_ttl_seconds
                        .unwrap_or(DEFAULT_PUBLIC_TTL_SECS),
                ),
                sweep_interval: Duration::from_secs(
                    raw.cache
                        .sweep_interval_seconds
                        .unwrap_or(DEFAULT_CACHE_SWEEP_SECS),
                ),
            },
            jobs: JobsSettings {
                poll_interval: Duration::from_secs(
                    raw.jobs.poll_interval_seconds.unwrap_or(DEFAULT_JOBS_POLL_SECS),
                ),
            },
            admin: AdminSettings {
                token: raw.admin.token,
            },
            collaborators: CollaboratorSettings {
                search_url: parse_optional_url("collaborators.search_url", raw.collaborators.search_url)?,
                cdn_url: parse_optional_url("collaborators.cdn_url", raw.collaborators.cdn_url)?,
                summarizer_url: parse_optional_url(
                    "collaborators.summarizer_url",
                    raw.collaborators.summarizer_url,
                )?,
            },
            logging: LoggingSettings { level, format },
        })
    }
}

impl Settings {
    fn apply_overrides(&mut self, overrides: &ServeOverrides) -> Result<(), ConfigError> {
        if let Some(host) = &overrides.server_host {
            self.server.public_addr = parse_addr(host, self.server.public_addr.port())?;
            self.server.admin_addr = parse_addr(host, self.server.admin_addr.port())?;
        }
        if let Some(port) = overrides.public_port {
            self.server.public_addr.set_port(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_addr.set_port(port);
        }
        if let Some(url) = &overrides.database_url {
            self.database.url = Some(url.clone());
        }
        if let Some(token) = &overrides.admin_token {
            self.admin.token = Some(token.clone());
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = LevelFilter::from_str(level)
                .map_err(|_| ConfigError::invalid(format!("unknown log level `{level}`")))?;
        }
        if let Some(json) = overrides.log_json {
            self.logging.format = if json {
                LogFormat::Json
            } else {
                LogFormat::Compact
            };
        }
        Ok(())
    }
}

fn parse_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    format!("{host}:{port}")
        .parse()
        .map_err(|_| ConfigError::invalid(format!("invalid listener address `{host}:{port}`")))
}

fn parse_optional_url(field: &str, value: Option<String>) -> Result<Option<Url>, ConfigError> {
    value
        .map(|raw| {
            Url::parse(&raw).map_err(|err| ConfigError::invalid(format!("{field}: {err}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let settings = Settings::try_from(RawSettings::default()).expect("settings");
        assert_eq!(settings.server.public_addr.port(), DEFAULT_PUBLIC_PORT);
        assert_eq!(settings.server.admin_addr.port(), DEFAULT_ADMIN_PORT);
        assert_eq!(
            settings.cache.public_ttl,
            Duration::from_secs(DEFAULT_PUBLIC_TTL_SECS)
        );
        assert_eq!(settings.logging.format, LogFormat::Compact);
        assert!(settings.database.url.is_none());
    }

    #[test]
    fn overrides_take_precedence() {
        let mut settings = Settings::try_from(RawSettings::default()).expect("settings");
        let overrides = ServeOverrides {
            public_port: Some(8080),
            database_url: Some("postgres://folio@localhost/folio".to_string()),
            log_json: Some(true),
            ..Default::default()
        };

        settings.apply_overrides(&overrides).expect("overrides");
        assert_eq!(settings.server.public_addr.port(), 8080);
        assert_eq!(
            settings.database.url.as_deref(),
            Some("postgres://folio@localhost/folio")
        );
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn rejects_bad_log_level() {
        let raw = RawSettings {
            logging: RawLogging {
                level: Some("verbose".to_string()),
                json: None,
            },
            ..Default::default()
        };
        assert!(Settings::try_from(raw).is_err());
    }
}
