use failure::Fail;
use log::LevelFilter;
use std::{
    collections::HashMap,
    env,
    fmt,
    fs,
    io,
    net::{SocketAddr, Ipv4Addr},
    path::PathBuf,
    str::FromStr,
};
use serde::{Deserialize, de::{Deserializer, Error, Visitor, Unexpected}};

use crate::{apps::CustomApp, utils::SingleInit};

static CONFIG: SingleInit<Config> = SingleInit::uninit();

/// Secret used when none was configured. Production deployments refuse to
/// start with it.
pub const DEFAULT_SECRET: &str = "Make sure to set your own secret key!";

/// Load configuration.
///
/// Configuration is read from `config.toml` (or the file named by
/// `GCI_CONFIG`), which is optional, and then overridden with environment
/// variables.
pub fn load() -> crate::Result<&'static Config> {
    CONFIG.get_or_try_init(|| {
        let path = env::var_os("GCI_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"));

        let mut config = match fs::read(&path) {
            Ok(data) => Config::from_slice(&data)?,
            Err(ref err) if err.kind() == io::ErrorKind::NotFound
                && env::var_os("GCI_CONFIG").is_none() => Config::default(),
            Err(err) => return Err(ReadConfigurationError(err).into()),
        };

        config.apply_env(&|name| env::var(name).ok());

        Ok(config)
    })
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub mail: crate::mail::Config,
    #[serde(default)]
    pub apps: Apps,
    #[serde(default)]
    pub auth: crate::registry::auth::Config,
    #[serde(default)]
    pub logging: Logging,
    pub sentry: Option<Sentry>,
}

impl Config {
    pub fn from_slice(data: &[u8]) -> Result<Config, ConfigurationError> {
        toml::from_slice(data).map_err(ConfigurationError)
    }

    /// Override configuration with values from the environment.
    ///
    /// `var` looks up a single variable.
    pub fn apply_env(&mut self, var: &dyn Fn(&str) -> Option<String>) {
        if let Some(environment) = var("ENVIRONMENT") {
            self.server.environment = environment.parse()
                .unwrap_or(Environment::Production);
        }

        if let Some(secret) = var("SECRET_KEY") {
            self.server.secret = secret.into_bytes();
        }

        if let Some(hosts) = var("ALLOWED_HOSTS") {
            self.server.allowed_hosts = split_csv(&hosts);
        }

        if let Some(name) = var("CUSTOM_APP_NAME") {
            self.apps.custom_app_name = name;
        }

        if let Some(url) = var("CUSTOM_APP_URL") {
            self.apps.custom_app_url = url;
        }

        self.database.apply_env(var);
        self.mail.apply_env(var);
    }

    /// Validate configuration correctness.
    pub fn validate(&self) -> Result<(), failure::Error> {
        if !self.server.environment.is_debug()
        && self.server.secret == DEFAULT_SECRET.as_bytes() {
            return Err(ValidationError::DefaultSecret.into());
        }

        CustomApp::from_name(&self.apps.custom_app_name)
            .ok_or_else(|| ValidationError::UnknownApp(
                self.apps.custom_app_name.clone()))?;

        if let Some(ref engine) = self.database.engine {
            if !is_postgres_engine(engine) {
                return Err(ValidationError::UnsupportedEngine(
                    engine.clone()).into());
            }
        }

        crate::registry::auth::AuthPages::from_config(&self.auth)?;

        self.mail.validate()?;

        Ok(())
    }

    /// Is this a debug (development) deployment?
    pub fn is_debug(&self) -> bool {
        self.server.environment.is_debug()
    }
}

/// Deployment mode.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Debug behaviour: local vendor assets, static files served by this
    /// process, templates and site information never cached.
    Development,
    Production,
}

impl Environment {
    pub fn is_debug(self) -> bool {
        self == Environment::Development
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(v: &str) -> Result<Self, Self::Err> {
        match v {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            _ => Err(UnknownEnvironment),
        }
    }
}

#[derive(Debug, Fail)]
#[fail(display = "Unknown environment")]
pub struct UnknownEnvironment;

#[derive(Clone, Debug, Deserialize)]
pub struct Server {
    /// Address on which to listen.
    #[serde(default = "default_address")]
    pub address: SocketAddr,
    /// Domain (host name) of this server.
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub environment: Environment,
    /// Secret key.
    #[serde(default = "default_secret", deserialize_with = "de_secret")]
    pub secret: Vec<u8>,
    /// Accepted values of the `Host` header.
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,
    /// Directory served under `/lib/static/`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Directory served under `/lib/media/`.
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
}

impl Default for Server {
    fn default() -> Self {
        Server {
            address: default_address(),
            domain: default_domain(),
            environment: Environment::default(),
            secret: default_secret(),
            allowed_hosts: default_allowed_hosts(),
            static_dir: default_static_dir(),
            media_dir: default_media_dir(),
        }
    }
}

/// Database configuration.
///
/// Either a complete `url`, or the parts from which a PostgreSQL connection
/// URI is composed.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Database {
    pub url: Option<String>,
    /// Use PostgreSQL settings below.
    #[serde(default)]
    pub postgresql: bool,
    pub engine: Option<String>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Name of a service in `pg_service.conf`.
    pub service: Option<String>,
    /// Path to a `.pgpass` file.
    pub passfile: Option<String>,
}

impl Database {
    fn apply_env(&mut self, var: &dyn Fn(&str) -> Option<String>) {
        if let Some(v) = var("DB_POSTGRESQL") {
            self.postgresql = is_truthy(&v);
        }

        let mut fields: [(&str, &mut Option<String>); 7] = [
            ("DB_ENGINE", &mut self.engine),
            ("DB_NAME", &mut self.name),
            ("DB_USER", &mut self.user),
            ("DB_PASSWORD", &mut self.password),
            ("DB_HOST", &mut self.host),
            ("DB_SERVICE", &mut self.service),
            ("DB_PASSFILE", &mut self.passfile),
        ];

        for (name, field) in fields.iter_mut() {
            if let Some(v) = var(name) {
                **field = Some(v);
            }
        }

        if let Some(port) = var("DB_PORT").and_then(|v| v.parse().ok()) {
            self.port = Some(port);
        }
    }

    /// Are PostgreSQL connection parts configured?
    pub fn is_composed(&self) -> bool {
        self.postgresql || self.name.is_some() || self.service.is_some()
    }
}

/// Pluggable dashboard application.
#[derive(Clone, Debug, Deserialize)]
pub struct Apps {
    #[serde(default = "default_custom_app_name")]
    pub custom_app_name: String,
    #[serde(default = "default_custom_app_url")]
    pub custom_app_url: String,
}

impl Apps {
    /// URL prefix of the custom application, as an absolute path with
    /// a trailing slash.
    pub fn url_prefix(&self) -> String {
        let trimmed = self.custom_app_url.trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", trimmed)
        }
    }
}

impl Default for Apps {
    fn default() -> Self {
        Apps {
            custom_app_name: default_custom_app_name(),
            custom_app_url: default_custom_app_url(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Logging {
    /// Default logging level.
    #[serde(default = "default_level_filter")]
    pub level: LevelFilter,
    /// Actix-web logging level.
    pub network: Option<LevelFilter>,
    /// Custom filters.
    #[serde(default)]
    pub filters: HashMap<String, LevelFilter>,
}

/// Sentry.io configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Sentry {
    /// Client key.
    pub dsn: String,
}

#[derive(Debug, Fail)]
#[fail(display = "Cannot read configuration file")]
pub struct ReadConfigurationError(#[fail(cause)] std::io::Error);

#[derive(Debug, Fail)]
#[fail(display = "Invalid configuration: {}", _0)]
pub struct ConfigurationError(#[fail(cause)] toml::de::Error);

#[derive(Debug, Fail)]
pub enum ValidationError {
    DefaultSecret,
    UnknownApp(String),
    UnsupportedEngine(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ValidationError::DefaultSecret =>
                write!(f, "SECRET_KEY must be set in production"),
            ValidationError::UnknownApp(ref name) =>
                write!(f, "Unknown custom application {:?}, available: {}",
                    name, CustomApp::available()),
            ValidationError::UnsupportedEngine(ref engine) =>
                write!(f, "Unsupported database engine {:?}, only PostgreSQL \
                    is supported", engine),
        }
    }
}

fn is_postgres_engine(engine: &str) -> bool {
    engine == "postgresql"
        || engine.ends_with(".postgresql")
        || engine.ends_with(".postgresql_psycopg2")
}

/// Interpret a boolean flag from the environment.
pub fn is_truthy(v: &str) -> bool {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        _ => false,
    }
}

fn split_csv(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Default address (127.0.0.1:80).
fn default_address() -> SocketAddr {
    (Ipv4Addr::LOCALHOST, 80).into()
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_secret() -> Vec<u8> {
    DEFAULT_SECRET.as_bytes().to_vec()
}

fn default_allowed_hosts() -> Vec<String> {
    split_csv("localhost,127.0.0.1,dev.tawalabora.space")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_custom_app_name() -> String {
    "apps.schools".to_string()
}

fn default_custom_app_url() -> String {
    "dashboard/".to_string()
}

/// Deserialize a secret key.
fn de_secret<'de, D>(d: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    d.deserialize_byte_buf(SecretVisitor)
}

struct SecretVisitor;

impl<'de> Visitor<'de> for SecretVisitor {
    type Value = Vec<u8>;

    fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "a binary data or a file")
    }

    fn visit_str<E>(self, v: &str) -> Result<Vec<u8>, E>
    where
        E: Error,
    {
        if v.starts_with("base64:") {
            base64::decode(v.trim_start_matches("base64:"))
                .map_err(E::custom)
                .and_then(|v| self.visit_byte_buf(v))
        } else if v.starts_with("file:") {
            fs::read(v.trim_start_matches("file:"))
                .map_err(E::custom)
                .and_then(|v| self.visit_byte_buf(v))
        } else {
            Err(E::invalid_value(
                Unexpected::Str(v), &"an encoded binary string or a file"))
        }
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Vec<u8>, E>
    where
        E: Error,
    {
        if v.len() < 32 {
            return Err(E::invalid_length(v.len(), &"at least 32 bytes"));
        }
        Ok(v)
    }
}

fn default_level_filter() -> LevelFilter {
    LevelFilter::Info
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: default_level_filter(),
            network: None,
            filters: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)])
    -> impl Fn(&str) -> Option<String> + 'a {
        move |name| pairs.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }

    #[test]
    fn defaults_without_file_or_environment() {
        let mut config = Config::default();
        config.apply_env(&vars(&[]));

        assert_eq!(config.server.environment, Environment::Development);
        assert!(config.is_debug());
        assert_eq!(config.server.secret, DEFAULT_SECRET.as_bytes());
        assert_eq!(config.server.allowed_hosts,
            vec!["localhost", "127.0.0.1", "dev.tawalabora.space"]);
        assert_eq!(config.apps.custom_app_url, "dashboard/");
        assert_eq!(config.apps.url_prefix(), "/dashboard/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = Config::from_slice(br#"
            [server]
            environment = "development"
            allowed_hosts = ["example.com"]

            [apps]
            custom_app_url = "portal"
        "#).unwrap();

        config.apply_env(&vars(&[
            ("ENVIRONMENT", "production"),
            ("SECRET_KEY", "a proper secret key for production use"),
            ("ALLOWED_HOSTS", "gci.example, .gci.example"),
        ]));

        assert_eq!(config.server.environment, Environment::Production);
        assert!(!config.is_debug());
        assert_eq!(config.server.allowed_hosts, vec!["gci.example", ".gci.example"]);
        assert_eq!(config.apps.url_prefix(), "/portal/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_environment_is_not_debug() {
        let mut config = Config::default();
        config.apply_env(&vars(&[("ENVIRONMENT", "staging")]));
        assert!(!config.is_debug());
    }

    #[test]
    fn production_rejects_default_secret() {
        let mut config = Config::default();
        config.apply_env(&vars(&[("ENVIRONMENT", "production")]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_custom_app_is_rejected() {
        let mut config = Config::default();
        config.apply_env(&vars(&[("CUSTOM_APP_NAME", "apps.custom")]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_postgres_engine_is_rejected() {
        let mut config = Config::default();
        config.apply_env(&vars(&[("DB_ENGINE", "django.db.backends.sqlite3")]));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.apply_env(&vars(&[("DB_ENGINE", "django.db.backends.postgresql")]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn database_parts_from_environment() {
        let mut config = Config::default();
        config.apply_env(&vars(&[
            ("DB_POSTGRESQL", "True"),
            ("DB_NAME", "gci"),
            ("DB_PORT", "6543"),
        ]));

        assert!(config.database.is_composed());
        assert_eq!(config.database.name.as_ref().map(String::as_str), Some("gci"));
        assert_eq!(config.database.port, Some(6543));
    }

    #[test]
    fn short_configured_secret_is_rejected() {
        assert!(Config::from_slice(br#"
            [server]
            secret = "base64:c2hvcnQ="
        "#).is_err());
    }
}
