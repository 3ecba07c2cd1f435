use std::env;
use std::fs;
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub mercadopago: MercadoPagoConfig,
    pub bird: BirdConfig,
    pub brand: BrandConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MercadoPagoConfig {
    pub access_token: SecretString,
    pub webhook_secret: SecretString,
    pub base_url: String,
    pub sandbox: bool,
}

#[derive(Clone, Debug)]
pub struct BirdConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub channel_id: String,
}

#[derive(Clone, Debug)]
pub struct BrandConfig {
    pub name: String,
    pub support_phone: String,
    /// Base for the gateway back_urls the customer lands on after paying.
    pub return_base_url: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub mercadopago_access_token: Option<String>,
    pub mercadopago_webhook_secret: Option<String>,
    pub mercadopago_sandbox: Option<bool>,
    pub bird_api_key: Option<String>,
    pub bird_channel_id: Option<String>,
    pub brand_name: Option<String>,
    pub support_phone: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// TOML file applied between defaults and the environment. Missing
    /// file is only an error when a path was given explicitly.
    pub config_path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    database: FileDatabase,
    #[serde(default)]
    mercadopago: FileMercadoPago,
    #[serde(default)]
    bird: FileBird,
    #[serde(default)]
    brand: FileBrand,
    #[serde(default)]
    server: FileServer,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Debug, Default, Deserialize)]
struct FileDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileMercadoPago {
    access_token: Option<String>,
    webhook_secret: Option<String>,
    base_url: Option<String>,
    sandbox: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct FileBird {
    api_key: Option<String>,
    base_url: Option<String>,
    channel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileBrand {
    name: Option<String>,
    support_phone: Option<String>,
    return_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileServer {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    /// Layered load: defaults, then the TOML file, then `PAGOFLOW_*`
    /// environment variables, then programmatic overrides. Fails fast on
    /// missing credentials so a misconfigured deploy dies at startup.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let file = load_file(options.config_path.as_deref())?;
        let overrides = options.overrides;

        let database = DatabaseConfig {
            url: pick(
                overrides.database_url,
                env_string("PAGOFLOW_DATABASE_URL"),
                file.database.url,
                "sqlite://pagoflow.db",
            ),
            max_connections: env_parsed("PAGOFLOW_DATABASE_MAX_CONNECTIONS")?
                .or(file.database.max_connections)
                .unwrap_or(5),
            timeout_secs: env_parsed("PAGOFLOW_DATABASE_TIMEOUT_SECS")?
                .or(file.database.timeout_secs)
                .unwrap_or(30),
        };

        let mercadopago = MercadoPagoConfig {
            access_token: secret(pick(
                overrides.mercadopago_access_token,
                env_string("PAGOFLOW_MP_ACCESS_TOKEN"),
                file.mercadopago.access_token,
                "",
            )),
            webhook_secret: secret(pick(
                overrides.mercadopago_webhook_secret,
                env_string("PAGOFLOW_MP_WEBHOOK_SECRET"),
                file.mercadopago.webhook_secret,
                "",
            )),
            base_url: pick(
                None,
                env_string("PAGOFLOW_MP_BASE_URL"),
                file.mercadopago.base_url,
                "https://api.mercadopago.com",
            ),
            sandbox: overrides
                .mercadopago_sandbox
                .or(env_parsed("PAGOFLOW_MP_SANDBOX")?)
                .or(file.mercadopago.sandbox)
                .unwrap_or(true),
        };

        let bird = BirdConfig {
            api_key: secret(pick(
                overrides.bird_api_key,
                env_string("PAGOFLOW_BIRD_API_KEY"),
                file.bird.api_key,
                "",
            )),
            base_url: pick(
                None,
                env_string("PAGOFLOW_BIRD_BASE_URL"),
                file.bird.base_url,
                "https://api.bird.com",
            ),
            channel_id: pick(
                overrides.bird_channel_id,
                env_string("PAGOFLOW_BIRD_CHANNEL_ID"),
                file.bird.channel_id,
                "",
            ),
        };

        let brand = BrandConfig {
            name: pick(overrides.brand_name, env_string("PAGOFLOW_BRAND_NAME"), file.brand.name, "KOAJ"),
            support_phone: pick(
                overrides.support_phone,
                env_string("PAGOFLOW_SUPPORT_PHONE"),
                file.brand.support_phone,
                "+573001234567",
            ),
            return_base_url: pick(
                None,
                env_string("PAGOFLOW_RETURN_BASE_URL"),
                file.brand.return_base_url,
                "https://pagoflow.example/checkout",
            ),
        };

        let server = ServerConfig {
            bind_address: pick(
                None,
                env_string("PAGOFLOW_BIND_ADDRESS"),
                file.server.bind_address,
                "0.0.0.0",
            ),
            port: env_parsed("PAGOFLOW_PORT")?.or(file.server.port).unwrap_or(8080),
        };

        let logging = LoggingConfig {
            level: pick(overrides.log_level, env_string("PAGOFLOW_LOG_LEVEL"), file.logging.level, "info"),
            format: env_log_format()?.or(file.logging.format).unwrap_or(LogFormat::Compact),
        };

        let config =
            AppConfig { database, mercadopago, bird, brand, server, logging };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mercadopago.access_token.expose_secret().is_empty() {
            return Err(ConfigError::Invalid {
                field: "mercadopago.access_token",
                reason: "required; set PAGOFLOW_MP_ACCESS_TOKEN".to_owned(),
            });
        }
        if self.mercadopago.webhook_secret.expose_secret().is_empty() {
            return Err(ConfigError::Invalid {
                field: "mercadopago.webhook_secret",
                reason: "required; set PAGOFLOW_MP_WEBHOOK_SECRET".to_owned(),
            });
        }
        if self.bird.api_key.expose_secret().is_empty() {
            return Err(ConfigError::Invalid {
                field: "bird.api_key",
                reason: "required; set PAGOFLOW_BIRD_API_KEY".to_owned(),
            });
        }
        if self.database.url.is_empty() {
            return Err(ConfigError::Invalid {
                field: "database.url",
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

fn load_file(path: Option<&std::path::Path>) -> Result<FileConfig, ConfigError> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from("pagoflow.toml"), false),
    };

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(source) if !required && source.kind() == std::io::ErrorKind::NotFound => {
            return Ok(FileConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Io { path: path.display().to_string(), source });
        }
    };

    toml::from_str(&raw)
        .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
}

fn pick(
    override_value: Option<String>,
    env_value: Option<String>,
    file_value: Option<String>,
    default: &str,
) -> String {
    override_value.or(env_value).or(file_value).unwrap_or_else(|| default.to_owned())
}

fn secret(value: String) -> SecretString {
    SecretString::from(value)
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| ConfigError::Invalid {
            field: key,
            reason: format!("could not parse value {raw:?}"),
        }),
    }
}

fn env_log_format() -> Result<Option<LogFormat>, ConfigError> {
    match env_string("PAGOFLOW_LOG_FORMAT").as_deref() {
        None => Ok(None),
        Some("compact") => Ok(Some(LogFormat::Compact)),
        Some("pretty") => Ok(Some(LogFormat::Pretty)),
        Some("json") => Ok(Some(LogFormat::Json)),
        Some(other) => Err(ConfigError::Invalid {
            field: "PAGOFLOW_LOG_FORMAT",
            reason: format!("unknown format {other:?}; expected compact, pretty or json"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{AppConfig, ConfigOverrides, LoadOptions};

    fn valid_overrides() -> ConfigOverrides {
        ConfigOverrides {
            database_url: Some("sqlite::memory:".to_owned()),
            mercadopago_access_token: Some("TEST-mp-token".to_owned()),
            mercadopago_webhook_secret: Some("whsec-test".to_owned()),
            bird_api_key: Some("bird-key".to_owned()),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn load_fails_fast_without_gateway_credentials() {
        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect_err("missing access token must fail");

        assert!(error.to_string().contains("mercadopago.access_token"));
    }

    #[test]
    fn overrides_win_and_defaults_fill_the_rest() {
        let config = AppConfig::load(LoadOptions {
            overrides: valid_overrides(),
            ..LoadOptions::default()
        })
        .expect("valid overrides should load");

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.brand.name, "KOAJ");
        assert_eq!(config.mercadopago.base_url, "https://api.mercadopago.com");
        assert!(config.mercadopago.sandbox);
    }

    #[test]
    fn explicit_config_file_is_parsed_and_layered_under_overrides() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[brand]\nname = \"Tienda Norte\"\n\n[mercadopago]\nsandbox = false\n"
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            overrides: valid_overrides(),
        })
        .expect("file plus overrides should load");

        assert_eq!(config.brand.name, "Tienda Norte");
        assert!(!config.mercadopago.sandbox);
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some("/definitely/not/here.toml".into()),
            overrides: valid_overrides(),
        })
        .expect_err("explicit missing file must fail");

        assert!(error.to_string().contains("not/here.toml"));
    }
}
