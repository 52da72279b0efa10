use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Failed to read client directory {path}: {source}")]
    ClientDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Public URLs of the two listeners. The URL doubles as the bind address.
#[derive(Clone, Debug, Deserialize)]
pub struct ListenerConfig {
    pub frontend: String,
    pub backend: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HttpsConfig {
    pub ca_cert_file: PathBuf,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    pub id: String,
    pub secret: String,
    pub redirect_urls: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserDbConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub listeners: ListenerConfig,
    #[serde(default)]
    pub https: Option<HttpsConfig>,
    /// Directory of per-client YAML files, merged into `clients`.
    #[serde(default)]
    pub client_dir: Option<PathBuf>,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
    pub user_db: UserDbConfig,
    #[serde(default = "default_signing_keys")]
    pub signing_keys: usize,
    #[serde(default = "default_token_lifetime_secs")]
    pub token_lifetime_secs: u64,
    #[serde(default = "default_code_ttl_secs")]
    pub code_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_signing_keys() -> usize {
    5
}

fn default_token_lifetime_secs() -> u64 {
    86_400
}

/// Upper bound for `token_lifetime_secs`, one year.
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 365 * 86_400;

fn default_code_ttl_secs() -> u64 {
    600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// A listener URL split into transport and socket address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listener {
    pub tls: bool,
    pub address: String,
}

impl Listener {
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let url = url.trim_end_matches('/');
        let (tls, address) = if let Some(rest) = url.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            (false, rest)
        } else {
            return Err(ConfigError::Validation(format!(
                "listener `{url}` must start with http:// or https://"
            )));
        };
        if address.is_empty() || address.contains('/') {
            return Err(ConfigError::Validation(format!(
                "listener `{url}` must be of the form scheme://host:port"
            )));
        }
        Ok(Listener {
            tls,
            address: address.to_string(),
        })
    }
}

impl AppConfig {
    /// Issuer of every token: the backend listener URL.
    pub fn issuer_url(&self) -> String {
        self.listeners.backend.trim_end_matches('/').to_string()
    }

    /// Where end users are sent to log in.
    pub fn authorization_url(&self) -> String {
        format!("{}/auth", self.listeners.frontend.trim_end_matches('/'))
    }

    pub fn frontend_listener(&self) -> Result<Listener, ConfigError> {
        Listener::parse(&self.listeners.frontend)
    }

    pub fn backend_listener(&self) -> Result<Listener, ConfigError> {
        Listener::parse(&self.listeners.backend)
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_lifetime_secs)
    }

    pub fn code_ttl(&self) -> Duration {
        Duration::from_secs(self.code_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Anchor relative file paths at `base`, the directory holding the configuration file.
    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(https) = self.https.as_mut() {
            https.ca_cert_file = resolve(base, &https.ca_cert_file);
            https.cert_file = resolve(base, &https.cert_file);
            https.key_file = resolve(base, &https.key_file);
        }
        if let Some(dir) = self.client_dir.as_mut() {
            *dir = resolve(base, dir);
        }
        self.user_db.path = resolve(base, &self.user_db.path);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let frontend = self.frontend_listener()?;
        let backend = self.backend_listener()?;
        if (frontend.tls || backend.tls) && self.https.is_none() {
            return Err(ConfigError::Validation(
                "https section is required for https listeners".into(),
            ));
        }
        if self.user_db.kind != "yaml" {
            return Err(ConfigError::Validation(format!(
                "unknown user_db type `{}`",
                self.user_db.kind
            )));
        }
        if self.clients.is_empty() {
            return Err(ConfigError::Validation(
                "at least one client must be configured".into(),
            ));
        }
        let mut seen = HashSet::new();
        for client in &self.clients {
            if client.id.is_empty() || client.secret.is_empty() {
                return Err(ConfigError::Validation(
                    "client id and secret must not be empty".into(),
                ));
            }
            if client.redirect_urls.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "client `{}` has no redirect_urls",
                    client.id
                )));
            }
            if !seen.insert(client.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate client id `{}`",
                    client.id
                )));
            }
        }
        if self.signing_keys == 0 {
            return Err(ConfigError::Validation("signing_keys must be > 0".into()));
        }
        if self.token_lifetime_secs <= 1 || self.token_lifetime_secs > MAX_TOKEN_LIFETIME_SECS {
            return Err(ConfigError::Validation(format!(
                "token_lifetime_secs must be between 2 and {MAX_TOKEN_LIFETIME_SECS}"
            )));
        }
        if self.code_ttl_secs == 0 || self.sweep_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "code_ttl_secs and sweep_interval_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Load the application configuration from `path` plus `IDP__*` environment overrides.
///
/// Nested keys are separated by double underscores, e.g. `IDP__LISTENERS__BACKEND`.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let path = path.as_ref();
    let cfg = Config::builder()
        .add_source(File::from(path))
        .add_source(Environment::with_prefix("IDP").prefix_separator("__").separator("__"))
        .build()?;

    let mut app: AppConfig = cfg.try_deserialize()?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    app.resolve_paths(base);

    if let Some(dir) = app.client_dir.clone() {
        let loaded = load_client_dir(&dir)?;
        tracing::debug!(dir = %dir.display(), count = loaded.len(), "loaded client files");
        app.clients.extend(loaded);
    }

    app.validate()?;
    Ok(app)
}

/// Read every `*.yaml` / `*.yml` file in `dir` as one client definition.
pub fn load_client_dir(dir: &Path) -> Result<Vec<ClientConfig>, ConfigError> {
    use config::{Config, File};
    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::ClientDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ConfigError::ClientDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        if path.is_file() && is_yaml {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .iter()
        .map(|path| {
            Config::builder()
                .add_source(File::from(path.as_path()))
                .build()?
                .try_deserialize::<ClientConfig>()
                .map_err(ConfigError::from)
        })
        .collect()
}

/// Configuration file named on the command line, else `IDP_CONFIG`, else `config.yaml`.
pub fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("IDP_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"))
}
