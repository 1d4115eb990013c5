use std::env;
use std::fs;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::palette::NotePalette;
use crate::model::DEFAULT_COLOR;

pub mod palette;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "myNote";
const APP_NAME: &str = "mynote";

pub const CONFIG_ENV: &str = "MYNOTE_CONFIG";
pub const DATA_ENV: &str = "MYNOTE_DATA";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load()?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load()?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    /// Holds the session cookie file.
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Holds the transient editor snapshot.
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let override_data = env::var(DATA_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));

        Ok(Self::from_roots(config_dir, config_file, data_root, state_dir))
    }

    pub fn from_roots(
        config_dir: PathBuf,
        config_file: PathBuf,
        data_dir: PathBuf,
        state_dir: PathBuf,
    ) -> Self {
        Self {
            config_dir,
            config_file,
            data_dir,
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    /// Everything under one directory; used by tests and `--data-dir` style setups.
    pub fn rooted_at(root: &Path) -> Self {
        Self::from_roots(
            root.join("config"),
            root.join("config").join("config.toml"),
            root.join("data"),
            root.join("state"),
        )
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.log_dir, &self.state_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub proxy: ProxyConfig,
    pub search: SearchConfig,
    pub calendar: CalendarConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    fn post_load(&mut self) -> Result<()> {
        self.backend
            .origin_url()
            .with_context(|| format!("validating backend origin {:?}", self.backend.origin))?;
        self.proxy
            .bind_addr()
            .with_context(|| format!("validating proxy bind address {:?}", self.proxy.bind))?;
        if !is_utc_offset(&self.calendar.utc_offset) {
            bail!(
                "calendar.utc_offset must look like +07:00, got {:?}",
                self.calendar.utc_offset
            );
        }
        self.ui.palette.retain_valid();
        if !self.ui.palette.contains(&self.ui.default_color) {
            tracing::warn!(color = %self.ui.default_color, "unknown default note color, falling back to white");
            self.ui.default_color = DEFAULT_COLOR.to_string();
        }
        Ok(())
    }
}

fn is_utc_offset(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 6
        && matches!(bytes[0], b'+' | b'-')
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_digit()
        && bytes[3] == b':'
        && bytes[4].is_ascii_digit()
        && bytes[5].is_ascii_digit()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub origin: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            timeout_secs: 15,
        }
    }
}

impl BackendConfig {
    pub fn origin_url(&self) -> Result<Url> {
        let url = Url::parse(&self.origin).context("parsing backend origin")?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("backend origin must be http or https, got {}", url.scheme());
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            bail!("backend origin needs a host");
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub bind: String,
    /// Name of the environment variable holding the backend's HS256 secret.
    pub jwt_secret_env: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            jwt_secret_env: "JWT_SECRET".to_string(),
        }
    }
}

impl ProxyConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("parsing socket address {}", self.bind))
    }

    pub fn jwt_secret(&self) -> Option<Vec<u8>> {
        env::var(&self.jwt_secret_env)
            .ok()
            .filter(|value| !value.is_empty())
            .map(String::into_bytes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { debounce_ms: 200 }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub location: String,
    pub utc_offset: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            location: "Thailand".to_string(),
            utc_offset: "+07:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub default_color: String,
    pub tick_rate_ms: u64,
    pub palette: NotePalette,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            default_color: DEFAULT_COLOR.to_string(),
            tick_rate_ms: 250,
            palette: NotePalette::default(),
        }
    }
}

impl UiConfig {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.clamp(16, 1000))
    }
}
