//! Editor session configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, a KDL config
//! file, and `EASEL_*` environment variables.
//!
//! ```kdl
//! autosave-interval-ms 30000
//! debounce-ms 300
//! preview-cooldown-ms 300
//! enable-autosave true
//! autosave-key "my_autosave"
//! store-dir "/var/lib/easel/snapshots"
//! ```

use kdl::{KdlDocument, KdlValue};
use serde::{Deserialize, Serialize};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Interval of the periodic autosave line.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Quiet period of the debounced autosave line.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// How long the preview surface stays busy after closing.
pub const DEFAULT_PREVIEW_COOLDOWN: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EditorConfig {
    /// Period of the unconditional autosave.
    #[serde(with = "millis")]
    pub autosave_interval: Duration,
    /// Quiet period collapsing bursts of change notifications.
    #[serde(with = "millis")]
    pub debounce: Duration,
    /// Busy window after the preview surface closes.
    #[serde(with = "millis")]
    pub preview_cooldown: Duration,
    /// Whether sessions start the autosave scheduler on mount.
    pub enable_autosave: bool,
    /// Overrides the default autosave slot for untitled sessions.
    pub autosave_key: Option<String>,
    /// Directory used by the file-backed snapshot store.
    pub store_dir: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            debounce: DEFAULT_DEBOUNCE,
            preview_cooldown: DEFAULT_PREVIEW_COOLDOWN,
            enable_autosave: true,
            autosave_key: None,
            store_dir: None,
        }
    }
}

impl EditorConfig {
    /// Loads the configuration from the provided loader.
    pub async fn load(loader: &impl Loader) -> Result<Self, ConfigError> {
        loader.load().await
    }

    /// Saves the configuration using the provided saver.
    pub async fn save(&self, saver: &impl Saver) -> Result<(), ConfigError> {
        saver.save(self).await
    }

    /// Defaults with the environment overlaid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// Overlay `EASEL_*` environment variables.
    ///
    /// - `EASEL_AUTOSAVE_INTERVAL_MS`
    /// - `EASEL_DEBOUNCE_MS`
    /// - `EASEL_PREVIEW_COOLDOWN_MS`
    /// - `EASEL_ENABLE_AUTOSAVE` (`true`/`false`/`1`/`0`)
    /// - `EASEL_AUTOSAVE_KEY`
    /// - `EASEL_STORE_DIR`
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Overlay values from an arbitrary variable lookup.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup("EASEL_AUTOSAVE_INTERVAL_MS") {
            self.autosave_interval = nonzero(
                "EASEL_AUTOSAVE_INTERVAL_MS",
                parse_millis("EASEL_AUTOSAVE_INTERVAL_MS", &raw)?,
            )?;
        }
        if let Some(raw) = lookup("EASEL_DEBOUNCE_MS") {
            self.debounce = parse_millis("EASEL_DEBOUNCE_MS", &raw)?;
        }
        if let Some(raw) = lookup("EASEL_PREVIEW_COOLDOWN_MS") {
            self.preview_cooldown = parse_millis("EASEL_PREVIEW_COOLDOWN_MS", &raw)?;
        }
        if let Some(raw) = lookup("EASEL_ENABLE_AUTOSAVE") {
            self.enable_autosave = match raw.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "EASEL_ENABLE_AUTOSAVE",
                        message: format!("expected a boolean, found {other:?}"),
                    });
                }
            };
        }
        if let Some(key) = lookup("EASEL_AUTOSAVE_KEY").filter(|k| !k.is_empty()) {
            self.autosave_key = Some(key);
        }
        if let Some(dir) = lookup("EASEL_STORE_DIR").filter(|d| !d.is_empty()) {
            self.store_dir = Some(PathBuf::from(dir));
        }
        Ok(self)
    }

    /// Store directory, falling back to the platform data directory.
    pub fn resolved_store_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.store_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_store_dir(),
        }
    }

    /// Render as the KDL accepted by [`KdlConfigFile`].
    pub fn to_kdl(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "autosave-interval-ms {}\n",
            self.autosave_interval.as_millis()
        ));
        out.push_str(&format!("debounce-ms {}\n", self.debounce.as_millis()));
        out.push_str(&format!(
            "preview-cooldown-ms {}\n",
            self.preview_cooldown.as_millis()
        ));
        out.push_str(&format!("enable-autosave {}\n", self.enable_autosave));
        if let Some(key) = &self.autosave_key {
            out.push_str(&format!("autosave-key {}\n", KdlValue::String(key.clone())));
        }
        if let Some(dir) = &self.store_dir {
            out.push_str(&format!(
                "store-dir {}\n",
                KdlValue::String(dir.display().to_string())
            ));
        }
        out
    }
}

/// The trait for loading configuration data.
pub trait Loader {
    /// Loads the configuration data.
    fn load(&self) -> impl Future<Output = Result<EditorConfig, ConfigError>> + Send;
}

/// The trait for saving configuration data.
pub trait Saver {
    /// Saves the configuration data.
    fn save(&self, config: &EditorConfig) -> impl Future<Output = Result<(), ConfigError>> + Send;
}

/// KDL config file on disk. A missing file loads as the defaults.
#[derive(Debug, Clone)]
pub struct KdlConfigFile {
    path: PathBuf,
}

impl KdlConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/easel/config.kdl`
    pub fn default_location() -> Result<Self, ConfigError> {
        dirs::config_dir()
            .map(|dir| Self::new(dir.join("easel").join("config.kdl")))
            .ok_or(ConfigError::NoPlatformDir {
                what: "configuration",
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Loader for KdlConfigFile {
    async fn load(&self) -> Result<EditorConfig, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no config file, using defaults");
                return Ok(EditorConfig::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        parse_kdl(&self.path, &text)
    }
}

impl Saver for KdlConfigFile {
    async fn save(&self, config: &EditorConfig) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(&self.path, config.to_kdl()).map_err(write_err)
    }
}

/// `<data dir>/easel/snapshots`
pub fn default_store_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join("easel").join("snapshots"))
        .ok_or(ConfigError::NoPlatformDir {
            what: "snapshot storage",
        })
}

fn parse_kdl(path: &Path, text: &str) -> Result<EditorConfig, ConfigError> {
    let doc: KdlDocument = text.parse().map_err(|source| ConfigError::Kdl {
        path: path.to_path_buf(),
        source,
    })?;

    let mut config = EditorConfig::default();
    if let Some(ms) = int_arg(&doc, "autosave-interval-ms")? {
        config.autosave_interval = nonzero("autosave-interval-ms", Duration::from_millis(ms))?;
    }
    if let Some(ms) = int_arg(&doc, "debounce-ms")? {
        config.debounce = Duration::from_millis(ms);
    }
    if let Some(ms) = int_arg(&doc, "preview-cooldown-ms")? {
        config.preview_cooldown = Duration::from_millis(ms);
    }
    if let Some(value) = first_arg(&doc, "enable-autosave") {
        config.enable_autosave = value.as_bool().ok_or_else(|| ConfigError::InvalidValue {
            key: "enable-autosave",
            message: format!("expected a boolean, found {value}"),
        })?;
    }
    if let Some(value) = first_arg(&doc, "autosave-key") {
        config.autosave_key = Some(string_value("autosave-key", value)?.to_string());
    }
    if let Some(value) = first_arg(&doc, "store-dir") {
        config.store_dir = Some(PathBuf::from(string_value("store-dir", value)?));
    }
    Ok(config)
}

fn first_arg<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name)?.entries().first().map(|entry| entry.value())
}

fn int_arg(doc: &KdlDocument, name: &'static str) -> Result<Option<u64>, ConfigError> {
    let Some(value) = first_arg(doc, name) else {
        return Ok(None);
    };
    value
        .as_i64()
        .and_then(|n| u64::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: name,
            message: format!("expected a non-negative integer, found {value}"),
        })
}

fn string_value<'a>(key: &'static str, value: &'a KdlValue) -> Result<&'a str, ConfigError> {
    value.as_string().ok_or_else(|| ConfigError::InvalidValue {
        key,
        message: format!("expected a string, found {value}"),
    })
}

/// A zero autosave interval would make the periodic line spin.
fn nonzero(key: &'static str, interval: Duration) -> Result<Duration, ConfigError> {
    if interval.is_zero() {
        return Err(ConfigError::InvalidValue {
            key,
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(interval)
}

fn parse_millis(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ConfigError::InvalidValue {
            key,
            message: e.to_string(),
        })
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
