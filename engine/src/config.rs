use serde::Deserialize;
use std::{env, fs, path::PathBuf};

const fn default_true() -> bool {
    true
}

/// `~/.ludics/config.toml`, or `$LUDICS_CONFIG` when set.
///
/// ```toml
/// [engine]
/// default_fuel = 256
/// max_closure_iterations = 10
/// max_counter_examples = 5
/// max_plays = 10000
///
/// [cache]
/// enabled = true
/// sqlite_path = "~/.ludics/artifacts.db"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct LudicsConfig {
    pub engine: Option<EngineConfig>,
    pub cache: Option<CacheConfig>,
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct EngineConfig {
    pub default_fuel: Option<u32>,
    pub max_closure_iterations: Option<usize>,
    pub max_counter_examples: Option<usize>,
    pub max_plays: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `${VAR}` and a leading `~` are expanded.
    pub sqlite_path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sqlite_path: None,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn resolved_sqlite_path(&self) -> Option<PathBuf> {
        self.sqlite_path.as_deref().map(expand_path)
    }
}

/// Resolved engine bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    pub default_fuel: u32,
    pub max_closure_iterations: usize,
    pub max_counter_examples: usize,
    pub max_plays: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            default_fuel: 256,
            max_closure_iterations: 10,
            max_counter_examples: 5,
            max_plays: 10_000,
        }
    }
}

impl EngineLimits {
    /// Zero is never a usable bound; it falls back to the default.
    #[must_use]
    pub fn from_config(config: Option<&EngineConfig>) -> Self {
        let defaults = Self::default();
        let Some(config) = config else {
            return defaults;
        };
        Self {
            default_fuel: positive_or("default_fuel", config.default_fuel, defaults.default_fuel),
            max_closure_iterations: positive_or(
                "max_closure_iterations",
                config.max_closure_iterations,
                defaults.max_closure_iterations,
            ),
            max_counter_examples: positive_or(
                "max_counter_examples",
                config.max_counter_examples,
                defaults.max_counter_examples,
            ),
            max_plays: positive_or("max_plays", config.max_plays, defaults.max_plays),
        }
    }
}

fn positive_or<T>(field: &str, value: Option<T>, default: T) -> T
where
    T: Copy + Default + PartialEq + std::fmt::Display,
{
    match value {
        Some(v) if v == T::default() => {
            tracing::warn!(field, %default, "engine limit must be positive; using default");
            default
        }
        Some(v) => v,
        None => default,
    }
}

/// Replace every `${NAME}` with the variable's value (empty when unset).
/// An unterminated `${` is kept as written.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let Some(end) = tail.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &tail[..end];
        if !name.is_empty() {
            out.push_str(&env::var(name).unwrap_or_default());
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}

fn expand_path(raw: &str) -> PathBuf {
    let expanded = expand_env_vars(raw);
    match expanded.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(&expanded), |h| h.join(rest)),
        None if expanded == "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(&expanded)),
        None => PathBuf::from(expanded),
    }
}

impl LudicsConfig {
    /// `Ok(None)` when no config file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse { path, source })
    }

    /// Like [`load`](Self::load), but any failure means defaults.
    #[must_use]
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config.unwrap_or_default(),
            Err(ConfigError::Read { path, source }) => {
                tracing::warn!(path = %path.display(), %source, "Failed to read config");
                Self::default()
            }
            Err(ConfigError::Parse { path, source }) => {
                tracing::warn!(path = %path.display(), %source, "Failed to parse config");
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn limits(&self) -> EngineLimits {
        EngineLimits::from_config(self.engine.as_ref())
    }

    #[must_use]
    pub fn cache(&self) -> CacheConfig {
        self.cache
            .as_ref()
            .map(|c| CacheConfig {
                enabled: c.enabled,
                sqlite_path: c.sqlite_path.clone(),
            })
            .unwrap_or_default()
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os("LUDICS_CONFIG").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(explicit));
    }
    dirs::home_dir().map(|home| home.join(".ludics").join("config.toml"))
}
