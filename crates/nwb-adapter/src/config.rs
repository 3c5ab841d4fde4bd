//! Adapter configuration: which store to stage files in, and where it lives.
//!
//! The host keeps a registry of named stores, each with a `stage` directory,
//! and per-plugin keyword arguments. This adapter reads its store name from
//! `plugin_kwargs.nwb_adapter.store_name` and the stage path from
//! `stores.<store_name>.stage`:
//!
//! ```toml
//! [plugin_kwargs.nwb_adapter]
//! store_name = "nwb_store"
//! extension = "nwb"          # optional
//!
//! [stores.nwb_store]
//! stage = "/data/nwb/stage"
//! ```
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/nwb-adapter/config.toml`
//! 2. `~/.config/nwb-adapter/config.toml`
//! 3. `./nwb_adapter.toml` (or an explicit path)
//! 4. Environment: `NWB_ADAPTER_STORE_NAME`, `NWB_ADAPTER_STAGE_DIR`

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigError;

/// Key under `plugin_kwargs` that holds this adapter's settings.
pub const PLUGIN_NAME: &str = "nwb_adapter";

pub const DEFAULT_EXTENSION: &str = "nwb";

const EXPECTED_SHAPE: &str = "[plugin_kwargs.nwb_adapter]\nstore_name = \"<store>\"\n\n[stores.<store>]\nstage = \"/path/to/stage\"";

/// Resolved configuration the adapters run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Logical store name, used in the declared `filepath@<store>` type.
    pub store_name: String,

    /// Root of the staged files; `session/` and `membrane_potential/` live here.
    pub stage_dir: PathBuf,

    /// File extension for container files, without the dot.
    pub extension: String,
}

/// Where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub files: Vec<PathBuf>,
    pub env_overrides: Vec<String>,
}

/// Raw host settings as they appear in config files, before resolution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostSettings {
    #[serde(default)]
    pub plugin_kwargs: BTreeMap<String, PluginKwargs>,

    #[serde(default)]
    pub stores: BTreeMap<String, StoreSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginKwargs {
    pub store_name: Option<String>,
    pub extension: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSettings {
    pub stage: Option<String>,
}

impl AdapterConfig {
    pub fn new(store_name: impl Into<String>, stage_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_name: store_name.into(),
            stage_dir: stage_dir.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Load from the standard locations plus environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load with `config_path` replacing the local `./nwb_adapter.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut settings = HostSettings::default();

        for path in discover_config_files(config_path) {
            settings.merge(HostSettings::from_file(&path)?);
            sources.files.push(path);
        }

        settings.apply_env_overrides(|key| env::var(key).ok(), &mut sources);

        Ok((settings.resolve()?, sources))
    }

    /// Parse and resolve a single TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        HostSettings::parse(contents, Path::new("<inline>"))?.resolve()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        HostSettings::from_file(path)?.resolve()
    }
}

impl HostSettings {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Overlay `other` on top of `self`, field by field.
    pub fn merge(&mut self, other: HostSettings) {
        for (plugin, kwargs) in other.plugin_kwargs {
            let entry = self.plugin_kwargs.entry(plugin).or_default();
            if kwargs.store_name.is_some() {
                entry.store_name = kwargs.store_name;
            }
            if kwargs.extension.is_some() {
                entry.extension = kwargs.extension;
            }
        }
        for (store, settings) in other.stores {
            let entry = self.stores.entry(store).or_default();
            if settings.stage.is_some() {
                entry.stage = settings.stage;
            }
        }
    }

    /// Apply `NWB_ADAPTER_*` overrides read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
        sources: &mut ConfigSources,
    ) {
        if let Some(store_name) = lookup("NWB_ADAPTER_STORE_NAME") {
            self.plugin_kwargs
                .entry(PLUGIN_NAME.to_string())
                .or_default()
                .store_name = Some(store_name);
            sources.env_overrides.push("NWB_ADAPTER_STORE_NAME".to_string());
        }

        if let Some(stage) = lookup("NWB_ADAPTER_STAGE_DIR") {
            // The stage belongs to whichever store ends up selected.
            let store_name = self
                .plugin_kwargs
                .get(PLUGIN_NAME)
                .and_then(|kwargs| kwargs.store_name.clone());
            match store_name {
                Some(store_name) => {
                    self.stores.entry(store_name).or_default().stage = Some(stage);
                    sources.env_overrides.push("NWB_ADAPTER_STAGE_DIR".to_string());
                }
                None => warn!(
                    stage = %stage,
                    "NWB_ADAPTER_STAGE_DIR ignored: no store name configured"
                ),
            }
        }
    }

    /// Resolve the adapter's store name and stage path.
    pub fn resolve(&self) -> Result<AdapterConfig, ConfigError> {
        let kwargs = self.plugin_kwargs.get(PLUGIN_NAME);
        let store_name = kwargs
            .and_then(|k| k.store_name.clone())
            .ok_or_else(|| ConfigError::MissingKey {
                key: format!("plugin_kwargs.{PLUGIN_NAME}.store_name"),
                expected: EXPECTED_SHAPE.to_string(),
            })?;

        let store = self
            .stores
            .get(&store_name)
            .ok_or_else(|| ConfigError::MissingStore {
                store: store_name.clone(),
            })?;
        let stage = store.stage.as_deref().ok_or_else(|| ConfigError::MissingKey {
            key: format!("stores.{store_name}.stage"),
            expected: EXPECTED_SHAPE.to_string(),
        })?;

        let extension = kwargs
            .and_then(|k| k.extension.clone())
            .map(|ext| ext.trim_start_matches('.').to_string())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

        Ok(AdapterConfig {
            store_name,
            stage_dir: expand_path(stage),
            extension,
        })
    }
}

const SYSTEM_CONFIG: &str = "/etc/nwb-adapter/config.toml";
const LOCAL_CONFIG: &str = "nwb_adapter.toml";

/// Config files that exist, in load order. `local` stands in for
/// `./nwb_adapter.toml` when given.
pub fn discover_config_files(local: Option<&Path>) -> Vec<PathBuf> {
    let user = directories::BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("nwb-adapter").join("config.toml"));
    let local = local.map_or_else(|| PathBuf::from(LOCAL_CONFIG), Path::to_path_buf);

    [Some(PathBuf::from(SYSTEM_CONFIG)), user, Some(local)]
        .into_iter()
        .flatten()
        .filter(|path| path.exists())
        .collect()
}

/// Expand a leading `~/` to the home directory.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
