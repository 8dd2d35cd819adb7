//! Loading plugin descriptors from disk
//!
//! [`PluginSource`] is the boundary integrators implement when plugins come
//! from somewhere exotic (dynamic libraries, an embedded scripting engine).
//! The built-in [`ManifestSource`] reads descriptor manifests — JSON, YAML or
//! TOML picked by extension — and produces hook-less plugins carrying the
//! manifest's name, version, dependencies and default config.

use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use cuttle_plugin_api::{ConfigMap, Plugin, PluginDependency};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Extensions the built-in manifest loader understands
pub const MANIFEST_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "toml"];

/// Source of plugins loaded from paths
#[async_trait]
pub trait PluginSource: Send + Sync + fmt::Debug {
    /// Load a plugin from a path
    ///
    /// Implementations must fail with a descriptive error naming the path
    /// when it holds nothing usable.
    async fn load(&self, path: &Path) -> Result<Box<dyn Plugin>>;
}

/// Descriptor manifest as written on disk
#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    version: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    dependencies: Vec<ManifestDependency>,
    #[serde(default)]
    config: Option<ConfigMap>,
}

/// Dependency entry: a bare name or a detailed form
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestDependency {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        optional: bool,
    },
}

impl From<ManifestDependency> for PluginDependency {
    fn from(dep: ManifestDependency) -> Self {
        match dep {
            ManifestDependency::Name(name) => PluginDependency::required(name),
            ManifestDependency::Detailed {
                name,
                version,
                optional,
            } => PluginDependency {
                name,
                version_req: version,
                optional,
            },
        }
    }
}

/// Plugin backed purely by a manifest
///
/// Carries identity, dependencies and default config; implements no hooks.
#[derive(Debug)]
pub struct ManifestPlugin {
    name: String,
    version: String,
    description: String,
    dependencies: Vec<PluginDependency>,
    config: Option<ConfigMap>,
}

#[async_trait]
impl Plugin for ManifestPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn dependencies(&self) -> Vec<PluginDependency> {
        self.dependencies.clone()
    }

    fn default_config(&self) -> Option<ConfigMap> {
        self.config.clone()
    }
}

/// Built-in manifest-file plugin source
#[derive(Debug, Clone, Default)]
pub struct ManifestSource;

impl ManifestSource {
    /// Create a new manifest source
    pub fn new() -> Self {
        Self
    }

    async fn parse(path: &Path) -> Result<Manifest> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RuntimeError::loader(path, e))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        // Every format funnels through a JSON value so one deserialization
        // path validates required fields.
        let value: serde_json::Value = match extension {
            "json" => serde_json::from_str(&content)
                .map_err(|e| RuntimeError::loader(path, e))?,
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| RuntimeError::loader(path, e))?,
            "toml" => {
                let parsed: toml::Value = content
                    .parse()
                    .map_err(|e: toml::de::Error| RuntimeError::loader(path, e))?;
                serde_json::to_value(parsed).map_err(|e| RuntimeError::loader(path, e))?
            }
            other => {
                return Err(RuntimeError::loader(
                    path,
                    format!("unsupported manifest format: '{other}'"),
                ));
            }
        };

        serde_json::from_value(value).map_err(|e| RuntimeError::loader(path, e))
    }
}

#[async_trait]
impl PluginSource for ManifestSource {
    async fn load(&self, path: &Path) -> Result<Box<dyn Plugin>> {
        let manifest = Self::parse(path).await?;

        Ok(Box::new(ManifestPlugin {
            name: manifest.name,
            version: manifest.version,
            description: manifest.description,
            dependencies: manifest
                .dependencies
                .into_iter()
                .map(PluginDependency::from)
                .collect(),
            config: manifest.config,
        }))
    }
}

/// Enumerate loadable files in a directory
///
/// Non-recursive; keeps files whose extension matches the filter and returns
/// them sorted by name so load order is reproducible.
pub async fn scan_directory(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| RuntimeError::loader(dir, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RuntimeError::loader(dir, e))?
    {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| extensions.contains(&ext))
            .unwrap_or(false);
        if path.is_file() && matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
