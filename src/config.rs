//! Plugin configuration describing the base manifest and pipeline options.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::models::{ContentScript, Manifest};

/// Configuration file names searched for by [`PluginOptions::discover`], in order.
pub const DEFAULT_CONFIG_FILES: [&str; 3] =
  ["webext.config.json", "webext.config.yaml", "webext.config.yml"];

/// One pattern or a list of patterns. `/expr/` is a regular expression, anything else a glob.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FilterPattern {
  /// A single pattern.
  One(String),
  /// Several patterns, any of which may match.
  Many(Vec<String>),
}

impl FilterPattern {
  /// Iterate over the configured patterns.
  pub fn patterns(&self) -> impl Iterator<Item = &str> {
    let values: &[String] = match self {
      Self::One(value) => std::slice::from_ref(value),
      Self::Many(values) => values,
    };
    values.iter().map(String::as_str)
  }
}

/// Include/exclude rules for web-accessible scripts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebAccessibleScriptsOptions {
  /// Files to compile and walk. Defaults to `.js`, `.mjs`, `.cjs` and `.ts` files.
  pub include: Option<FilterPattern>,
  /// Files to treat as opaque even when included.
  pub exclude: Option<FilterPattern>,
}

/// Options recognised by the manifest pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginOptions {
  /// Base manifest used as the template for the generated extension manifest.
  pub manifest: Manifest,
  /// Content scripts compiled alongside the manifest ones but not written to the manifest.
  #[serde(default)]
  pub extra_content_scripts: Vec<ContentScript>,
  /// Additional HTML pages to compile.
  #[serde(default)]
  pub extra_html_pages: Vec<String>,
  /// Sets `use_dynamic_url` on web-accessible resources generated for content scripts.
  #[serde(default = "default_true")]
  pub use_dynamic_url_content_scripts: bool,
  /// Filter deciding which web-accessible files are compiled and walked.
  #[serde(default)]
  pub web_accessible_scripts: WebAccessibleScriptsOptions,
  /// Whether the host bundler is running in watch mode.
  #[serde(default)]
  pub watch: bool,
}

fn default_true() -> bool {
  true
}

impl PluginOptions {
  /// Options for `manifest` with every other setting at its default.
  pub fn new(manifest: Manifest) -> Self {
    Self {
      manifest,
      extra_content_scripts: Vec::new(),
      extra_html_pages: Vec::new(),
      use_dynamic_url_content_scripts: true,
      web_accessible_scripts: WebAccessibleScriptsOptions::default(),
      watch: false,
    }
  }

  /// Look for one of [`DEFAULT_CONFIG_FILES`] inside `dir` and load the first one found.
  pub fn discover(dir: &Path) -> Result<Self> {
    let candidate = DEFAULT_CONFIG_FILES
      .iter()
      .map(|name| dir.join(name))
      .find(|path| path.is_file())
      .ok_or_else(|| anyhow!("no webext config found in {}", dir.display()))?;
    Self::from_path(&candidate)
  }

  /// Read options from a JSON or YAML file, chosen by extension.
  pub fn from_path(path: &Path) -> Result<Self> {
    let content = fs::read_to_string(path)
      .with_context(|| format!("config not found at {}", path.display()))?;

    let is_yaml = path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
      serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))
    } else {
      serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))
    }
  }

  /// Read only a manifest file and wrap it in default options.
  pub fn from_manifest_path(path: &Path) -> Result<Self> {
    let content = fs::read_to_string(path)
      .with_context(|| format!("manifest not found at {}", path.display()))?;
    let manifest: Manifest =
      serde_json::from_str(&content).context("failed to parse manifest JSON")?;
    Ok(Self::new(manifest))
  }
}

/// Directory a config file's relative references resolve against.
pub fn config_root(config_path: &Path) -> PathBuf {
  config_path
    .parent()
    .filter(|parent| !parent.as_os_str().is_empty())
    .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
