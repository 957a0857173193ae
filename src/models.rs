//! Manifest data model and the accumulator threaded through the build stages.

use std::fmt;
use std::path::PathBuf;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{ManifestError, ManifestResult};

/// Manifest fields the pipeline never touches, written back unchanged.
pub type ExtraFields = Map<String, Value>;

/// Manifest schema generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestVersion {
  /// `manifest_version: 2`.
  V2,
  /// `manifest_version: 3`.
  V3,
}

impl fmt::Display for ManifestVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::V2 => write!(f, "2"),
      Self::V3 => write!(f, "3"),
    }
  }
}

/// Content script declaration shared by both schema generations.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ContentScript {
  /// Origin match patterns the script is injected into.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub matches: Option<Vec<String>>,
  /// Patterns excluded from injection.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exclude_matches: Option<Vec<String>>,
  /// Stylesheets injected with the script.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub css: Option<Vec<String>>,
  /// Scripts injected in order. Rewritten in place to compiled file names.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub js: Option<Vec<String>>,
  /// Injection timing.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub run_at: Option<String>,
  /// Inject into every frame rather than only the top one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub all_frames: Option<bool>,
  /// Inject into `about:blank` frames.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub match_about_blank: Option<bool>,
  /// Additional URL globs to include.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub include_globs: Option<Vec<String>>,
  /// URL globs to exclude.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exclude_globs: Option<Vec<String>>,
  /// Fields not interpreted by the pipeline (`world`, ...).
  #[serde(flatten)]
  pub extra: ExtraFields,
}

/// `chrome_url_overrides` pages.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ChromeUrlOverrides {
  /// New tab page.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub newtab: Option<String>,
  /// History page.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub history: Option<String>,
  /// Bookmarks page.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bookmarks: Option<String>,
  /// Fields not interpreted by the pipeline.
  #[serde(flatten)]
  pub extra: ExtraFields,
}

impl ChromeUrlOverrides {
  /// Override pages keyed by their field name.
  pub fn pages(&self) -> [(&'static str, Option<&String>); 3] {
    [
      ("newtab", self.newtab.as_ref()),
      ("history", self.history.as_ref()),
      ("bookmarks", self.bookmarks.as_ref()),
    ]
  }
}

/// `browser_action` (V2) and `action` (V3).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ActionDescriptor {
  /// Popup page.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_popup: Option<String>,
  /// Fields not interpreted by the pipeline.
  #[serde(flatten)]
  pub extra: ExtraFields,
}

/// `options_ui`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OptionsUi {
  /// Options page.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub page: Option<String>,
  /// Fields not interpreted by the pipeline.
  #[serde(flatten)]
  pub extra: ExtraFields,
}

/// V2 background: a page or a list of scripts.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BackgroundV2 {
  /// Background page.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub page: Option<String>,
  /// Background scripts.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub scripts: Option<Vec<String>>,
  /// Persistent background page flag.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub persistent: Option<bool>,
  /// Fields not interpreted by the pipeline.
  #[serde(flatten)]
  pub extra: ExtraFields,
}

/// V3 background: a service worker.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BackgroundV3 {
  /// Service worker entry point.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub service_worker: Option<String>,
  /// Worker type; forced to `module` when a service worker is compiled.
  #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
  pub worker_type: Option<String>,
  /// Fields not interpreted by the pipeline.
  #[serde(flatten)]
  pub extra: ExtraFields,
}

/// Structured V3 web-accessible resource record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WebAccessibleResourceV3 {
  /// Files exposed by this record.
  #[serde(default)]
  pub resources: Vec<String>,
  /// Origins allowed to load the resources.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub matches: Option<Vec<String>>,
  /// Extensions allowed to load the resources.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub extension_ids: Option<Vec<String>>,
  /// Serve resources from a per-session URL.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub use_dynamic_url: Option<bool>,
  /// Fields not interpreted by the pipeline.
  #[serde(flatten)]
  pub extra: ExtraFields,
}

impl WebAccessibleResourceV3 {
  /// Whether `other` grants access to the same audience.
  pub fn same_scope(&self, other: &Self) -> bool {
    self.matches == other.matches && self.extension_ids == other.extension_ids
  }
}

/// Manifest V2 descriptor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ManifestV2 {
  /// Always `2`.
  pub manifest_version: u8,
  /// Background page or scripts.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub background: Option<BackgroundV2>,
  /// Toolbar button.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub browser_action: Option<ActionDescriptor>,
  /// Embedded options page.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options_ui: Option<OptionsUi>,
  /// Standalone options page.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options_page: Option<String>,
  /// Devtools page.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub devtools_page: Option<String>,
  /// Replaced browser pages.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub chrome_url_overrides: Option<ChromeUrlOverrides>,
  /// Declared content scripts.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content_scripts: Option<Vec<ContentScript>>,
  /// Flat list of exposed paths, possibly globs.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub web_accessible_resources: Option<Vec<String>>,
  /// Fields not interpreted by the pipeline.
  #[serde(flatten)]
  pub extra: ExtraFields,
}

/// Manifest V3 descriptor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ManifestV3 {
  /// Always `3`.
  pub manifest_version: u8,
  /// Background service worker.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub background: Option<BackgroundV3>,
  /// Toolbar button.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub action: Option<ActionDescriptor>,
  /// Embedded options page.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options_ui: Option<OptionsUi>,
  /// Standalone options page.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options_page: Option<String>,
  /// Devtools page.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub devtools_page: Option<String>,
  /// Replaced browser pages.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub chrome_url_overrides: Option<ChromeUrlOverrides>,
  /// Declared content scripts.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content_scripts: Option<Vec<ContentScript>>,
  /// Structured records scoping exposed paths to origins.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub web_accessible_resources: Option<Vec<WebAccessibleResourceV3>>,
  /// Fields not interpreted by the pipeline.
  #[serde(flatten)]
  pub extra: ExtraFields,
}

/// Extension manifest of either schema generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Manifest {
  /// Manifest V2.
  V2(ManifestV2),
  /// Manifest V3.
  V3(ManifestV3),
}

impl<'de> Deserialize<'de> for Manifest {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Manifest::from_value(value).map_err(D::Error::custom)
  }
}

impl Manifest {
  /// Interpret a JSON value according to its `manifest_version`.
  pub fn from_value(value: Value) -> ManifestResult<Self> {
    match value.get("manifest_version").and_then(Value::as_u64) {
      Some(2) => Ok(Self::V2(serde_json::from_value(value)?)),
      Some(3) => Ok(Self::V3(serde_json::from_value(value)?)),
      _ => Err(ManifestError::UnsupportedManifestVersion(
        value
          .get("manifest_version")
          .map_or_else(|| "<missing>".to_string(), Value::to_string),
      )),
    }
  }

  /// Schema generation of this manifest.
  pub fn version(&self) -> ManifestVersion {
    match self {
      Self::V2(_) => ManifestVersion::V2,
      Self::V3(_) => ManifestVersion::V3,
    }
  }

  /// Content scripts declared in the manifest.
  pub fn content_scripts(&self) -> &[ContentScript] {
    let scripts = match self {
      Self::V2(manifest) => manifest.content_scripts.as_deref(),
      Self::V3(manifest) => manifest.content_scripts.as_deref(),
    };
    scripts.unwrap_or_default()
  }

  /// Mutable access to the declared content scripts.
  pub fn content_scripts_mut(&mut self) -> &mut [ContentScript] {
    let scripts = match self {
      Self::V2(manifest) => manifest.content_scripts.as_deref_mut(),
      Self::V3(manifest) => manifest.content_scripts.as_deref_mut(),
    };
    scripts.unwrap_or_default()
  }

  /// V2 manifest, if this is one.
  pub fn as_v2(&self) -> Option<&ManifestV2> {
    match self {
      Self::V2(manifest) => Some(manifest),
      Self::V3(_) => None,
    }
  }

  /// Mutable V2 manifest, if this is one.
  pub fn as_v2_mut(&mut self) -> Option<&mut ManifestV2> {
    match self {
      Self::V2(manifest) => Some(manifest),
      Self::V3(_) => None,
    }
  }

  /// V3 manifest, if this is one.
  pub fn as_v3(&self) -> Option<&ManifestV3> {
    match self {
      Self::V3(manifest) => Some(manifest),
      Self::V2(_) => None,
    }
  }

  /// Mutable V3 manifest, if this is one.
  pub fn as_v3_mut(&mut self) -> Option<&mut ManifestV3> {
    match self {
      Self::V3(manifest) => Some(manifest),
      Self::V2(_) => None,
    }
  }

  /// Serialise as the prettified `manifest.json` the browser loads.
  pub fn to_json_pretty(&self) -> ManifestResult<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }
}

/// A file the bundler should compile: `(output name, absolute input path)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputScript {
  /// Stable name the compiled entry is registered under.
  pub output_name: String,
  /// Absolute path of the source file.
  pub input_path: PathBuf,
  /// Manifest field that first referenced the file.
  pub field: String,
}

/// Asset added to the final output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitFile {
  /// Output-relative file name.
  pub file_name: String,
  /// File content.
  pub source: String,
}

/// Accumulator created once per build and threaded through every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
  /// Manifest being transformed.
  pub manifest: Manifest,
  /// Files to compile, in registration order.
  pub input_scripts: Vec<InputScript>,
  /// Assets to add to the output.
  pub emit_files: Vec<EmitFile>,
}

impl ParseResult {
  /// Start a build from `manifest`.
  pub fn new(manifest: Manifest) -> Self {
    Self {
      manifest,
      input_scripts: Vec::new(),
      emit_files: Vec::new(),
    }
  }

  /// Register a compile input. Returns `false` when the same file was already registered.
  ///
  /// A different file claiming an output name that is already taken is an
  /// [`ManifestError::OutputNameConflict`].
  pub fn add_input_script(&mut self, script: InputScript) -> ManifestResult<bool> {
    let position = self
      .input_scripts
      .iter()
      .position(|existing| existing.output_name == script.output_name);
    let Some(index) = position else {
      self.input_scripts.push(script);
      return Ok(true);
    };

    let existing = &self.input_scripts[index];
    if existing.input_path == script.input_path {
      return Ok(false);
    }
    Err(ManifestError::OutputNameConflict {
      output_name: script.output_name,
      field: script.field,
      existing_field: existing.field.clone(),
    })
  }

  /// Add an asset to the output, replacing an earlier one with the same file name.
  pub fn emit_asset(&mut self, file: EmitFile) {
    match self
      .emit_files
      .iter_mut()
      .find(|existing| existing.file_name == file.file_name)
    {
      Some(existing) => *existing = file,
      None => self.emit_files.push(file),
    }
  }

  /// Asset previously emitted under `file_name`.
  pub fn emitted(&self, file_name: &str) -> Option<&EmitFile> {
    self
      .emit_files
      .iter()
      .find(|file| file.file_name == file_name)
  }
}
