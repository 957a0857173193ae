//! Errors raised while transforming a manifest into build inputs and outputs.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::ManifestVersion;

/// Result alias used by the manifest pipeline.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Failures that abort a manifest build.
///
/// Every variant is fatal for the current build. Glob entries and files excluded by the
/// web-accessible script filter are never reported here: they pass through unchanged.
#[derive(Debug, Error)]
pub enum ManifestError {
  /// A manifest reference points at a file that does not exist on disk.
  #[error("{field} references `{reference}`, but {} does not exist", path.display())]
  Resolution {
    /// Manifest field holding the reference, e.g. `content_scripts[0].js[1]`.
    field: String,
    /// Reference as written in the manifest.
    reference: String,
    /// Absolute path the reference resolved to.
    path: PathBuf,
  },
  /// An input registered for compilation has no compiled chunk in the bundle.
  #[error("failed to find chunk info for `{reference}` ({field})")]
  BuildConsistency {
    /// Manifest field holding the reference.
    field: String,
    /// Reference that could not be matched to a chunk.
    reference: String,
  },
  /// Two different files compile to the same output name.
  #[error("{field} and {existing_field} both compile to output name `{output_name}`")]
  OutputNameConflict {
    /// Contested output name.
    output_name: String,
    /// Field of the rejected reference.
    field: String,
    /// Field of the reference registered first.
    existing_field: String,
  },
  /// The manifest declares a schema generation this crate does not handle.
  #[error("unsupported manifest_version {0}, expected 2 or 3")]
  UnsupportedManifestVersion(String),
  /// A stage of one schema generation received a manifest of the other.
  #[error("manifest_version {found} handed to the manifest_version {expected} pipeline")]
  SchemaMismatch {
    /// Generation the stage handles.
    expected: ManifestVersion,
    /// Generation of the manifest it received.
    found: ManifestVersion,
  },
  /// The manifest JSON does not match the declared schema generation.
  #[error("invalid manifest: {0}")]
  InvalidManifest(#[from] serde_json::Error),
  /// A web-accessible script filter pattern failed to compile.
  #[error("invalid filter pattern `{pattern}`: {message}")]
  InvalidFilterPattern {
    /// Pattern as configured.
    pattern: String,
    /// Compiler message.
    message: String,
  },
  /// The host failed to provide the compiled bundle.
  #[error("failed to load bundle: {0}")]
  Bundle(String),
}

impl ManifestError {
  pub(crate) fn resolution(field: impl Into<String>, reference: &str, path: PathBuf) -> Self {
    Self::Resolution {
      field: field.into(),
      reference: reference.to_string(),
      path,
    }
  }

  pub(crate) fn build_consistency(field: impl Into<String>, reference: &str) -> Self {
    Self::BuildConsistency {
      field: field.into(),
      reference: reference.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolution_message_names_field_and_path() {
    let err = ManifestError::resolution(
      "background.service_worker",
      "sw.ts",
      PathBuf::from("/project/sw.ts"),
    );
    let message = err.to_string();
    assert!(message.contains("background.service_worker"));
    assert!(message.contains("/project/sw.ts"));
  }

  #[test]
  fn build_consistency_message_names_reference() {
    let err = ManifestError::build_consistency("content_scripts[0].js[0]", "content.ts");
    assert_eq!(
      err.to_string(),
      "failed to find chunk info for `content.ts` (content_scripts[0].js[0])"
    );
  }
}
