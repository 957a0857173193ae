//! Lifecycle hooks for the development serving mode.
//!
//! The dev server itself lives with the host. The pipeline only switches it on and off through
//! the schema generation's [`DevBuilder`].

use std::fmt;

use crate::models::ManifestVersion;

/// Capability object toggling development serving for one schema generation.
pub trait DevBuilder: fmt::Debug + Send + Sync {
  /// Schema generation this builder serves.
  fn manifest_version(&self) -> ManifestVersion;

  /// Start serving unbundled sources from `origin`.
  fn enable(&mut self, origin: &str);

  /// Stop serving; the next build is a regular one.
  fn disable(&mut self);

  /// Origin of the running dev server.
  fn dev_server_origin(&self) -> Option<&str>;

  /// Whether development serving is active.
  fn is_enabled(&self) -> bool {
    self.dev_server_origin().is_some()
  }
}

#[derive(Debug, Default)]
struct DevSession {
  origin: Option<String>,
}

impl DevSession {
  fn enable(&mut self, version: ManifestVersion, origin: &str) {
    let origin = origin.trim_end_matches('/').to_string();
    tracing::info!(manifest_version = %version, origin = %origin, "dev mode enabled");
    self.origin = Some(origin);
  }

  fn disable(&mut self, version: ManifestVersion) {
    if self.origin.take().is_some() {
      tracing::info!(manifest_version = %version, "dev mode disabled");
    }
  }
}

/// Dev hooks for Manifest V2 builds.
#[derive(Debug, Default)]
pub struct DevBuilderV2 {
  session: DevSession,
}

impl DevBuilder for DevBuilderV2 {
  fn manifest_version(&self) -> ManifestVersion {
    ManifestVersion::V2
  }

  fn enable(&mut self, origin: &str) {
    self.session.enable(ManifestVersion::V2, origin);
  }

  fn disable(&mut self) {
    self.session.disable(ManifestVersion::V2);
  }

  fn dev_server_origin(&self) -> Option<&str> {
    self.session.origin.as_deref()
  }
}

/// Dev hooks for Manifest V3 builds.
#[derive(Debug, Default)]
pub struct DevBuilderV3 {
  session: DevSession,
}

impl DevBuilder for DevBuilderV3 {
  fn manifest_version(&self) -> ManifestVersion {
    ManifestVersion::V3
  }

  fn enable(&mut self, origin: &str) {
    self.session.enable(ManifestVersion::V3, origin);
  }

  fn disable(&mut self) {
    self.session.disable(ManifestVersion::V3);
  }

  fn dev_server_origin(&self) -> Option<&str> {
    self.session.origin.as_deref()
  }
}
