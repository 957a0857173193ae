//! Host boundary supplying the compiled bundle to the output phase.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use super::{ChunkGraph, ChunkInfo};
use crate::error::{ManifestError, ManifestResult};

/// Provides the chunks the bundler produced.
///
/// Loading is the only suspension point of the output phase: once the chunks are in hand the
/// graph walks and manifest rewrites run synchronously.
#[async_trait]
pub trait BundleSource: Send + Sync {
  /// Every chunk of the completed build.
  async fn load_chunks(&self) -> ManifestResult<Vec<ChunkInfo>>;
}

#[async_trait]
impl BundleSource for Vec<ChunkInfo> {
  async fn load_chunks(&self) -> ManifestResult<Vec<ChunkInfo>> {
    Ok(self.clone())
  }
}

#[async_trait]
impl BundleSource for ChunkGraph {
  async fn load_chunks(&self) -> ManifestResult<Vec<ChunkInfo>> {
    Ok(self.chunks().to_vec())
  }
}

impl ChunkGraph {
  /// Await the host's chunks and index them.
  pub async fn load<S: BundleSource + ?Sized>(source: &S) -> ManifestResult<Self> {
    let chunks = source.load_chunks().await?;
    Ok(Self::new(chunks))
  }
}

/// Bundle metadata written to disk as JSON.
///
/// Accepts either an array of chunks or the bundler's `{ fileName: output }` map, in which
/// case entries with `"type": "asset"` are skipped.
///
/// This is a synchronous adapter: [`BundleSource::load_chunks`] reads the file on whichever
/// thread polls it. Hosts running an async runtime should implement [`BundleSource`] over their
/// own non-blocking reader, or call [`BundleFile::read_chunks`] from a blocking context.
#[derive(Debug, Clone)]
pub struct BundleFile {
  path: PathBuf,
}

impl BundleFile {
  /// Bundle description stored at `path`.
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// Read and parse the bundle description on the calling thread.
  pub fn read_chunks(&self) -> ManifestResult<Vec<ChunkInfo>> {
    let content = fs::read_to_string(&self.path).map_err(|err| {
      ManifestError::Bundle(format!("failed to read {}: {err}", self.path.display()))
    })?;
    self.parse(&content)
  }

  fn parse(&self, content: &str) -> ManifestResult<Vec<ChunkInfo>> {
    let value: Value = serde_json::from_str(content).map_err(|err| {
      ManifestError::Bundle(format!("failed to parse {}: {err}", self.path.display()))
    })?;

    let outputs = match value {
      Value::Array(items) => items,
      Value::Object(map) => map
        .into_iter()
        .map(|(file_name, mut output)| {
          if let Value::Object(fields) = &mut output {
            fields
              .entry("fileName")
              .or_insert_with(|| Value::String(file_name));
          }
          output
        })
        .filter(|output| output.get("type").and_then(Value::as_str) != Some("asset"))
        .collect(),
      _ => {
        return Err(ManifestError::Bundle(format!(
          "{} must contain an array or an object of chunks",
          self.path.display()
        )));
      }
    };

    outputs
      .into_iter()
      .map(|output| serde_json::from_value(output).map_err(ManifestError::from))
      .collect()
  }
}

#[async_trait]
impl BundleSource for BundleFile {
  async fn load_chunks(&self) -> ManifestResult<Vec<ChunkInfo>> {
    self.read_chunks()
  }
}
