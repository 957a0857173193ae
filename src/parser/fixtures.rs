//! Shared scaffolding for the pipeline tests.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tempfile::TempDir;

use crate::bundle::{ChunkGraph, ChunkInfo};
use crate::config::PluginOptions;
use crate::models::{Manifest, ParseResult};
use crate::parser::ManifestParser;
use crate::paths::ProjectRoot;

/// Temporary project directory holding placeholder source files.
pub(crate) struct Project {
  dir: TempDir,
}

impl Project {
  pub(crate) fn with_files(files: &[&str]) -> Self {
    let dir = tempfile::tempdir().unwrap();
    for file in files {
      let path = dir.path().join(file);
      if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
      }
      fs::write(&path, format!("// {file}\n")).unwrap();
    }
    Self { dir }
  }

  pub(crate) fn path(&self) -> &Path {
    self.dir.path()
  }

  pub(crate) fn parser(&self, options: PluginOptions) -> ManifestParser {
    ManifestParser::new(options, ProjectRoot::new(self.path())).unwrap()
  }

  pub(crate) fn build(&self, options: PluginOptions, graph: &ChunkGraph) -> ParseResult {
    let parser = self.parser(options);
    let input = parser.parse_input().unwrap();
    parser.rewrite_output(input, graph).unwrap()
  }
}

pub(crate) fn options(manifest: Value) -> PluginOptions {
  PluginOptions::new(Manifest::from_value(manifest).unwrap())
}

/// Entry chunk compiled from the input registered as `name`.
pub(crate) fn entry(file_name: &str, name: &str) -> ChunkInfo {
  ChunkInfo {
    file_name: file_name.to_string(),
    name: name.to_string(),
    is_entry: true,
    ..ChunkInfo::default()
  }
}

/// Shared, non-entry chunk.
pub(crate) fn shared(file_name: &str) -> ChunkInfo {
  ChunkInfo {
    file_name: file_name.to_string(),
    name: file_name.trim_end_matches(".js").to_string(),
    ..ChunkInfo::default()
  }
}

pub(crate) fn importing(mut chunk: ChunkInfo, imports: &[&str]) -> ChunkInfo {
  chunk.imports = imports.iter().map(|import| import.to_string()).collect();
  chunk
}

pub(crate) fn strings(values: &[&str]) -> Vec<String> {
  values.iter().map(|value| value.to_string()).collect()
}
