//! Chunk metadata and the arena indexing it by output file name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::paths::{normalize_reference, output_file_name};

/// One compiled output chunk as reported by the bundler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkInfo {
  /// Output file name, relative to the output directory.
  pub file_name: String,
  /// Chunk name; for entry chunks the name the input was registered under.
  pub name: String,
  /// Compiled directly from a registered input.
  pub is_entry: bool,
  /// Target of a dynamic import.
  pub is_dynamic_entry: bool,
  /// Module the chunk is a facade for, when it has one.
  pub facade_module_id: Option<String>,
  /// Input modules bundled into the chunk.
  pub module_ids: Vec<String>,
  /// Chunks imported statically.
  pub imports: Vec<String>,
  /// Chunks imported with `import()`.
  pub dynamic_imports: Vec<String>,
  /// Stylesheets the chunk's modules imported.
  #[serde(alias = "importedCSS")]
  pub imported_css: Vec<String>,
  /// Static assets the chunk's modules imported.
  pub imported_assets: Vec<String>,
}

/// Arena of chunks indexed by output file name.
#[derive(Debug, Clone, Default)]
pub struct ChunkGraph {
  chunks: Vec<ChunkInfo>,
  by_file_name: BTreeMap<String, usize>,
}

impl ChunkGraph {
  /// Index the given chunks. When two chunks share a file name the first one wins.
  pub fn new(chunks: impl IntoIterator<Item = ChunkInfo>) -> Self {
    let mut graph = Self::default();
    for chunk in chunks {
      if graph.by_file_name.contains_key(&chunk.file_name) {
        tracing::warn!(file_name = %chunk.file_name, "duplicate chunk in bundle, keeping the first");
        continue;
      }
      graph
        .by_file_name
        .insert(chunk.file_name.clone(), graph.chunks.len());
      graph.chunks.push(chunk);
    }
    graph
  }

  /// Number of chunks in the bundle.
  pub fn len(&self) -> usize {
    self.chunks.len()
  }

  /// Whether the bundle has no chunks.
  pub fn is_empty(&self) -> bool {
    self.chunks.is_empty()
  }

  /// All chunks, in bundle order.
  pub fn chunks(&self) -> &[ChunkInfo] {
    &self.chunks
  }

  /// Chunk with the given output file name.
  pub fn get(&self, file_name: &str) -> Option<&ChunkInfo> {
    self.index_of(file_name).map(|index| &self.chunks[index])
  }

  pub(crate) fn index_of(&self, file_name: &str) -> Option<usize> {
    self.by_file_name.get(file_name).copied()
  }

  pub(crate) fn chunk_at(&self, index: usize) -> &ChunkInfo {
    &self.chunks[index]
  }

  /// Indices of every chunk imported statically or dynamically by the chunk at `index`.
  ///
  /// Imports that do not name a chunk in this bundle (externals, assets) are skipped.
  pub(crate) fn edges(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
    let chunk = &self.chunks[index];
    chunk
      .imports
      .iter()
      .chain(chunk.dynamic_imports.iter())
      .filter_map(move |import| {
        let target = self.index_of(import);
        if target.is_none() {
          tracing::trace!(from = %chunk.file_name, import = %import, "import is not a bundle chunk");
        }
        target
      })
  }

  /// Chunk a manifest reference compiled to.
  ///
  /// Matches, in order: an exact output file name, an entry chunk registered under the
  /// reference's output name, then a chunk whose facade module ends with the reference.
  pub fn find_for_reference(&self, reference: &str) -> Option<&ChunkInfo> {
    let normalized = normalize_reference(reference);
    if let Some(chunk) = self.get(&normalized) {
      return Some(chunk);
    }

    let output_name = output_file_name(reference);
    if let Some(chunk) = self
      .chunks
      .iter()
      .find(|chunk| chunk.is_entry && chunk.name == output_name)
    {
      return Some(chunk);
    }

    let suffix = format!("/{normalized}");
    self.chunks.iter().find(|chunk| {
      chunk.facade_module_id.as_deref().is_some_and(|facade| {
        let facade = facade.replace('\\', "/");
        facade == normalized || facade.ends_with(&suffix)
      })
    })
  }
}
