//! Computes which sibling chunks must be web-accessible for a chunk to load.
//!
//! Content scripts and page-injected modules run where only files declared in the manifest can
//! be fetched. Any chunk they import, directly or through other chunks, has to be exposed too,
//! unless it is itself an entry point and therefore already reachable.

use std::collections::BTreeSet;

use crate::bundle::ChunkGraph;

/// Result of walking a chunk's import graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceExposure {
  /// Chunks and imported assets that must become web-accessible.
  pub files: BTreeSet<String>,
  /// Stylesheets imported by the start chunk and the exposed chunks, in discovery order.
  pub stylesheets: Vec<String>,
}

impl ResourceExposure {
  /// Whether nothing needs to be exposed.
  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }
}

/// Walk static and dynamic imports from the chunk named `start`.
///
/// The start chunk is never part of its own result, even when reachable through a cycle.
/// Imported entry chunks are excluded and not descended into. Unknown start chunks yield an
/// empty exposure.
pub fn resolve_exposure(graph: &ChunkGraph, start: &str) -> ResourceExposure {
  let Some(start_index) = graph.index_of(start) else {
    return ResourceExposure::default();
  };

  let mut walk = ExposureWalk::new(graph);
  walk.run(start_index);
  walk.finish()
}

struct ExposureWalk<'a> {
  graph: &'a ChunkGraph,
  visited: BTreeSet<&'a str>,
  seen_stylesheets: BTreeSet<&'a str>,
  stack: Vec<usize>,
  exposure: ResourceExposure,
}

impl<'a> ExposureWalk<'a> {
  fn new(graph: &'a ChunkGraph) -> Self {
    Self {
      graph,
      visited: BTreeSet::new(),
      seen_stylesheets: BTreeSet::new(),
      stack: Vec::new(),
      exposure: ResourceExposure::default(),
    }
  }

  fn run(&mut self, start: usize) {
    let graph = self.graph;
    self.visited.insert(graph.chunk_at(start).file_name.as_str());
    self.collect_metadata(start);
    self.stack.push(start);

    while let Some(index) = self.stack.pop() {
      for target in graph.edges(index) {
        let chunk = graph.chunk_at(target);
        if !self.visited.insert(chunk.file_name.as_str()) {
          continue;
        }
        if chunk.is_entry {
          continue;
        }

        self.exposure.files.insert(chunk.file_name.clone());
        self.collect_metadata(target);
        self.stack.push(target);
      }
    }
  }

  fn collect_metadata(&mut self, index: usize) {
    let graph = self.graph;
    let chunk = graph.chunk_at(index);
    for asset in &chunk.imported_assets {
      self.exposure.files.insert(asset.clone());
    }
    for stylesheet in &chunk.imported_css {
      if self.seen_stylesheets.insert(stylesheet.as_str()) {
        self.exposure.stylesheets.push(stylesheet.clone());
      }
    }
  }

  fn finish(self) -> ResourceExposure {
    self.exposure
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bundle::ChunkInfo;

  fn chunk(file_name: &str, is_entry: bool, imports: &[&str], dynamic: &[&str]) -> ChunkInfo {
    ChunkInfo {
      file_name: file_name.into(),
      name: file_name.trim_end_matches(".js").into(),
      is_entry,
      imports: imports.iter().map(|s| s.to_string()).collect(),
      dynamic_imports: dynamic.iter().map(|s| s.to_string()).collect(),
      ..Default::default()
    }
  }

  fn files(exposure: &ResourceExposure) -> Vec<&str> {
    exposure.files.iter().map(String::as_str).collect()
  }

  #[test]
  fn chunk_without_imports_exposes_nothing() {
    let graph = ChunkGraph::new(vec![chunk("content.js", true, &[], &[])]);
    assert!(resolve_exposure(&graph, "content.js").is_empty());
  }

  #[test]
  fn unknown_start_exposes_nothing() {
    let graph = ChunkGraph::new(vec![chunk("content.js", true, &["a.js"], &[])]);
    assert!(resolve_exposure(&graph, "missing.js").is_empty());
  }

  #[test]
  fn follows_static_and_dynamic_imports_transitively() {
    let graph = ChunkGraph::new(vec![
      chunk("content.js", true, &["a.js"], &["lazy.js"]),
      chunk("a.js", false, &["b.js"], &[]),
      chunk("b.js", false, &[], &[]),
      chunk("lazy.js", false, &["c.js"], &[]),
      chunk("c.js", false, &[], &[]),
      chunk("unrelated.js", false, &[], &[]),
    ]);

    let exposure = resolve_exposure(&graph, "content.js");
    assert_eq!(files(&exposure), vec!["a.js", "b.js", "c.js", "lazy.js"]);
  }

  #[test]
  fn terminates_on_cycles_without_duplicates() {
    let graph = ChunkGraph::new(vec![
      chunk("content.js", true, &["a.js"], &[]),
      chunk("a.js", false, &["b.js"], &[]),
      chunk("b.js", false, &["a.js"], &["a.js"]),
    ]);

    let exposure = resolve_exposure(&graph, "content.js");
    assert_eq!(files(&exposure), vec!["a.js", "b.js"]);
  }

  #[test]
  fn start_chunk_is_never_exposed_through_a_cycle() {
    let graph = ChunkGraph::new(vec![
      chunk("content.js", true, &["a.js"], &[]),
      chunk("a.js", false, &["content.js"], &[]),
    ]);

    let exposure = resolve_exposure(&graph, "content.js");
    assert_eq!(files(&exposure), vec!["a.js"]);
  }

  #[test]
  fn imported_entry_points_are_excluded_and_not_descended() {
    let graph = ChunkGraph::new(vec![
      chunk("content.js", true, &["other-entry.js", "shared.js"], &[]),
      chunk("other-entry.js", true, &["private.js"], &[]),
      chunk("private.js", false, &[], &[]),
      chunk("shared.js", false, &[], &[]),
    ]);

    let exposure = resolve_exposure(&graph, "content.js");
    assert_eq!(files(&exposure), vec!["shared.js"]);
  }

  #[test]
  fn collects_imported_assets_and_stylesheets() {
    let mut content = chunk("content.js", true, &["a.js"], &[]);
    content.imported_css = vec!["content.css".into()];
    content.imported_assets = vec!["logo.svg".into()];
    let mut a = chunk("a.js", false, &[], &[]);
    a.imported_css = vec!["a.css".into(), "content.css".into()];

    let graph = ChunkGraph::new(vec![content, a]);
    let exposure = resolve_exposure(&graph, "content.js");

    assert_eq!(files(&exposure), vec!["a.js", "logo.svg"]);
    assert_eq!(exposure.stylesheets, vec![
      "content.css".to_string(),
      "a.css".to_string()
    ]);
  }
}
