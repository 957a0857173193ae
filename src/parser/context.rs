//! Shared state and helpers handed to every build stage.

use std::collections::BTreeSet;

use crate::bundle::ChunkGraph;
use crate::config::PluginOptions;
use crate::error::{ManifestError, ManifestResult};
use crate::filter::ScriptFilter;
use crate::models::{ChromeUrlOverrides, ContentScript, InputScript, ParseResult};
use crate::parser::ManifestSchema;
use crate::paths::{PathResolver, is_glob, normalize_reference};
use crate::resolver::{ResourceExposure, resolve_exposure};

/// A manifest field pointing at a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
  /// Field path used in error messages, e.g. `options_ui.page`.
  pub field: String,
  /// Reference as written in the manifest.
  pub file_name: String,
}

impl FileReference {
  /// Reference found at `field`.
  pub fn new(field: impl Into<String>, file_name: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      file_name: file_name.into(),
    }
  }
}

/// HTML pages collected while scanning a manifest.
#[derive(Debug, Default)]
pub(crate) struct HtmlPages {
  pages: Vec<FileReference>,
}

impl HtmlPages {
  pub(crate) fn push(&mut self, field: impl Into<String>, page: Option<&String>) {
    if let Some(page) = page {
      self.pages.push(FileReference::new(field, page.clone()));
    }
  }

  pub(crate) fn push_overrides(&mut self, overrides: Option<&ChromeUrlOverrides>) {
    let Some(overrides) = overrides else {
      return;
    };
    for (key, page) in overrides.pages() {
      self.push(format!("chrome_url_overrides.{key}"), page);
    }
  }

  pub(crate) fn push_extra_pages(&mut self, options: &PluginOptions) {
    for (index, page) in options.extra_html_pages.iter().enumerate() {
      self.push(format!("extraHtmlPages[{index}]"), Some(page));
    }
  }

  pub(crate) fn into_inner(self) -> Vec<FileReference> {
    self.pages
  }
}

/// A compiled script reference and what it needs exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScript {
  /// Output file name the reference compiled to.
  pub file_name: String,
  /// Files that must become web-accessible for it to run.
  pub exposure: ResourceExposure,
}

/// Exposure computed for one content script, with the patterns it is injected on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentScriptExposure {
  /// The content script's `matches`.
  pub matches: Vec<String>,
  /// Union of the exposures of its scripts.
  pub files: BTreeSet<String>,
}

/// Read-only view of the parser's collaborators, passed to each stage.
pub struct ParseContext<'a> {
  pub(crate) schema: &'a dyn ManifestSchema,
  pub(crate) options: &'a PluginOptions,
  pub(crate) paths: &'a dyn PathResolver,
  pub(crate) filter: &'a ScriptFilter,
}

impl ParseContext<'_> {
  /// Plugin options of the current build.
  pub fn options(&self) -> &PluginOptions {
    self.options
  }

  /// Whether a web-accessible reference should be compiled and walked.
  ///
  /// Globs and files rejected by the filter are opaque and pass through untouched.
  pub fn is_walkable(&self, reference: &str) -> bool {
    if is_glob(reference) {
      tracing::trace!(reference, "glob reference passes through unchanged");
      return false;
    }
    self.filter.is_match(reference)
  }

  /// Whether a web-accessible resource is walked by the output phase.
  ///
  /// Besides passing [`Self::is_walkable`], the resource has to name a chunk of the bundle or a
  /// registered compile input. Static assets a chunk imported are exposed as they are.
  pub fn is_output_walkable(
    &self,
    result: &ParseResult,
    reference: &str,
    graph: &ChunkGraph,
  ) -> bool {
    if !self.is_walkable(reference) {
      return false;
    }
    if graph.get(&normalize_reference(reference)).is_some() {
      return true;
    }

    let output_name = self.paths.output_name(reference);
    let registered = result
      .input_scripts
      .iter()
      .any(|script| script.output_name == output_name);
    if !registered {
      tracing::trace!(reference, "not a chunk or compile input, exposed as is");
    }
    registered
  }

  /// Register `reference` as a compile input, failing when the file does not exist.
  pub fn register_input(
    &self,
    result: &mut ParseResult,
    field: &str,
    reference: &str,
  ) -> ManifestResult<()> {
    let input_path = self.paths.input_path(reference);
    if !self.paths.exists(&input_path) {
      return Err(ManifestError::resolution(field, reference, input_path));
    }

    let output_name = self.paths.output_name(reference);
    let added = result.add_input_script(InputScript {
      output_name: output_name.clone(),
      input_path,
      field: field.to_string(),
    })?;
    if added {
      tracing::debug!(field, output = %output_name, "registered input");
    }
    Ok(())
  }

  /// Chunk for a content script reference plus the chunks it needs exposed.
  pub fn parse_output_content_script(
    &self,
    field: &str,
    script_file_name: &str,
    graph: &ChunkGraph,
  ) -> ManifestResult<ParsedScript> {
    self.parse_output_chunk(field, script_file_name, graph)
  }

  /// Chunk for a declared web-accessible script plus the chunks it needs exposed.
  pub fn parse_output_web_accessible_script(
    &self,
    field: &str,
    file_name: &str,
    graph: &ChunkGraph,
  ) -> ManifestResult<ParsedScript> {
    self.parse_output_chunk(field, file_name, graph)
  }

  fn parse_output_chunk(
    &self,
    field: &str,
    reference: &str,
    graph: &ChunkGraph,
  ) -> ManifestResult<ParsedScript> {
    let chunk = graph
      .find_for_reference(reference)
      .ok_or_else(|| ManifestError::build_consistency(field, reference))?;

    Ok(ParsedScript {
      file_name: chunk.file_name.clone(),
      exposure: resolve_exposure(graph, &chunk.file_name),
    })
  }

  /// Rewrite every content script's `js` entries to compiled file names and collect what each
  /// script needs exposed. Imported stylesheets are appended to the script's `css`.
  ///
  /// `extraContentScripts` are walked as well but, not being part of the manifest, only
  /// contribute exposures.
  pub fn rewrite_content_scripts(
    &self,
    result: &mut ParseResult,
    graph: &ChunkGraph,
  ) -> ManifestResult<Vec<ContentScriptExposure>> {
    let mut exposures = Vec::new();

    for (script_index, script) in result.manifest.content_scripts_mut().iter_mut().enumerate() {
      let mut files = BTreeSet::new();
      let mut stylesheets = Vec::new();

      if let Some(js) = script.js.as_mut() {
        for (index, file_name) in js.iter_mut().enumerate() {
          let field = format!("content_scripts[{script_index}].js[{index}]");
          let parsed = self.parse_output_content_script(&field, file_name, graph)?;
          *file_name = parsed.file_name;
          files.extend(parsed.exposure.files);
          stylesheets.extend(parsed.exposure.stylesheets);
        }
      }

      append_stylesheets(script, stylesheets);
      exposures.push(ContentScriptExposure {
        matches: script.matches.clone().unwrap_or_default(),
        files,
      });
    }

    for (script_index, script) in self.options.extra_content_scripts.iter().enumerate() {
      let mut files = BTreeSet::new();
      for (index, file_name) in script.js.iter().flatten().enumerate() {
        let field = format!("extraContentScripts[{script_index}].js[{index}]");
        let parsed = self.parse_output_content_script(&field, file_name, graph)?;
        files.extend(parsed.exposure.files);
      }
      exposures.push(ContentScriptExposure {
        matches: script.matches.clone().unwrap_or_default(),
        files,
      });
    }

    Ok(exposures)
  }
}

fn append_stylesheets(script: &mut ContentScript, stylesheets: Vec<String>) {
  if stylesheets.is_empty() {
    return;
  }

  let css = script.css.get_or_insert_with(Vec::new);
  for stylesheet in stylesheets {
    if !css.contains(&stylesheet) {
      css.push(stylesheet);
    }
  }
}

/// Append `values` to `target`, skipping ones already present.
pub(crate) fn push_unique(target: &mut Vec<String>, values: impl IntoIterator<Item = String>) {
  let mut seen: BTreeSet<String> = target.iter().cloned().collect();
  for value in values {
    if seen.insert(value.clone()) {
      target.push(value);
    }
  }
}
