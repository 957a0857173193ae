//! Two-phase manifest pipeline shared by both schema generations.
//!
//! The input phase discovers every file the bundler has to compile. The output phase runs after
//! compilation and rewrites the manifest against the produced chunks. Each phase is an ordered
//! list of named stages; every stage takes the [`ParseResult`] by value and hands it on, so the
//! order is explicit and later stages always see the rewrites of earlier ones.
//!
//! Schema-specific behaviour sits behind [`ManifestSchema`]; the engine never sees a concrete
//! adapter.

mod context;
#[cfg(test)]
mod fixtures;
pub mod loader;
mod v2;
mod v3;

use std::fmt;

pub use context::{ContentScriptExposure, FileReference, ParseContext, ParsedScript};
pub use v2::ManifestV2Schema;
pub use v3::{ManifestV3Schema, generalize_match_pattern};

use crate::bundle::{BundleSource, ChunkGraph};
use crate::config::PluginOptions;
use crate::dev::DevBuilder;
use crate::error::ManifestResult;
use crate::filter::ScriptFilter;
use crate::models::{ContentScript, Manifest, ManifestVersion, ParseResult};
use crate::paths::PathResolver;

/// Stage of the input phase.
pub type InputStep = fn(&ParseContext<'_>, ParseResult) -> ManifestResult<ParseResult>;

/// Stage of the output phase.
pub type OutputStep =
  fn(&ParseContext<'_>, ParseResult, &ChunkGraph) -> ManifestResult<ParseResult>;

/// A named pipeline stage.
#[derive(Clone, Copy)]
pub struct Stage<F> {
  /// Name reported in logs and by the stage listings.
  pub name: &'static str,
  /// Stage body.
  pub run: F,
}

impl<F> Stage<F> {
  /// Stage `name` running `run`.
  pub const fn new(name: &'static str, run: F) -> Self {
    Self { name, run }
  }
}

impl<F> fmt::Debug for Stage<F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Stage").field("name", &self.name).finish()
  }
}

/// Behaviour that differs between manifest schema generations.
pub trait ManifestSchema: fmt::Debug + Send + Sync {
  /// Generation handled by this adapter.
  fn manifest_version(&self) -> ManifestVersion;

  /// Every single-file HTML page the manifest and options reference.
  fn html_file_names(&self, manifest: &Manifest, options: &PluginOptions) -> Vec<FileReference>;

  /// Schema-specific input stages, run between HTML and content-script discovery.
  fn parse_input_methods(&self) -> Vec<Stage<InputStep>>;

  /// Schema-specific output stages, run before the content-script rewrite.
  fn parse_output_methods(&self) -> Vec<Stage<OutputStep>>;

  /// Output stage rewriting content scripts and exposing their dependencies.
  fn parse_output_content_scripts(&self) -> Stage<OutputStep>;

  /// Output stage exposing dependencies of declared web-accessible scripts.
  fn parse_output_web_accessible_scripts(&self) -> Stage<OutputStep>;

  /// Every path listed in `web_accessible_resources`, flattened.
  fn web_accessible_resources(&self, manifest: &Manifest) -> Vec<String>;

  /// Dev-mode hooks for this generation.
  fn create_dev_builder(&self) -> Box<dyn DevBuilder>;
}

/// Adapter for a schema generation.
pub fn schema_for(version: ManifestVersion) -> Box<dyn ManifestSchema> {
  match version {
    ManifestVersion::V2 => Box::new(ManifestV2Schema),
    ManifestVersion::V3 => Box::new(ManifestV3Schema),
  }
}

/// Drives one build of one manifest.
///
/// Concurrent builds each need their own parser.
#[derive(Debug)]
pub struct ManifestParser {
  schema: Box<dyn ManifestSchema>,
  options: PluginOptions,
  paths: Box<dyn PathResolver>,
  filter: ScriptFilter,
  dev_builder: Box<dyn DevBuilder>,
}

impl ManifestParser {
  /// Create a parser for `options.manifest`, picking the adapter from its `manifest_version`.
  pub fn new(options: PluginOptions, paths: impl PathResolver + 'static) -> ManifestResult<Self> {
    let schema = schema_for(options.manifest.version());
    let filter = ScriptFilter::new(&options.web_accessible_scripts)?;
    let dev_builder = schema.create_dev_builder();

    Ok(Self {
      schema,
      options,
      paths: Box::new(paths),
      filter,
      dev_builder,
    })
  }

  /// Schema generation being built.
  pub fn manifest_version(&self) -> ManifestVersion {
    self.schema.manifest_version()
  }

  /// Options of this build.
  pub fn options(&self) -> &PluginOptions {
    &self.options
  }

  /// Predicate deciding which web-accessible files are compiled and walked.
  pub fn web_accessible_scripts_filter(&self) -> &ScriptFilter {
    &self.filter
  }

  fn context(&self) -> ParseContext<'_> {
    ParseContext {
      schema: self.schema.as_ref(),
      options: &self.options,
      paths: self.paths.as_ref(),
      filter: &self.filter,
    }
  }

  /// Input stages in execution order.
  pub fn input_stages(&self) -> Vec<Stage<InputStep>> {
    let mut stages = vec![Stage::new("html", parse_input_html as InputStep)];
    stages.extend(self.schema.parse_input_methods());
    stages.push(Stage::new(
      "content_scripts",
      parse_input_content_scripts as InputStep,
    ));
    stages
  }

  /// Output stages in execution order.
  pub fn output_stages(&self) -> Vec<Stage<OutputStep>> {
    let mut stages = self.schema.parse_output_methods();
    stages.push(self.schema.parse_output_content_scripts());
    stages.push(self.schema.parse_output_web_accessible_scripts());
    stages
  }

  /// Names of the input stages, in order.
  pub fn input_stage_names(&self) -> Vec<&'static str> {
    self.input_stages().iter().map(|stage| stage.name).collect()
  }

  /// Names of the output stages, in order.
  pub fn output_stage_names(&self) -> Vec<&'static str> {
    self.output_stages().iter().map(|stage| stage.name).collect()
  }

  /// Discover every file the bundler has to compile.
  pub fn parse_input(&self) -> ManifestResult<ParseResult> {
    let context = self.context();
    let initial = ParseResult::new(self.options.manifest.clone());

    self
      .input_stages()
      .into_iter()
      .try_fold(initial, |result, stage| {
        tracing::debug!(stage = stage.name, "running input stage");
        (stage.run)(&context, result)
      })
  }

  /// Rewrite `result` against the compiled bundle provided by `source`.
  ///
  /// Waits for the host once to obtain the chunks; every stage after that is synchronous.
  pub async fn parse_output<S: BundleSource + ?Sized>(
    &self,
    result: ParseResult,
    source: &S,
  ) -> ManifestResult<ParseResult> {
    let graph = ChunkGraph::load(source).await?;
    self.rewrite_output(result, &graph)
  }

  /// Run the output stages against an already loaded chunk graph.
  pub fn rewrite_output(
    &self,
    result: ParseResult,
    graph: &ChunkGraph,
  ) -> ManifestResult<ParseResult> {
    let context = self.context();

    self
      .output_stages()
      .into_iter()
      .try_fold(result, |result, stage| {
        tracing::debug!(stage = stage.name, "running output stage");
        (stage.run)(&context, result, graph)
      })
  }

  /// Content scripts declared in `result`'s manifest.
  pub fn content_scripts<'r>(&self, result: &'r ParseResult) -> &'r [ContentScript] {
    result.manifest.content_scripts()
  }

  /// Flattened `web_accessible_resources` of `result`'s manifest.
  pub fn web_accessible_resources(&self, result: &ParseResult) -> Vec<String> {
    self.schema.web_accessible_resources(&result.manifest)
  }

  /// Dev-mode hooks of this build.
  pub fn dev_builder(&self) -> &dyn DevBuilder {
    self.dev_builder.as_ref()
  }

  /// Switch the host into development serving from `origin`.
  pub fn enable_dev_mode(&mut self, origin: &str) {
    self.dev_builder.enable(origin);
  }

  /// Leave development serving.
  pub fn disable_dev_mode(&mut self) {
    self.dev_builder.disable();
  }
}

fn parse_input_html(context: &ParseContext<'_>, mut result: ParseResult) -> ManifestResult<ParseResult> {
  let pages = context
    .schema
    .html_file_names(&result.manifest, context.options);

  for page in pages {
    context.register_input(&mut result, &page.field, &page.file_name)?;
  }

  Ok(result)
}

fn parse_input_content_scripts(
  context: &ParseContext<'_>,
  mut result: ParseResult,
) -> ManifestResult<ParseResult> {
  let mut references = Vec::new();
  collect_content_script_files(
    "content_scripts",
    result.manifest.content_scripts(),
    &mut references,
  );
  collect_content_script_files(
    "extraContentScripts",
    &context.options.extra_content_scripts,
    &mut references,
  );

  for reference in references {
    context.register_input(&mut result, &reference.field, &reference.file_name)?;
  }

  Ok(result)
}

fn collect_content_script_files(
  field: &str,
  scripts: &[ContentScript],
  references: &mut Vec<FileReference>,
) {
  for (script_index, script) in scripts.iter().enumerate() {
    for (kind, files) in [("js", &script.js), ("css", &script.css)] {
      for (index, file_name) in files.iter().flatten().enumerate() {
        references.push(FileReference::new(
          format!("{field}[{script_index}].{kind}[{index}]"),
          file_name.clone(),
        ));
      }
    }
  }
}
