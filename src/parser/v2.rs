//! Manifest V2 adapter.
//!
//! V2 exposes files through a flat `web_accessible_resources` list, so every dependency any
//! content or web-accessible script needs is merged into that one list.

use crate::bundle::ChunkGraph;
use crate::config::PluginOptions;
use crate::dev::{DevBuilder, DevBuilderV2};
use crate::error::{ManifestError, ManifestResult};
use crate::models::{Manifest, ManifestV2, ManifestVersion, ParseResult};
use crate::parser::context::{HtmlPages, push_unique};
use crate::parser::{FileReference, InputStep, ManifestSchema, OutputStep, ParseContext, Stage};
use crate::paths::is_single_html_filename;

/// Behaviour of `manifest_version: 2` builds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestV2Schema;

impl ManifestSchema for ManifestV2Schema {
  fn manifest_version(&self) -> ManifestVersion {
    ManifestVersion::V2
  }

  fn html_file_names(&self, manifest: &Manifest, options: &PluginOptions) -> Vec<FileReference> {
    let Some(manifest) = manifest.as_v2() else {
      return Vec::new();
    };

    let mut pages = HtmlPages::default();
    pages.push(
      "background.page",
      manifest.background.as_ref().and_then(|b| b.page.as_ref()),
    );
    pages.push(
      "browser_action.default_popup",
      manifest
        .browser_action
        .as_ref()
        .and_then(|action| action.default_popup.as_ref()),
    );
    pages.push(
      "options_ui.page",
      manifest.options_ui.as_ref().and_then(|ui| ui.page.as_ref()),
    );
    pages.push("options_page", manifest.options_page.as_ref());
    pages.push("devtools_page", manifest.devtools_page.as_ref());
    pages.push_overrides(manifest.chrome_url_overrides.as_ref());
    pages.push_extra_pages(options);

    for (index, resource) in manifest.web_accessible_resources.iter().flatten().enumerate() {
      if is_single_html_filename(resource) {
        pages.push(format!("web_accessible_resources[{index}]"), Some(resource));
      }
    }

    pages.into_inner()
  }

  fn parse_input_methods(&self) -> Vec<Stage<InputStep>> {
    vec![Stage::new(
      "web_accessible_scripts",
      parse_input_web_accessible_scripts as InputStep,
    )]
  }

  fn parse_output_methods(&self) -> Vec<Stage<OutputStep>> {
    vec![Stage::new(
      "watch_mode_support",
      parse_watch_mode_support as OutputStep,
    )]
  }

  fn parse_output_content_scripts(&self) -> Stage<OutputStep> {
    Stage::new("content_scripts", parse_output_content_scripts as OutputStep)
  }

  fn parse_output_web_accessible_scripts(&self) -> Stage<OutputStep> {
    Stage::new(
      "web_accessible_scripts",
      parse_output_web_accessible_scripts as OutputStep,
    )
  }

  fn web_accessible_resources(&self, manifest: &Manifest) -> Vec<String> {
    manifest
      .as_v2()
      .and_then(|manifest| manifest.web_accessible_resources.clone())
      .unwrap_or_default()
  }

  fn create_dev_builder(&self) -> Box<dyn DevBuilder> {
    Box::new(DevBuilderV2::default())
  }
}

fn manifest_v2(manifest: &mut Manifest) -> ManifestResult<&mut ManifestV2> {
  match manifest {
    Manifest::V2(manifest) => Ok(manifest),
    Manifest::V3(_) => Err(ManifestError::SchemaMismatch {
      expected: ManifestVersion::V2,
      found: ManifestVersion::V3,
    }),
  }
}

fn declared_resources(result: &mut ParseResult) -> ManifestResult<Vec<String>> {
  Ok(
    manifest_v2(&mut result.manifest)?
      .web_accessible_resources
      .clone()
      .unwrap_or_default(),
  )
}

/// Replace the resource list with the deduplicated union of `resources` and `discovered`.
fn merge_resources(
  manifest: &mut ManifestV2,
  resources: Vec<String>,
  discovered: impl IntoIterator<Item = String>,
) {
  let mut merged = Vec::with_capacity(resources.len());
  push_unique(&mut merged, resources.into_iter().chain(discovered));
  if !merged.is_empty() {
    manifest.web_accessible_resources = Some(merged);
  }
}

fn parse_input_web_accessible_scripts(
  context: &ParseContext<'_>,
  mut result: ParseResult,
) -> ManifestResult<ParseResult> {
  let resources = declared_resources(&mut result)?;

  for (index, resource) in resources.iter().enumerate() {
    if context.is_walkable(resource) {
      context.register_input(
        &mut result,
        &format!("web_accessible_resources[{index}]"),
        resource,
      )?;
    }
  }

  Ok(result)
}

/// V2 needs nothing extra for watch builds; the hook only reports that it ran.
fn parse_watch_mode_support(
  context: &ParseContext<'_>,
  mut result: ParseResult,
  _graph: &ChunkGraph,
) -> ManifestResult<ParseResult> {
  if context.options().watch && !declared_resources(&mut result)?.is_empty() {
    tracing::debug!("watch mode: web-accessible resources left as declared");
  }
  Ok(result)
}

fn parse_output_content_scripts(
  context: &ParseContext<'_>,
  mut result: ParseResult,
  graph: &ChunkGraph,
) -> ManifestResult<ParseResult> {
  let exposures = context.rewrite_content_scripts(&mut result, graph)?;
  let discovered: Vec<String> = exposures
    .into_iter()
    .flat_map(|exposure| exposure.files)
    .collect();

  let resources = declared_resources(&mut result)?;
  if discovered.is_empty() && resources.is_empty() {
    return Ok(result);
  }

  merge_resources(manifest_v2(&mut result.manifest)?, resources, discovered);
  Ok(result)
}

fn parse_output_web_accessible_scripts(
  context: &ParseContext<'_>,
  mut result: ParseResult,
  graph: &ChunkGraph,
) -> ManifestResult<ParseResult> {
  let mut resources = declared_resources(&mut result)?;
  if resources.is_empty() {
    return Ok(result);
  }

  let mut discovered = Vec::new();
  for (index, resource) in resources.iter_mut().enumerate() {
    if !context.is_output_walkable(&result, resource, graph) {
      continue;
    }

    let field = format!("web_accessible_resources[{index}]");
    let parsed = context.parse_output_web_accessible_script(&field, resource, graph)?;
    *resource = parsed.file_name;
    discovered.extend(parsed.exposure.files);
  }

  merge_resources(manifest_v2(&mut result.manifest)?, resources, discovered);
  Ok(result)
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::parser::fixtures::{Project, entry, importing, options, shared, strings};

  fn resources(result: &ParseResult) -> Vec<String> {
    result
      .manifest
      .as_v2()
      .and_then(|manifest| manifest.web_accessible_resources.clone())
      .unwrap_or_default()
  }

  #[test]
  fn discovers_every_html_page() {
    let mut options = options(json!({
      "manifest_version": 2,
      "background": { "page": "background.html" },
      "browser_action": { "default_popup": "popup.html" },
      "options_ui": { "page": "options.html" },
      "devtools_page": "devtools.html",
      "chrome_url_overrides": { "newtab": "newtab.html" },
      "web_accessible_resources": ["frame.html", "pages/*.html", "inject.js"]
    }));
    options.extra_html_pages = strings(&["welcome.html"]);

    let pages = ManifestV2Schema.html_file_names(&options.manifest, &options);
    let fields: Vec<&str> = pages.iter().map(|page| page.field.as_str()).collect();
    assert_eq!(
      fields,
      [
        "background.page",
        "browser_action.default_popup",
        "options_ui.page",
        "devtools_page",
        "chrome_url_overrides.newtab",
        "extraHtmlPages[0]",
        "web_accessible_resources[0]",
      ]
    );
  }

  #[test]
  fn content_script_dependencies_merge_into_flat_list() {
    let project = Project::with_files(&["a.ts", "b.ts", "shared.js"]);
    let options = options(json!({
      "manifest_version": 2,
      "content_scripts": [
        { "matches": ["https://a.example/*"], "js": ["a.ts"] },
        { "matches": ["https://b.example/*"], "js": ["b.ts"] }
      ],
      "web_accessible_resources": ["icons/*.png", "shared.js"]
    }));
    let graph = ChunkGraph::new([
      importing(entry("a.js", "a"), &["shared.js", "a-only.js"]),
      importing(entry("b.js", "b"), &["shared.js"]),
      shared("shared.js"),
      shared("a-only.js"),
    ]);

    let result = project.build(options, &graph);
    assert_eq!(
      resources(&result),
      ["icons/*.png", "shared.js", "a-only.js"]
    );
    assert_eq!(result.manifest.content_scripts()[0].js, Some(strings(&["a.js"])));
  }

  #[test]
  fn web_accessible_scripts_are_renamed_and_expose_imports() {
    let project = Project::with_files(&["inject.ts"]);
    let options = options(json!({
      "manifest_version": 2,
      "web_accessible_resources": ["inject.ts", "logo.svg"]
    }));
    let graph = ChunkGraph::new([
      importing(entry("inject.8f2a.js", "inject"), &["vendor.js"]),
      shared("vendor.js"),
    ]);

    let result = project.build(options, &graph);
    assert_eq!(
      resources(&result),
      ["inject.8f2a.js", "logo.svg", "vendor.js"]
    );
  }

  #[test]
  fn no_resources_stays_absent() {
    let project = Project::with_files(&["a.ts"]);
    let options = options(json!({
      "manifest_version": 2,
      "content_scripts": [{ "matches": ["<all_urls>"], "js": ["a.ts"] }]
    }));
    let graph = ChunkGraph::new([entry("a.js", "a")]);

    let result = project.build(options, &graph);
    assert!(
      result
        .manifest
        .as_v2()
        .unwrap()
        .web_accessible_resources
        .is_none()
    );
  }

  #[test]
  fn watch_mode_leaves_manifest_untouched() {
    let project = Project::with_files(&[]);
    let mut options = options(json!({
      "manifest_version": 2,
      "web_accessible_resources": ["icons/*.png"]
    }));
    options.watch = true;

    let result = project.build(options.clone(), &ChunkGraph::default());
    assert_eq!(result.manifest, options.manifest);
  }
}
