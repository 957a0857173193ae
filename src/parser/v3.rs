//! Manifest V3 adapter.
//!
//! V3 scopes exposed files to origins through structured `web_accessible_resources` records.
//! Dependencies of a content script are exposed to the origins the script runs on, and
//! dependencies of a web-accessible script inherit the scope of the record declaring it. The
//! background service worker is replaced by a loader module with a stable name.

use std::sync::OnceLock;

use regex::Regex;

use crate::bundle::ChunkGraph;
use crate::config::PluginOptions;
use crate::dev::{DevBuilder, DevBuilderV3};
use crate::error::{ManifestError, ManifestResult};
use crate::models::{
  ExtraFields, Manifest, ManifestV3, ManifestVersion, ParseResult, WebAccessibleResourceV3,
};
use crate::parser::context::{HtmlPages, push_unique};
use crate::parser::loader::service_worker_loader;
use crate::parser::{FileReference, InputStep, ManifestSchema, OutputStep, ParseContext, Stage};
use crate::paths::is_single_html_filename;

const SERVICE_WORKER_FIELD: &str = "background.service_worker";

fn path_separator() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"[^:/]/").expect("invalid match pattern regex"))
}

/// Widen a content-script match pattern to the whole origin it targets.
///
/// Web-accessible resource records only accept origin-level patterns, so
/// `https://example.com/path/*` becomes `https://example.com/*`. Patterns that already cover a
/// whole origin, and patterns without a path such as `<all_urls>`, are returned unchanged.
pub fn generalize_match_pattern(pattern: &str) -> String {
  let Some(found) = path_separator().find(pattern) else {
    return pattern.to_string();
  };

  let slash = found.end() - 1;
  match &pattern[slash..] {
    "/" | "/*" => pattern.to_string(),
    _ => format!("{}/*", &pattern[..slash]),
  }
}

/// Behaviour of `manifest_version: 3` builds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestV3Schema;

impl ManifestSchema for ManifestV3Schema {
  fn manifest_version(&self) -> ManifestVersion {
    ManifestVersion::V3
  }

  fn html_file_names(&self, manifest: &Manifest, options: &PluginOptions) -> Vec<FileReference> {
    let Some(manifest) = manifest.as_v3() else {
      return Vec::new();
    };

    let mut pages = HtmlPages::default();
    pages.push(
      "action.default_popup",
      manifest
        .action
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

    for (record_index, record) in manifest.web_accessible_resources.iter().flatten().enumerate() {
      for (index, resource) in record.resources.iter().enumerate() {
        if is_single_html_filename(resource) {
          pages.push(
            format!("web_accessible_resources[{record_index}].resources[{index}]"),
            Some(resource),
          );
        }
      }
    }

    pages.into_inner()
  }

  fn parse_input_methods(&self) -> Vec<Stage<InputStep>> {
    vec![
      Stage::new(
        "background_service_worker",
        parse_input_background_service_worker as InputStep,
      ),
      Stage::new(
        "web_accessible_scripts",
        parse_input_web_accessible_scripts as InputStep,
      ),
    ]
  }

  fn parse_output_methods(&self) -> Vec<Stage<OutputStep>> {
    vec![Stage::new(
      "service_worker",
      parse_output_service_worker as OutputStep,
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
      .as_v3()
      .into_iter()
      .flat_map(|manifest| manifest.web_accessible_resources.iter().flatten())
      .flat_map(|record| record.resources.iter().cloned())
      .collect()
  }

  fn create_dev_builder(&self) -> Box<dyn DevBuilder> {
    Box::new(DevBuilderV3::default())
  }
}

fn manifest_v3(manifest: &mut Manifest) -> ManifestResult<&mut ManifestV3> {
  match manifest {
    Manifest::V3(manifest) => Ok(manifest),
    Manifest::V2(_) => Err(ManifestError::SchemaMismatch {
      expected: ManifestVersion::V3,
      found: ManifestVersion::V2,
    }),
  }
}

fn service_worker(manifest: &ManifestV3) -> Option<String> {
  manifest
    .background
    .as_ref()
    .and_then(|background| background.service_worker.clone())
}

/// Append `records`, dropping resources an existing record with the same scope already exposes.
fn push_records(manifest: &mut ManifestV3, records: Vec<WebAccessibleResourceV3>) {
  for mut record in records {
    let covered: Vec<&String> = manifest
      .web_accessible_resources
      .iter()
      .flatten()
      .filter(|existing| existing.same_scope(&record))
      .flat_map(|existing| existing.resources.iter())
      .collect();
    record
      .resources
      .retain(|resource| !covered.contains(&resource));

    if record.resources.is_empty() {
      continue;
    }
    manifest
      .web_accessible_resources
      .get_or_insert_with(Vec::new)
      .push(record);
  }
}

fn parse_input_background_service_worker(
  context: &ParseContext<'_>,
  mut result: ParseResult,
) -> ManifestResult<ParseResult> {
  let Some(service_worker) = service_worker(manifest_v3(&mut result.manifest)?) else {
    return Ok(result);
  };

  context.register_input(&mut result, SERVICE_WORKER_FIELD, &service_worker)?;
  if let Some(background) = manifest_v3(&mut result.manifest)?.background.as_mut() {
    background.worker_type = Some("module".to_string());
  }
  Ok(result)
}

fn parse_input_web_accessible_scripts(
  context: &ParseContext<'_>,
  mut result: ParseResult,
) -> ManifestResult<ParseResult> {
  let records = manifest_v3(&mut result.manifest)?
    .web_accessible_resources
    .clone()
    .unwrap_or_default();

  for (record_index, record) in records.iter().enumerate() {
    for (index, resource) in record.resources.iter().enumerate() {
      if context.is_walkable(resource) {
        context.register_input(
          &mut result,
          &format!("web_accessible_resources[{record_index}].resources[{index}]"),
          resource,
        )?;
      }
    }
  }

  Ok(result)
}

/// Point `background.service_worker` at an emitted loader importing the compiled worker.
fn parse_output_service_worker(
  _context: &ParseContext<'_>,
  mut result: ParseResult,
  graph: &ChunkGraph,
) -> ManifestResult<ParseResult> {
  let Some(service_worker) = service_worker(manifest_v3(&mut result.manifest)?) else {
    return Ok(result);
  };
  if result.emitted(&service_worker).is_some() {
    tracing::trace!(%service_worker, "service worker already points at the emitted loader");
    return Ok(result);
  }

  let chunk = graph
    .find_for_reference(&service_worker)
    .ok_or_else(|| ManifestError::build_consistency(SERVICE_WORKER_FIELD, &service_worker))?;
  let loader = service_worker_loader(&chunk.file_name)?;
  tracing::debug!(chunk = %chunk.file_name, loader = %loader.file_name, "emitting service worker loader");

  if let Some(background) = manifest_v3(&mut result.manifest)?.background.as_mut() {
    background.service_worker = Some(loader.file_name.clone());
  }
  result.emit_asset(loader);
  Ok(result)
}

fn parse_output_content_scripts(
  context: &ParseContext<'_>,
  mut result: ParseResult,
  graph: &ChunkGraph,
) -> ManifestResult<ParseResult> {
  let exposures = context.rewrite_content_scripts(&mut result, graph)?;
  let use_dynamic_url = context
    .options()
    .use_dynamic_url_content_scripts
    .then_some(true);

  let records = exposures
    .into_iter()
    .filter(|exposure| !exposure.files.is_empty())
    .map(|exposure| {
      let mut matches = Vec::new();
      push_unique(
        &mut matches,
        exposure
          .matches
          .iter()
          .map(|pattern| generalize_match_pattern(pattern)),
      );
      WebAccessibleResourceV3 {
        resources: exposure.files.into_iter().collect(),
        matches: Some(matches),
        extension_ids: None,
        use_dynamic_url,
        extra: ExtraFields::new(),
      }
    })
    .collect();

  push_records(manifest_v3(&mut result.manifest)?, records);
  Ok(result)
}

fn parse_output_web_accessible_scripts(
  context: &ParseContext<'_>,
  mut result: ParseResult,
  graph: &ChunkGraph,
) -> ManifestResult<ParseResult> {
  let Some(mut records) = manifest_v3(&mut result.manifest)?
    .web_accessible_resources
    .clone()
  else {
    return Ok(result);
  };

  let mut appended = Vec::new();
  for (record_index, record) in records.iter_mut().enumerate() {
    for (index, resource) in record.resources.iter_mut().enumerate() {
      if !context.is_output_walkable(&result, resource, graph) {
        continue;
      }

      let field = format!("web_accessible_resources[{record_index}].resources[{index}]");
      let parsed = context.parse_output_web_accessible_script(&field, resource, graph)?;
      *resource = parsed.file_name;
      if parsed.exposure.is_empty() {
        continue;
      }

      appended.push(WebAccessibleResourceV3 {
        resources: parsed.exposure.files.into_iter().collect(),
        matches: record.matches.clone(),
        extension_ids: record.extension_ids.clone(),
        use_dynamic_url: record.use_dynamic_url,
        extra: ExtraFields::new(),
      });
    }
  }

  let manifest = manifest_v3(&mut result.manifest)?;
  manifest.web_accessible_resources = Some(records);
  push_records(manifest, appended);
  Ok(result)
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::parser::fixtures::{Project, entry, importing, options, shared, strings};
  use crate::parser::loader::SERVICE_WORKER_LOADER_FILE;

  fn records(result: &ParseResult) -> Vec<WebAccessibleResourceV3> {
    result
      .manifest
      .as_v3()
      .and_then(|manifest| manifest.web_accessible_resources.clone())
      .unwrap_or_default()
  }

  #[test]
  fn generalizes_paths_to_origin_wildcards() {
    let cases = [
      ("https://example.com/path/*", "https://example.com/*"),
      ("https://example.com/a/b.html", "https://example.com/*"),
      ("https://example.com/*", "https://example.com/*"),
      ("https://example.com/", "https://example.com/"),
      ("*://*/*", "*://*/*"),
      ("*://*.example.com/deep/*", "*://*.example.com/*"),
      ("<all_urls>", "<all_urls>"),
    ];
    for (pattern, expected) in cases {
      assert_eq!(generalize_match_pattern(pattern), expected, "{pattern}");
    }
  }

  #[test]
  fn content_script_dependencies_are_scoped_to_their_origins() {
    let project = Project::with_files(&["content.ts"]);
    let options = options(json!({
      "manifest_version": 3,
      "content_scripts": [{
        "matches": ["https://example.com/app/*", "https://example.com/other/*"],
        "js": ["content.ts"]
      }]
    }));
    let graph = ChunkGraph::new([
      importing(entry("content.js", "content"), &["chunk-a.js"]),
      importing(shared("chunk-a.js"), &["chunk-b.js"]),
      shared("chunk-b.js"),
    ]);

    let result = project.build(options, &graph);
    let records = records(&result);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].resources, ["chunk-a.js", "chunk-b.js"]);
    assert_eq!(records[0].matches, Some(strings(&["https://example.com/*"])));
    assert_eq!(records[0].use_dynamic_url, Some(true));
  }

  #[test]
  fn dynamic_url_flag_follows_options() {
    let project = Project::with_files(&["content.ts"]);
    let mut options = options(json!({
      "manifest_version": 3,
      "content_scripts": [{ "matches": ["<all_urls>"], "js": ["content.ts"] }]
    }));
    options.use_dynamic_url_content_scripts = false;
    let graph = ChunkGraph::new([
      importing(entry("content.js", "content"), &["dep.js"]),
      shared("dep.js"),
    ]);

    let result = project.build(options, &graph);
    let records = records(&result);
    assert_eq!(records[0].use_dynamic_url, None);
    assert_eq!(records[0].matches, Some(strings(&["<all_urls>"])));
  }

  #[test]
  fn content_script_without_dependencies_adds_no_record() {
    let project = Project::with_files(&["content.ts"]);
    let options = options(json!({
      "manifest_version": 3,
      "content_scripts": [{ "matches": ["<all_urls>"], "js": ["content.ts"] }]
    }));
    let graph = ChunkGraph::new([entry("content.js", "content")]);

    let result = project.build(options, &graph);
    assert!(
      result
        .manifest
        .as_v3()
        .unwrap()
        .web_accessible_resources
        .is_none()
    );
  }

  #[test]
  fn service_worker_is_replaced_by_loader() {
    let project = Project::with_files(&["src/background.ts"]);
    let options = options(json!({
      "manifest_version": 3,
      "background": { "service_worker": "src/background.ts" }
    }));
    let parser = project.parser(options);

    let input = parser.parse_input().unwrap();
    assert_eq!(input.input_scripts[0].output_name, "src/background");
    let background = input.manifest.as_v3().unwrap().background.clone().unwrap();
    assert_eq!(background.worker_type.as_deref(), Some("module"));

    let graph = ChunkGraph::new([entry("assets/background.3f9c.js", "src/background")]);
    let output = parser.rewrite_output(input, &graph).unwrap();
    let background = output.manifest.as_v3().unwrap().background.clone().unwrap();
    assert_eq!(
      background.service_worker.as_deref(),
      Some(SERVICE_WORKER_LOADER_FILE)
    );
    assert_eq!(output.emit_files.len(), 1);
    assert_eq!(
      output.emit_files[0].source,
      "import \"/assets/background.3f9c.js\";\n"
    );

    let again = parser.rewrite_output(output.clone(), &graph).unwrap();
    assert_eq!(again, output);
  }

  #[test]
  fn missing_service_worker_chunk_is_a_build_error() {
    let project = Project::with_files(&["sw.ts"]);
    let options = options(json!({
      "manifest_version": 3,
      "background": { "service_worker": "sw.ts" }
    }));
    let parser = project.parser(options);
    let input = parser.parse_input().unwrap();

    let err = parser
      .rewrite_output(input, &ChunkGraph::default())
      .unwrap_err();
    assert!(matches!(
      err,
      ManifestError::BuildConsistency { ref field, .. } if field == SERVICE_WORKER_FIELD
    ));
  }

  #[test]
  fn web_accessible_script_dependencies_inherit_record_scope() {
    let project = Project::with_files(&["inject.ts"]);
    let options = options(json!({
      "manifest_version": 3,
      "web_accessible_resources": [{
        "resources": ["inject.ts", "images/*.png"],
        "matches": ["https://example.com/*"],
        "extension_ids": ["abcdef"]
      }]
    }));
    let graph = ChunkGraph::new([
      importing(entry("inject.91ab.js", "inject"), &["vendor.js"]),
      shared("vendor.js"),
    ]);

    let result = project.build(options, &graph);
    let records = records(&result);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].resources, ["inject.91ab.js", "images/*.png"]);
    assert_eq!(records[1].resources, ["vendor.js"]);
    assert_eq!(records[1].matches, records[0].matches);
    assert_eq!(records[1].extension_ids, Some(strings(&["abcdef"])));
  }

  #[test]
  fn appended_records_skip_resources_already_exposed() {
    let mut manifest = ManifestV3 {
      manifest_version: 3,
      web_accessible_resources: Some(vec![WebAccessibleResourceV3 {
        resources: strings(&["a.js"]),
        matches: Some(strings(&["<all_urls>"])),
        ..WebAccessibleResourceV3::default()
      }]),
      ..ManifestV3::default()
    };

    push_records(
      &mut manifest,
      vec![
        WebAccessibleResourceV3 {
          resources: strings(&["a.js", "b.js"]),
          matches: Some(strings(&["<all_urls>"])),
          ..WebAccessibleResourceV3::default()
        },
        WebAccessibleResourceV3 {
          resources: strings(&["a.js"]),
          matches: Some(strings(&["<all_urls>"])),
          ..WebAccessibleResourceV3::default()
        },
      ],
    );

    let records = manifest.web_accessible_resources.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].resources, ["b.js"]);
  }
}
