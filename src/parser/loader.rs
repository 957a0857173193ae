//! Loader modules emitted in place of content-hashed chunk names.

use crate::error::ManifestResult;
use crate::models::EmitFile;

/// File name of the emitted service worker loader.
pub const SERVICE_WORKER_LOADER_FILE: &str = "serviceWorker.js";

/// Module whose only job is importing the compiled service worker chunk.
///
/// The manifest points at this stable name while the real chunk keeps its bundler-chosen,
/// content-hashed name.
pub fn service_worker_loader(chunk_file_name: &str) -> ManifestResult<EmitFile> {
  let chunk_file_name = chunk_file_name.trim_start_matches('/');
  let file_name = if chunk_file_name == SERVICE_WORKER_LOADER_FILE {
    "serviceWorker.loader.js".to_string()
  } else {
    SERVICE_WORKER_LOADER_FILE.to_string()
  };

  let specifier = serde_json::to_string(&format!("/{chunk_file_name}"))?;
  Ok(EmitFile {
    file_name,
    source: format!("import {specifier};\n"),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn imports_the_compiled_chunk() {
    let loader = service_worker_loader("assets/sw.ABC123.js").unwrap();
    assert_eq!(loader.file_name, SERVICE_WORKER_LOADER_FILE);
    assert_eq!(loader.source, "import \"/assets/sw.ABC123.js\";\n");
  }

  #[test]
  fn avoids_overwriting_a_chunk_with_the_loader_name() {
    let loader = service_worker_loader("serviceWorker.js").unwrap();
    assert_ne!(loader.file_name, "serviceWorker.js");
    assert!(loader.source.contains("/serviceWorker.js"));
  }
}
