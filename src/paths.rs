//! Mapping manifest references onto bundler inputs and outputs.

use std::fmt;
use std::path::{Path, PathBuf};

/// Path-resolution collaborator consumed by the manifest pipeline.
///
/// Implementations map a manifest-relative reference to the absolute file the bundler should
/// compile, and derive the stable output name the bundler registers the compiled entry under.
pub trait PathResolver: fmt::Debug + Send + Sync {
    /// Absolute input path for a manifest-relative reference.
    fn input_path(&self, reference: &str) -> PathBuf;

    /// Deterministic output name for a reference.
    fn output_name(&self, reference: &str) -> String {
        output_file_name(reference)
    }

    /// Whether the resolved input exists.
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Resolves references against a project root on the local filesystem.
#[derive(Debug, Clone)]
pub struct ProjectRoot {
    root: PathBuf,
}

impl ProjectRoot {
    /// Create a resolver rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory references are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PathResolver for ProjectRoot {
    fn input_path(&self, reference: &str) -> PathBuf {
        self.root.join(normalize_reference(reference))
    }
}

/// Normalise a manifest reference: forward slashes, no leading `./` or `/`.
pub fn normalize_reference(reference: &str) -> String {
    let mut value = reference.replace('\\', "/");
    while let Some(stripped) = value.strip_prefix("./") {
        value = stripped.to_string();
    }
    value.trim_start_matches('/').to_string()
}

/// Output name for a reference: the normalised reference without its extension.
///
/// `./src/content.ts` and `src/content.ts` both map to `src/content`, so re-running the input
/// phase always registers the same name.
pub fn output_file_name(reference: &str) -> String {
    let normalized = normalize_reference(reference);
    let file_start = normalized.rfind('/').map_or(0, |index| index + 1);
    match normalized[file_start..].rfind('.') {
        Some(dot) if dot > 0 => normalized[..file_start + dot].to_string(),
        _ => normalized,
    }
}

/// Whether a reference names exactly one HTML file (no wildcard).
pub fn is_single_html_filename(reference: &str) -> bool {
    reference.ends_with(".html") && !reference.contains('*')
}

/// Whether a reference is a glob pattern that must pass through untouched.
pub fn is_glob(reference: &str) -> bool {
    reference.contains('*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_extension_and_leading_segments() {
        assert_eq!(output_file_name("./src/content.ts"), "src/content");
        assert_eq!(output_file_name("/popup.html"), "popup");
        assert_eq!(output_file_name("src\\nested\\worker.mjs"), "src/nested/worker");
    }

    #[test]
    fn keeps_names_without_extension() {
        assert_eq!(output_file_name("scripts/loader"), "scripts/loader");
        assert_eq!(output_file_name("dir.v2/.hidden"), "dir.v2/.hidden");
    }

    #[test]
    fn project_root_joins_normalised_reference() {
        let resolver = ProjectRoot::new("/project");
        assert_eq!(
            resolver.input_path("./src/content.ts"),
            PathBuf::from("/project/src/content.ts")
        );
        assert_eq!(resolver.output_name("src/content.ts"), "src/content");
    }

    #[test]
    fn detects_single_html_files() {
        assert!(is_single_html_filename("pages/panel.html"));
        assert!(!is_single_html_filename("pages/*.html"));
        assert!(!is_single_html_filename("pages/panel.js"));
    }
}
