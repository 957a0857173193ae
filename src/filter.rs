//! Include/exclude predicate deciding which web-accessible files are compiled and walked.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::{FilterPattern, WebAccessibleScriptsOptions};
use crate::error::{ManifestError, ManifestResult};

const DEFAULT_INCLUDE: &str = r"\.([cem]?js|ts)$";

fn default_include() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(DEFAULT_INCLUDE).expect("invalid default include regex"))
}

#[derive(Debug, Clone)]
enum Rule {
    Regex(Regex),
    Glob(glob::Pattern),
}

impl Rule {
    /// `/expr/` is read as a regular expression, anything else as a glob.
    fn parse(pattern: &str) -> ManifestResult<Self> {
        let invalid = |message: String| ManifestError::InvalidFilterPattern {
            pattern: pattern.to_string(),
            message,
        };

        if pattern.len() > 1 && pattern.starts_with('/') && pattern.ends_with('/') {
            let expr = &pattern[1..pattern.len() - 1];
            return Regex::new(expr)
                .map(Rule::Regex)
                .map_err(|err| invalid(err.to_string()));
        }

        glob::Pattern::new(pattern)
            .map(Rule::Glob)
            .map_err(|err| invalid(err.to_string()))
    }

    fn matches(&self, candidate: &str) -> bool {
        match self {
            Rule::Regex(regex) => regex.is_match(candidate),
            Rule::Glob(pattern) => pattern.matches(candidate),
        }
    }
}

/// Decides which resolvable files are eligible for compilation and dependency walks.
///
/// Files rejected here are treated like glob entries: opaque, never walked.
#[derive(Debug, Clone)]
pub struct ScriptFilter {
    include: Vec<Rule>,
    exclude: Vec<Rule>,
}

impl Default for ScriptFilter {
    fn default() -> Self {
        Self {
            include: vec![Rule::Regex(default_include().clone())],
            exclude: Vec::new(),
        }
    }
}

impl ScriptFilter {
    /// Build the filter from plugin options, falling back to the default script extensions.
    pub fn new(options: &WebAccessibleScriptsOptions) -> ManifestResult<Self> {
        let include = match &options.include {
            Some(pattern) => compile_rules(pattern)?,
            None => vec![Rule::Regex(default_include().clone())],
        };
        let exclude = match &options.exclude {
            Some(pattern) => compile_rules(pattern)?,
            None => Vec::new(),
        };

        Ok(Self { include, exclude })
    }

    /// Returns `true` when the file should be compiled and walked.
    pub fn is_match(&self, path: &str) -> bool {
        let candidate = path.replace('\\', "/");
        if self.exclude.iter().any(|rule| rule.matches(&candidate)) {
            return false;
        }

        self.include.is_empty() || self.include.iter().any(|rule| rule.matches(&candidate))
    }
}

fn compile_rules(pattern: &FilterPattern) -> ManifestResult<Vec<Rule>> {
    pattern
        .patterns()
        .filter(|value| !value.trim().is_empty())
        .map(Rule::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(include: Option<FilterPattern>, exclude: Option<FilterPattern>) -> WebAccessibleScriptsOptions {
        WebAccessibleScriptsOptions { include, exclude }
    }

    #[test]
    fn default_matches_script_extensions() {
        let filter = ScriptFilter::default();
        for name in ["a.js", "b.mjs", "c.cjs", "src/d.ts", "C:\\ext\\e.js"] {
            assert!(filter.is_match(name), "{name} should match");
        }
        for name in ["a.css", "b.html", "c.tsx", "icons/logo.png"] {
            assert!(!filter.is_match(name), "{name} should not match");
        }
    }

    #[test]
    fn exclude_wins_over_include() {
        let filter = ScriptFilter::new(&options(
            None,
            Some(FilterPattern::One("vendor/**".into())),
        ))
        .unwrap();

        assert!(filter.is_match("src/inject.js"));
        assert!(!filter.is_match("vendor/lib/inject.js"));
    }

    #[test]
    fn custom_include_replaces_default() {
        let filter = ScriptFilter::new(&options(
            Some(FilterPattern::Many(vec!["/\\.jsx$/".into(), "*.tsx".into()])),
            None,
        ))
        .unwrap();

        assert!(filter.is_match("src/page.jsx"));
        assert!(filter.is_match("src/page.tsx"));
        assert!(!filter.is_match("src/page.js"));
    }

    #[test]
    fn rejects_invalid_patterns() {
        let err = ScriptFilter::new(&options(Some(FilterPattern::One("/(/".into())), None))
            .unwrap_err();
        assert!(matches!(err, ManifestError::InvalidFilterPattern { .. }));
    }
}
