//! Glob sets compiled into path predicates
//!
//! Paths are repository-relative and `/`-separated. `*` crosses directory
//! separators, so `*.ts`, `**.ts` and `**/*.ts` all select every `.ts` file.

use glob::{MatchOptions, Pattern};
use rustc_hash::FxHashMap;

use crate::error::{MetricsError, Result};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A compiled glob set; a path matches when any glob matches it
#[derive(Debug, Clone, Default)]
pub struct GlobMatcher {
    globs: Vec<String>,
    patterns: Vec<Pattern>,
}

impl GlobMatcher {
    pub fn compile<S: AsRef<str>>(globs: &[S]) -> Result<Self> {
        GlobCache::new().compile(globs)
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(path, MATCH_OPTIONS))
    }

    /// The globs as written in the configuration
    pub fn globs(&self) -> &[String] {
        &self.globs
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Merge several sets into one that matches whatever any of them matches
    pub fn union<'a>(matchers: impl IntoIterator<Item = &'a GlobMatcher>) -> Self {
        let mut merged = GlobMatcher::default();
        for matcher in matchers {
            for (glob, pattern) in matcher.globs.iter().zip(&matcher.patterns) {
                if !merged.globs.contains(glob) {
                    merged.globs.push(glob.clone());
                    merged.patterns.push(pattern.clone());
                }
            }
        }
        merged
    }
}

/// Memoizes compiled patterns by glob string
#[derive(Default)]
pub struct GlobCache {
    compiled: FxHashMap<String, Pattern>,
}

impl GlobCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile<S: AsRef<str>>(&mut self, globs: &[S]) -> Result<GlobMatcher> {
        let mut matcher = GlobMatcher::default();
        for glob in globs {
            let glob = glob.as_ref();
            let pattern = match self.compiled.get(glob) {
                Some(pattern) => pattern.clone(),
                None => {
                    let pattern = Pattern::new(&normalize(glob)).map_err(|e| {
                        MetricsError::config(format!("invalid glob '{}': {}", glob, e))
                    })?;
                    self.compiled.insert(glob.to_string(), pattern.clone());
                    pattern
                }
            };
            matcher.globs.push(glob.to_string());
            matcher.patterns.push(pattern);
        }
        Ok(matcher)
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

/// Collapse star runs that do not form a whole path component into `*`.
///
/// The glob crate only accepts `**` as a complete component; anything else
/// (`**.ts`, `a**`, `***`) means "any characters" here.
fn normalize(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len());
    let mut in_class = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_class {
            in_class = c != ']';
            out.push(c);
            i += 1;
            continue;
        }
        match c {
            '[' => {
                in_class = true;
                out.push(c);
                // A leading `]` or `!]` is literal inside a class
                if let Some(&next) = chars.get(i + 1) {
                    if next == ']' || next == '!' {
                        out.push(next);
                        i += 1;
                    }
                }
                i += 1;
            }
            '*' => {
                let start = i;
                while i < chars.len() && chars[i] == '*' {
                    i += 1;
                }
                let run = i - start;
                let at_component_start = start == 0 || chars[start - 1] == '/';
                let at_component_end = i == chars.len() || chars[i] == '/';
                if run == 2 && at_component_start && at_component_end {
                    out.push_str("**");
                } else {
                    out.push('*');
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}
