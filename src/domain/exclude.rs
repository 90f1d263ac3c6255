//! Build exclusion patterns with gitignore semantics.
//!
//! Patterns come from the deployment configuration (`common.build.
//! exclude_patterns`) and are matched against *source* paths before copy, so
//! excluded content never reaches the staging tree.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::domain::error::AssemblyError;

/// Compiled exclusion matcher.
#[derive(Debug)]
pub struct ExcludePatterns {
    matcher: Gitignore,
    pattern_count: usize,
}

impl ExcludePatterns {
    /// Create an empty pattern set (excludes nothing).
    #[must_use]
    pub fn empty() -> Self {
        #[allow(clippy::expect_used)] // an empty matcher always builds
        let matcher = GitignoreBuilder::new("")
            .build()
            .expect("empty gitignore should always build");
        Self {
            matcher,
            pattern_count: 0,
        }
    }

    /// Compile configured patterns into a matcher.
    ///
    /// # Errors
    ///
    /// Returns `AssemblyError::InvalidPattern` for a pattern with invalid
    /// glob syntax.
    pub fn compile(patterns: &[String]) -> Result<Self, AssemblyError> {
        let mut builder = GitignoreBuilder::new("");
        let mut pattern_count = 0;
        for pattern in patterns {
            let trimmed = pattern.trim();
            if trimmed.is_empty() {
                continue;
            }
            pattern_count += 1;
            builder
                .add_line(None, trimmed)
                .map_err(|e| AssemblyError::InvalidPattern {
                    pattern: trimmed.to_string(),
                    detail: e.to_string(),
                })?;
        }
        let matcher = builder
            .build()
            .map_err(|e| AssemblyError::InvalidPattern {
                pattern: patterns.join(", "),
                detail: e.to_string(),
            })?;
        Ok(Self {
            matcher,
            pattern_count,
        })
    }

    /// Check whether a source path (relative to the copy root) is excluded.
    ///
    /// `is_dir` should be true if the path is a directory.
    #[must_use]
    pub fn is_excluded(&self, rel_path: &Path, is_dir: bool) -> bool {
        self.matcher
            .matched_path_or_any_parents(rel_path, is_dir)
            .is_ignore()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pattern_count == 0
    }
}
