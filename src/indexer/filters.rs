//! Include/exclude glob filtering for walked paths
//!
//! Patterns are matched against paths relative to the indexed root. A leading
//! `**/` matches zero or more components, so `**/target/**` excludes both a
//! top-level and a nested `target` directory.

use crate::error::{ConfigError, ScoutError};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Precompiled include/exclude matchers
#[derive(Debug)]
pub struct PathFilters {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl PathFilters {
    /// Compile pattern lists; an invalid glob is a configuration error.
    pub fn build(
        include_patterns: &[String],
        exclude_patterns: &[String],
    ) -> Result<Self, ScoutError> {
        let include = if include_patterns.is_empty() {
            None
        } else {
            Some(compile(include_patterns)?)
        };
        let exclude = compile(exclude_patterns)?;

        Ok(Self { include, exclude })
    }

    /// Check whether a root-relative path passes the filters.
    ///
    /// With no include patterns everything is included; exclude patterns
    /// always win.
    pub fn allows(&self, relative_path: &str) -> bool {
        if let Some(include) = &self.include
            && !include.is_match(relative_path)
        {
            return false;
        }

        !self.exclude.is_match(relative_path)
    }
}

fn compile(patterns: &[String]) -> Result<GlobSet, ScoutError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidValue {
            key: "patterns".to_string(),
            reason: format!("invalid glob '{}': {}", pattern, e),
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| {
            ConfigError::InvalidValue {
                key: "patterns".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
}
