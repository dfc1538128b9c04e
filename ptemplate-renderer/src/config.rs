//! Render configuration.
//!
//! [`RenderConfig`] is an immutable value built once and passed to every
//! render call; there is no process-wide default to mutate. The
//! serializable part of it, [`RenderOptions`], can be loaded from YAML or
//! JSON and applied over the defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::filters::FilterRegistry;

pub const DEFAULT_LDELIM: &str = "[[";
pub const DEFAULT_RDELIM: &str = "]]";
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// How `data-if` conditions are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionMode {
    /// The condition is a single field name tested for truthiness.
    #[default]
    LookupOnly,
    /// The condition is a sandboxed boolean expression.
    Trusted,
}

// ---------------------------------------------------------------------------
// RenderOptions
// ---------------------------------------------------------------------------

/// Serializable render options. Absent fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct RenderOptions {
    pub ldelim: Option<String>,
    pub rdelim: Option<String>,
    pub debug: Option<bool>,
    pub trusted: Option<bool>,
    pub in_place: Option<bool>,
    pub max_depth: Option<usize>,
}

impl RenderOptions {
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load options from a file; `.json` is read as JSON, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        }
    }

    /// Options set in `other` win over options set in `self`.
    pub fn merge(self, other: RenderOptions) -> RenderOptions {
        RenderOptions {
            ldelim: other.ldelim.or(self.ldelim),
            rdelim: other.rdelim.or(self.rdelim),
            debug: other.debug.or(self.debug),
            trusted: other.trusted.or(self.trusted),
            in_place: other.in_place.or(self.in_place),
            max_depth: other.max_depth.or(self.max_depth),
        }
    }
}

// ---------------------------------------------------------------------------
// RenderConfig
// ---------------------------------------------------------------------------

/// Everything a render call needs besides the tree and the data.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub ldelim: String,
    pub rdelim: String,
    /// Route issues to the diagnostic sink.
    pub debug: bool,
    pub mode: ConditionMode,
    /// Mutate the caller's node instead of rendering a clone.
    pub in_place: bool,
    /// Deepest allowed repeat nesting below the top-level call.
    pub max_depth: usize,
    pub filters: FilterRegistry,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            ldelim: DEFAULT_LDELIM.to_string(),
            rdelim: DEFAULT_RDELIM.to_string(),
            debug: false,
            mode: ConditionMode::default(),
            in_place: false,
            max_depth: DEFAULT_MAX_DEPTH,
            filters: FilterRegistry::with_builtins(),
        }
    }
}

impl RenderConfig {
    /// Build a config from options over the defaults.
    pub fn from_options(options: &RenderOptions) -> Result<Self, ConfigError> {
        RenderConfig::default().apply(options)
    }

    /// Apply the options that are set, then validate.
    pub fn apply(mut self, options: &RenderOptions) -> Result<Self, ConfigError> {
        if let Some(l) = &options.ldelim {
            self.ldelim = l.clone();
        }
        if let Some(r) = &options.rdelim {
            self.rdelim = r.clone();
        }
        if let Some(debug) = options.debug {
            self.debug = debug;
        }
        if let Some(trusted) = options.trusted {
            self.mode = if trusted {
                ConditionMode::Trusted
            } else {
                ConditionMode::LookupOnly
            };
        }
        if let Some(in_place) = options.in_place {
            self.in_place = in_place;
        }
        if let Some(depth) = options.max_depth {
            self.max_depth = depth;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ldelim.is_empty() {
            return Err(ConfigError::EmptyDelimiter { which: "left" });
        }
        if self.rdelim.is_empty() {
            return Err(ConfigError::EmptyDelimiter { which: "right" });
        }
        Ok(())
    }

    pub fn with_delimiters(mut self, ldelim: impl Into<String>, rdelim: impl Into<String>) -> Self {
        self.ldelim = ldelim.into();
        self.rdelim = rdelim.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_mode(mut self, mode: ConditionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn trusted(self) -> Self {
        self.with_mode(ConditionMode::Trusted)
    }

    pub fn with_in_place(mut self, in_place: bool) -> Self {
        self.in_place = in_place;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Register an extra filter; it overrides a built-in of the same name.
    pub fn with_filter<F>(mut self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.filters.insert(name, filter);
        self
    }

    /// Merge a set of extra filters over the current registry.
    pub fn with_filters(mut self, extra: FilterRegistry) -> Self {
        self.filters.extend(extra);
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
