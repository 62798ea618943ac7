// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for errmap.
//!
//! [`ErrmapConfig`] holds trace options and declarative class definitions.
//! [`build_registry`] turns a validated config into live [`ErrorClass`]es.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use errmap_core::{ErrorClass, ErrorMap, ErrorName, NameError};
use errmap_stack::{CaptureMode, StackOptions};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading, validation or
/// registry construction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },

    /// A class name was rejected while building the registry.
    #[error("invalid class name: {0}")]
    InvalidName(#[from] NameError),
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent building the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A class declares no error codes of its own.
    EmptyErrorMap {
        /// Class name.
        class: String,
    },
    /// A class redefines a code one of its ancestors already defines.
    ShadowedCode {
        /// Class name.
        class: String,
        /// The shadowed code.
        code: String,
        /// Nearest ancestor defining the code.
        parent: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::EmptyErrorMap { class } => {
                write!(f, "class '{class}' declares no error codes")
            }
            ConfigWarning::ShadowedCode {
                class,
                code,
                parent,
            } => write!(f, "class '{class}' shadows code '{code}' of '{parent}'"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level errmap configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ErrmapConfig {
    /// Trace capture and cleaning.
    #[serde(default)]
    pub stack: StackSection,

    /// Declarative class definitions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<ClassEntry>,
}

/// The `[stack]` table. Unset fields fall back to [`StackOptions`] defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct StackSection {
    /// `"force"`, `"env"` or `"off"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureMode>,

    /// Replace the home directory with `~` in frame locations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretty: Option<bool>,

    /// Path prefix stripped from frame locations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,

    /// Extra symbol prefixes whose frames are dropped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden: Vec<String>,
}

impl StackSection {
    /// Resolve into concrete options.
    pub fn to_options(&self) -> StackOptions {
        let defaults = StackOptions::default();
        StackOptions {
            capture: self.capture.unwrap_or(defaults.capture),
            pretty: self.pretty.unwrap_or(defaults.pretty),
            base_path: self.base_path.clone(),
            hidden: self.hidden.clone(),
        }
    }
}

/// One `[[classes]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ClassEntry {
    /// Class name. Any value is accepted here; validation rejects
    /// non-strings and names breaking the naming rules.
    pub name: serde_json::Value,

    /// Name of another class in the same config to extend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Code → details template.
    #[serde(default)]
    #[schemars(with = "BTreeMap<String, serde_json::Value>")]
    pub errors: ErrorMap,
}

impl ClassEntry {
    /// Entry with a string name.
    pub fn new(name: impl Into<String>, errors: ErrorMap) -> Self {
        Self {
            name: serde_json::Value::String(name.into()),
            extends: None,
            errors,
        }
    }

    /// Set the parent class.
    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    /// The name when it is a string.
    pub fn name_str(&self) -> Option<&str> {
        self.name.as_str()
    }
}

/// JSON schema of the config file.
pub fn config_schema() -> schemars::Schema {
    schemars::schema_for!(ErrmapConfig)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load an [`ErrmapConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`ErrmapConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<ErrmapConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            let config = parse_toml(&content)?;
            info!(
                target: "errmap.config",
                path = %p.display(),
                classes = config.classes.len(),
                "loaded config"
            );
            config
        }
        None => ErrmapConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into an [`ErrmapConfig`].
pub fn parse_toml(content: &str) -> Result<ErrmapConfig, ConfigError> {
    toml::from_str::<ErrmapConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `ERRMAP_STACK_CAPTURE` (`force`, `env`, `off`)
/// - `ERRMAP_STACK_PRETTY` (`true`/`false`/`1`/`0`)
/// - `ERRMAP_STACK_BASE_PATH`
///
/// Unparseable values are logged and ignored.
pub fn apply_env_overrides(config: &mut ErrmapConfig) {
    apply_overrides_with(config, |key| std::env::var(key).ok());
}

/// [`apply_env_overrides`] reading variables through `lookup`.
pub fn apply_overrides_with(config: &mut ErrmapConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("ERRMAP_STACK_CAPTURE") {
        match val.parse::<CaptureMode>() {
            Ok(mode) => config.stack.capture = Some(mode),
            Err(reason) => {
                warn!(target: "errmap.config", var = "ERRMAP_STACK_CAPTURE", %reason, "ignoring override")
            }
        }
    }
    if let Some(val) = lookup("ERRMAP_STACK_PRETTY") {
        match parse_bool(&val) {
            Some(b) => config.stack.pretty = Some(b),
            None => {
                warn!(target: "errmap.config", var = "ERRMAP_STACK_PRETTY", value = %val, "ignoring override")
            }
        }
    }
    if let Some(val) = lookup("ERRMAP_STACK_BASE_PATH") {
        config.stack.base_path = Some(PathBuf::from(val));
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (invalid or duplicate names, unknown or cyclic `extends`)
/// are returned as a [`ConfigError::ValidationError`]; soft issues come back
/// as warnings.
pub fn validate_config(config: &ErrmapConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    let mut by_name: BTreeMap<&str, &ClassEntry> = BTreeMap::new();
    for (i, entry) in config.classes.iter().enumerate() {
        if let Err(e) = ErrorName::from_value(&entry.name) {
            errors.push(format!("classes[{i}]: {e}"));
            continue;
        }
        if let Some(name) = entry.name_str()
            && by_name.insert(name, entry).is_some()
        {
            errors.push(format!("duplicate class name '{name}'"));
        }
    }

    for (&name, entry) in &by_name {
        if entry.errors.is_empty() {
            warnings.push(ConfigWarning::EmptyErrorMap {
                class: name.to_string(),
            });
        }
        let Some(parent) = entry.extends.as_deref() else {
            continue;
        };
        if !by_name.contains_key(parent) {
            errors.push(format!("class '{name}' extends unknown class '{parent}'"));
            continue;
        }
        match ancestors(name, &by_name) {
            Some(chain) => {
                for code in entry.errors.codes() {
                    if let Some(owner) = chain
                        .iter()
                        .find(|a| by_name[*a].errors.contains(code.as_str()))
                    {
                        warnings.push(ConfigWarning::ShadowedCode {
                            class: name.to_string(),
                            code: code.to_string(),
                            parent: owner.to_string(),
                        });
                    }
                }
            }
            None => errors.push(format!("class '{name}' has a cyclic extends chain")),
        }
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

/// Ancestors of `name`, nearest first. `None` when the chain loops back.
/// Stops silently at an unknown parent; that case is reported separately.
fn ancestors<'a>(name: &'a str, by_name: &BTreeMap<&'a str, &'a ClassEntry>) -> Option<Vec<&'a str>> {
    let mut seen = BTreeSet::from([name]);
    let mut chain = Vec::new();
    let mut cur = name;
    while let Some(parent) = by_name.get(cur).copied().and_then(|e| e.extends.as_deref()) {
        if !seen.insert(parent) {
            return None;
        }
        if !by_name.contains_key(parent) {
            break;
        }
        chain.push(parent);
        cur = parent;
    }
    Some(chain)
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over `base`.
///
/// Hidden prefixes are combined. Classes are matched by name: an overlay
/// class replaces the base class of the same name in place, other overlay
/// classes are appended.
pub fn merge_configs(base: ErrmapConfig, overlay: ErrmapConfig) -> ErrmapConfig {
    let mut hidden = base.stack.hidden;
    for prefix in overlay.stack.hidden {
        if !hidden.contains(&prefix) {
            hidden.push(prefix);
        }
    }
    let stack = StackSection {
        capture: overlay.stack.capture.or(base.stack.capture),
        pretty: overlay.stack.pretty.or(base.stack.pretty),
        base_path: overlay.stack.base_path.or(base.stack.base_path),
        hidden,
    };

    let mut classes = base.classes;
    for entry in overlay.classes {
        let existing = entry
            .name_str()
            .and_then(|n| classes.iter().position(|c| c.name_str() == Some(n)));
        match existing {
            Some(i) => classes[i] = entry,
            None => classes.push(entry),
        }
    }

    ErrmapConfig { stack, classes }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Classes produced from a config, addressable by name.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<String, ErrorClass>,
    order: Vec<String>,
}

impl ClassRegistry {
    /// Class named `name`.
    pub fn get(&self, name: &str) -> Option<&ErrorClass> {
        self.classes.get(name)
    }

    /// Class names in build order (parents before children).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Classes in build order.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorClass> {
        self.order.iter().filter_map(|n| self.classes.get(n))
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no classes were configured.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    fn ensure(
        &mut self,
        name: &str,
        by_name: &BTreeMap<&str, &ClassEntry>,
        stack: &StackOptions,
    ) -> Result<ErrorClass, ConfigError> {
        if let Some(class) = self.classes.get(name) {
            return Ok(class.clone());
        }
        let entry = by_name
            .get(name)
            .ok_or_else(|| ConfigError::ValidationError {
                reasons: vec![format!("unknown class '{name}'")],
            })?;
        let class_name = ErrorName::from_value(&entry.name)?;
        let class = match entry.extends.as_deref() {
            Some(parent) => self
                .ensure(parent, by_name, stack)?
                .extend_named(class_name, entry.errors.clone()),
            None => ErrorClass::named(class_name, entry.errors.clone())
                .with_stack_options(stack.clone()),
        };
        debug!(target: "errmap.config", class = name, "registered class");
        self.order.push(name.to_string());
        self.classes.insert(name.to_string(), class.clone());
        Ok(class)
    }
}

/// Validate `config` and produce every class it declares, parents before
/// children, with the configured stack options.
pub fn build_registry(config: &ErrmapConfig) -> Result<ClassRegistry, ConfigError> {
    for warning in validate_config(config)? {
        warn!(target: "errmap.config", %warning, "config warning");
    }
    let stack = config.stack.to_options();
    let by_name: BTreeMap<&str, &ClassEntry> = config
        .classes
        .iter()
        .filter_map(|e| e.name_str().map(|n| (n, e)))
        .collect();

    let mut registry = ClassRegistry::default();
    for entry in &config.classes {
        if let Some(name) = entry.name_str() {
            registry.ensure(name, &by_name, &stack)?;
        }
    }
    Ok(registry)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
