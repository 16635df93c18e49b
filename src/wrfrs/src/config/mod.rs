// wrfrs/src/config/mod.rs

//! Layered YAML configuration with environment substitution, file
//! inclusion, local back-references and value coercion.
//!
//! A configuration file can reference the process environment with
//! `${VAR}`, other files with an `include` key, and its own top-level
//! keys with `%name` or `%(name)`:
//!
//! ```yaml
//! include : base.yaml
//! run_dir : ${HOME}/runs
//! data    : "%(run_dir)/data"
//! nbiter  : 10
//! ```
//!
//! Local references are substituted textually and re-parsed until the
//! serialized tree stops changing.

pub mod coerce;
pub mod expr;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub use coerce::{coerce, ConfigValue};

// substitution rounds are bounded so that cyclic references surface as an
// error instead of looping forever
const MAX_SUBSTITUTION_ROUNDS: usize = 32;

lazy_static! {
    static ref RE_ENV: Regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    static ref RE_LOCAL: Regex =
        Regex::new(r"%%|%\(([A-Za-z_][A-Za-z0-9_]*)\)|%([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("only YAML configuration files are supported: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration syntax: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("top level of '{0}' is not a mapping")]
    NotAMapping(String),

    #[error("invalid include directive in '{0}'")]
    BadInclude(String),

    #[error("error while parsing '{0}'")]
    Expression(String),

    #[error("key not found: '{0}'")]
    KeyNotFound(String),

    #[error("local substitution did not converge after {0} rounds")]
    SubstitutionDiverged(usize),
}

/// A resolved configuration tree built from a file or a string.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    values: Mapping,
}

impl ConfigStore {
    /// An empty store; every lenient read yields its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and resolve a configuration file (`.yaml` / `.yml` only).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => {}
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
        let content = fs_err::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::resolve(&content, Some(path.to_path_buf()))
    }

    fn resolve(content: &str, origin: Option<PathBuf>) -> Result<Self, ConfigError> {
        let content = substitute_env(content);
        let label = origin
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<stream>".to_string());

        let mut own = coerce::coerce_mapping(&parse_mapping(&content, &label)?)?;

        // includes are resolved first so the file's own keys win the merge
        let mut merged = Mapping::new();
        if let Some(include) = own.remove(&Value::from("include")) {
            for include_path in include_paths(&include, &label)? {
                log::info!("Including config file '{}'...", include_path);
                let child = ConfigStore::from_path(&include_path)?;
                deep_merge(&mut merged, &child.values);
            }
        }
        deep_merge(&mut merged, &own);

        let values = substitute_local(merged)?;
        Ok(Self {
            path: origin,
            values,
        })
    }

    /// Strict lookup of a `/`-separated key path. A missing terminal key,
    /// or one holding an explicit null, is a [`ConfigError::KeyNotFound`].
    pub fn lookup(&self, path: &str) -> Result<Value, ConfigError> {
        match self.walk(path) {
            Some(value) if !value.is_null() => Ok(value.clone()),
            _ => Err(ConfigError::KeyNotFound(path.to_string())),
        }
    }

    /// Lenient lookup: a missing or null key, or one that cannot convert
    /// to the default's type, yields the default.
    pub fn lookup_or<T: ConfigValue>(&self, path: &str, default: T) -> T {
        match self.walk(path) {
            Some(value) if !value.is_null() => T::from_value(value).unwrap_or(default),
            _ => default,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_ok()
    }

    fn walk(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('/');
        let first = segments.next()?;
        let mut value = self.values.get(&Value::from(first))?;
        for segment in segments {
            value = value.as_mapping()?.get(&Value::from(segment))?;
        }
        Some(value)
    }

    /// Assign a top-level key, logging when an existing value changes.
    pub fn set<V: Into<Value>>(&mut self, key: &str, value: V) -> Result<(), ConfigError> {
        let value = coerce::coerce(&value.into())?;
        let map_key = Value::from(key);
        if let Some(existing) = self.values.get(&map_key) {
            if *existing != value {
                log::warn!("{}: redefining directive '{}'", self, key);
            }
        }
        self.values.insert(map_key, value);
        Ok(())
    }

    /// Assign a top-level key only if it is not already present.
    pub fn set_default<V: Into<Value>>(&mut self, key: &str, value: V) -> Result<(), ConfigError> {
        let map_key = Value::from(key);
        if !self.values.contains_key(&map_key) {
            let value = coerce::coerce(&value.into())?;
            log::warn!("Set default config value for {}: {:?}", key, value);
            self.values.insert(map_key, value);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Top-level key names, in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.iter().filter_map(|(k, _)| k.as_str())
    }

    pub fn origin(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The resolved tree as YAML text.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(&self.values)?)
    }
}

impl FromStr for ConfigStore {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        Self::resolve(content, None)
    }
}

impl fmt::Display for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "ConfigStore('{}')", path.display()),
            None => write!(f, "ConfigStore(<stream>)"),
        }
    }
}

fn substitute_env(content: &str) -> String {
    RE_ENV
        .replace_all(content, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

fn parse_mapping(content: &str, label: &str) -> Result<Mapping, ConfigError> {
    match serde_yaml::from_str::<Value>(content)? {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(ConfigError::NotAMapping(label.to_string())),
    }
}

fn include_paths(include: &Value, label: &str) -> Result<Vec<String>, ConfigError> {
    Vec::<String>::from_value(include).ok_or_else(|| ConfigError::BadInclude(label.to_string()))
}

/// Merge `other` into `base`; nested mappings merge key by key, everything
/// else is overwritten by `other`.
fn deep_merge(base: &mut Mapping, other: &Mapping) {
    for (key, value) in other {
        let both_mappings =
            matches!(base.get(key), Some(Value::Mapping(_))) && value.is_mapping();
        if both_mappings {
            if let (Some(Value::Mapping(existing)), Value::Mapping(incoming)) =
                (base.get_mut(key), value)
            {
                deep_merge(existing, incoming);
            }
        } else {
            base.insert(key.clone(), value.clone());
        }
    }
}

// Serialize, substitute %name / %(name) from the top-level keys, re-parse;
// repeat until the text stops changing.
fn substitute_local(mut values: Mapping) -> Result<Mapping, ConfigError> {
    for _ in 0..MAX_SUBSTITUTION_ROUNDS {
        let old = serde_yaml::to_string(&values)?;

        let mut sources: HashMap<&str, String> = HashMap::new();
        for (key, value) in &values {
            if let (Some(name), Some(text)) = (key.as_str(), coerce::scalar_to_string(value)) {
                sources.insert(name, text);
            }
        }

        let new = RE_LOCAL
            .replace_all(&old, |caps: &Captures| {
                let full = caps.get(0).unwrap().as_str();
                if full == "%%" {
                    return "%".to_string();
                }
                let name = caps.get(1).or_else(|| caps.get(2)).unwrap().as_str();
                sources
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| full.to_string())
            })
            .into_owned();

        if new == old {
            return Ok(values);
        }
        values = coerce::coerce_mapping(&parse_mapping(&new, "<substitution>")?)?;
    }
    Err(ConfigError::SubstitutionDiverged(MAX_SUBSTITUTION_ROUNDS))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONF: &str = "
string : /home/data/
int : 10
list : 1, 2, 3
rank1:
    rank2.1 : 1
    rank2.2 : 2
";

    #[test]
    fn test_values_and_types() {
        let config: ConfigStore = CONF.parse().unwrap();
        assert_eq!(config.lookup_or("string", String::new()), "/home/data/");
        assert_eq!(config.lookup_or("int", 0i64), 10);
        assert_eq!(config.lookup_or("list", Vec::<i64>::new()), vec![1, 2, 3]);
    }

    #[test]
    fn test_nested_lookup() {
        let config: ConfigStore = CONF.parse().unwrap();
        assert_eq!(config.lookup_or("rank1/rank2.1", 0i64), 1);
        assert_eq!(config.lookup_or("rank1/rank2.2", 0i64), 2);
        assert!(config.lookup("rank1/rank2.3").is_err());
    }

    #[test]
    fn test_missing_vs_default() {
        let config: ConfigStore = CONF.parse().unwrap();
        assert!(matches!(
            config.lookup("nope"),
            Err(ConfigError::KeyNotFound(_))
        ));
        assert_eq!(config.lookup_or("nope", 0i64), 0);
        assert!(!config.contains("nope"));
    }

    #[test]
    fn test_set_and_type_coercion() {
        let mut config: ConfigStore = CONF.parse().unwrap();
        config.set("new", 1i64).unwrap();
        assert!(config.contains("new"));
        assert_eq!(config.lookup_or("new", 0i64), 1);
        assert_eq!(config.lookup_or("new", String::new()), "1");
    }

    #[test]
    fn test_set_default_keeps_existing() {
        let mut config: ConfigStore = CONF.parse().unwrap();
        config.set_default("int", 20i64).unwrap();
        config.set_default("fresh", "fresh").unwrap();
        assert_eq!(config.lookup_or("int", 0i64), 10);
        assert_eq!(config.lookup_or("fresh", String::new()), "fresh");
    }

    #[test]
    fn test_local_substitution_chain() {
        let config: ConfigStore = "
base : /data
inner : \"%(base)/wrf\"
leaf : \"%inner/d01\"
"
        .parse()
        .unwrap();
        assert_eq!(config.lookup_or("leaf", String::new()), "/data/wrf/d01");
    }

    #[test]
    fn test_cyclic_substitution_diverges() {
        let result = "
a : \"%(b)\"
b : \"%(a)\"
"
        .parse::<ConfigStore>();
        assert!(matches!(
            result,
            Err(ConfigError::SubstitutionDiverged(_))
        ));
    }

    #[test]
    fn test_empty_store() {
        let config = ConfigStore::new();
        assert!(config.is_empty());
        assert_eq!(config.keys().count(), 0);
        assert_eq!(format!("{}", config), "ConfigStore(<stream>)");
    }
}
