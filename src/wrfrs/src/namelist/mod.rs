// wrfrs/src/namelist/mod.rs

//! Namelist documents: ordered sections of key/value assignments populated
//! from a [`ConfigStore`] and serialized through `wrfrs-nml`, optionally
//! merged over a template file.

pub mod wps;
pub mod wrf;

use crate::config::{ConfigError, ConfigStore, ConfigValue};
use crate::dates::{self, DateError};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use wrfrs_nml::{Namelist, NmlGroup, NmlValue, WriteOptions};

pub use wps::WpsNamelist;
pub use wrf::{WrfNamelist, WrfVariant};

#[derive(Debug, Error)]
pub enum NamelistError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Date(#[from] DateError),

    #[error(transparent)]
    Nml(#[from] wrfrs_nml::NmlError),

    #[error("Unknown value of sf_surface_physics: {0}")]
    UnknownSurfacePhysics(i64),

    #[error("no fine domains configured under 'ndown/fine_domains'")]
    NoFineDomains,

    #[error("domain {0} has no parent to downscale from")]
    NoParentDomain(usize),
}

const DEFAULT_DATE_S: &str = "2000-01-01 00:00";
const DEFAULT_DATE_E: &str = "2000-01-01 12:00";

/// A namelist under construction: lazily created sections plus the header
/// values every derivation starts from.
pub struct NamelistDoc<'c> {
    config: &'c ConfigStore,
    values: Namelist,
    template: Option<PathBuf>,
    pub max_dom: usize,
    pub date_s: chrono::NaiveDateTime,
    pub date_e: chrono::NaiveDateTime,
}

impl<'c> NamelistDoc<'c> {
    pub fn new(config: &'c ConfigStore, template: Option<PathBuf>) -> Result<Self, NamelistError> {
        let max_dom = config.lookup_or("max_dom", 1i64).max(1) as usize;
        let date_s = dates::read_date(&config.lookup_or("date_s", DEFAULT_DATE_S.to_string()))?;
        let date_e = dates::read_date(&config.lookup_or("date_e", DEFAULT_DATE_E.to_string()))?;
        Ok(Self {
            config,
            values: Namelist::new(),
            template,
            max_dom,
            date_s,
            date_e,
        })
    }

    pub fn config(&self) -> &'c ConfigStore {
        self.config
    }

    pub fn namelist(&self) -> &Namelist {
        &self.values
    }

    /// Get a section, creating it on first access.
    pub fn section(&mut self, name: &str) -> &mut NmlGroup {
        self.values.insert_group(name)
    }

    pub fn group(&self, name: &str) -> Option<&NmlGroup> {
        self.values.get_group(name)
    }

    /// Pull a typed value out of the configuration with a default.
    pub fn from_config<T: ConfigValue>(&self, key: &str, default: T) -> T {
        self.config.lookup_or(key, default)
    }

    /// Pull a per-domain list; scalars broadcast to `n` entries.
    pub fn from_config_list<T: ConfigValue + Clone>(&self, key: &str, default: T, n: usize) -> Vec<T> {
        match self.config.lookup(key) {
            Ok(value) => to_list(&value, default, n),
            Err(_) => vec![default; n],
        }
    }

    /// Merge a nested configuration mapping (section -> key -> value) into
    /// the document, overriding computed values with hand-written extras.
    pub fn apply_extras(&mut self, key: &str) {
        let extras = match self.config.lookup(key) {
            Ok(Value::Mapping(mapping)) => mapping,
            _ => return,
        };
        for (section_name, section_values) in &extras {
            let (Some(name), Value::Mapping(variables)) = (section_name.as_str(), section_values)
            else {
                continue;
            };
            let group = self.values.insert_group(name);
            for (variable, value) in variables {
                if let Some(variable) = variable.as_str() {
                    group.insert(variable, to_nml_value(value));
                }
            }
        }
    }

    /// Serialize the document, merged over its template when one is set.
    /// The target file is overwritten.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), NamelistError> {
        let output = match &self.template {
            Some(template) => {
                let mut base = wrfrs_nml::read(template)?;
                base.apply_patch(&self.values);
                base
            }
            None => self.values.clone(),
        };
        let options = WriteOptions {
            force: true,
            ..Default::default()
        };
        wrfrs_nml::write_with_options(&output, path, &options)?;
        Ok(())
    }
}

/// Convert a configuration value into a namelist value. Mappings have no
/// namelist counterpart and collapse to null with a warning.
pub fn to_nml_value(value: &Value) -> NmlValue {
    match value {
        Value::Null => NmlValue::Null,
        Value::Bool(b) => NmlValue::Logical(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                NmlValue::Integer(i)
            } else {
                NmlValue::Real(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => NmlValue::Character(s.clone()),
        Value::Sequence(items) => NmlValue::Array(items.iter().map(to_nml_value).collect()),
        other => {
            log::warn!("cannot map configuration value {:?} into a namelist", other);
            NmlValue::Null
        }
    }
}

/// Broadcast a configuration value to a list of `n` entries; sequences are
/// taken as-is whatever their length.
pub fn to_list<T: ConfigValue + Clone>(value: &Value, default: T, n: usize) -> Vec<T> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|item| T::from_value(item).unwrap_or_else(|| default.clone()))
            .collect(),
        scalar => {
            let value = T::from_value(scalar).unwrap_or(default);
            vec![value; n]
        }
    }
}

pub(crate) fn template_from_config(
    config: &ConfigStore,
    key: &str,
    fallback: Option<PathBuf>,
) -> Option<PathBuf> {
    match config.lookup(key) {
        Ok(Value::String(path)) => Some(PathBuf::from(path)),
        _ => fallback,
    }
}

// small helpers over nested configuration mappings (diagnostics blocks)

pub(crate) fn map_get<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a Value> {
    mapping.get(&Value::from(key))
}

pub(crate) fn map_or<T: ConfigValue>(mapping: &Mapping, key: &str, default: T) -> T {
    map_get(mapping, key)
        .and_then(T::from_value)
        .unwrap_or(default)
}

pub(crate) fn map_list<T: ConfigValue + Clone>(
    mapping: &Mapping,
    key: &str,
    default: T,
    n: usize,
) -> Vec<T> {
    match map_get(mapping, key) {
        Some(value) => to_list(value, default, n),
        None => vec![default; n],
    }
}

pub(crate) fn map_flag(mapping: &Mapping, key: &str) -> bool {
    match map_get(mapping, key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().map(|i| i != 0).unwrap_or(false),
        _ => false,
    }
}
