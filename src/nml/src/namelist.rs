// nml/src/namelist.rs

//! The Namelist and NmlGroup containers.

use crate::value::NmlValue;
use crate::WriteOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single namelist group holding ordered variables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NmlGroup {
    variables: HashMap<String, NmlValue>,
    /// Order of variables (to preserve declaration order)
    variable_order: Vec<String>,
}

impl NmlGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable, keeping its position if it already exists.
    pub fn insert<T: Into<NmlValue>>(&mut self, name: &str, value: T) -> &mut Self {
        let name = name.to_lowercase();
        if !self.variables.contains_key(&name) {
            self.variable_order.push(name.clone());
        }
        self.variables.insert(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&NmlValue> {
        self.variables.get(&name.to_lowercase())
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(&name.to_lowercase())
    }

    pub fn variable_names(&self) -> &[String] {
        &self.variable_order
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &NmlValue)> {
        self.variable_order
            .iter()
            .filter_map(move |name| self.variables.get(name).map(|value| (name, value)))
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Overwrite existing values with the patch's, appending new variables.
    pub fn apply_patch(&mut self, patch: &NmlGroup) {
        for (name, value) in patch.variables() {
            self.insert(name, value.clone());
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_integer()
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_real()
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name)?.as_logical()
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_character()
    }

    /// Read a variable as an integer vector; a scalar reads as one element.
    pub fn get_i64_vec(&self, name: &str) -> Option<Vec<i64>> {
        match self.get(name)? {
            NmlValue::Array(items) => items.iter().map(NmlValue::as_integer).collect(),
            scalar => Some(vec![scalar.as_integer()?]),
        }
    }

    /// Read a variable as a real vector; integers widen, scalars broadcast.
    pub fn get_f64_vec(&self, name: &str) -> Option<Vec<f64>> {
        match self.get(name)? {
            NmlValue::Array(items) => items.iter().map(NmlValue::as_real).collect(),
            scalar => Some(vec![scalar.as_real()?]),
        }
    }

    pub fn to_fortran_string(&self, options: &WriteOptions) -> String {
        let mut output = String::new();
        for (name, value) in self.variables() {
            let name = if options.uppercase {
                name.to_uppercase()
            } else {
                name.clone()
            };
            for line in format_assignment(&name, value, options) {
                output.push_str(&options.indent);
                output.push_str(&line);
                output.push('\n');
            }
        }
        output
    }
}

fn format_assignment(name: &str, value: &NmlValue, options: &WriteOptions) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = format!("{} = ", name);
    let header_len = line.len();

    let rendered: Vec<String> = match value {
        NmlValue::Array(items) => items
            .iter()
            .map(|v| v.to_fortran_string(options.uppercase))
            .collect(),
        scalar => vec![scalar.to_fortran_string(options.uppercase)],
    };

    for (i, item) in rendered.iter().enumerate() {
        if i > 0 {
            line.push_str(", ");
        }
        if options.column_width > 0
            && line.len() + item.len() > options.column_width
            && line.len() > header_len
        {
            lines.push(line);
            line = " ".repeat(header_len);
        }
        line.push_str(item);
    }

    if options.end_comma {
        line.push(',');
    }
    lines.push(line);
    lines
}

/// A complete namelist: an ordered collection of groups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Namelist {
    groups: HashMap<String, NmlGroup>,
    group_order: Vec<String>,
}

impl Namelist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a group and return a mutable reference to it.
    pub fn insert_group(&mut self, name: &str) -> &mut NmlGroup {
        let name = name.to_lowercase();
        if !self.groups.contains_key(&name) {
            self.group_order.push(name.clone());
            self.groups.insert(name.clone(), NmlGroup::new());
        }
        self.groups.get_mut(&name).unwrap()
    }

    pub fn get_group(&self, name: &str) -> Option<&NmlGroup> {
        self.groups.get(&name.to_lowercase())
    }

    pub fn get_group_mut(&mut self, name: &str) -> Option<&mut NmlGroup> {
        self.groups.get_mut(&name.to_lowercase())
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(&name.to_lowercase())
    }

    pub fn group_names(&self) -> &[String] {
        &self.group_order
    }

    pub fn groups(&self) -> impl Iterator<Item = (&String, &NmlGroup)> {
        self.group_order
            .iter()
            .filter_map(move |name| self.groups.get(name).map(|group| (name, group)))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Merge another namelist into this one; the patch's values win and new
    /// groups or variables are appended in order.
    pub fn apply_patch(&mut self, patch: &Namelist) {
        for (group_name, patch_group) in patch.groups() {
            self.insert_group(group_name).apply_patch(patch_group);
        }
    }

    pub fn to_fortran_string(&self, options: &WriteOptions) -> String {
        let mut output = String::new();
        for (i, (group_name, group)) in self.groups().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            let name = if options.uppercase {
                group_name.to_uppercase()
            } else {
                group_name.clone()
            };
            output.push_str(&format!("&{}\n", name));
            output.push_str(&group.to_fortran_string(options));
            output.push_str("/\n");
        }
        output
    }
}

impl fmt::Display for Namelist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fortran_string(&WriteOptions::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_preserves_order() {
        let mut group = NmlGroup::new();
        group.insert("zulu", 1i64).insert("alpha", 2i64);
        let names: Vec<_> = group.variable_names().to_vec();
        assert_eq!(names, vec!["zulu", "alpha"]);
    }

    #[test]
    fn test_insert_keeps_position_on_overwrite() {
        let mut group = NmlGroup::new();
        group.insert("a", 1i64).insert("b", 2i64).insert("a", 3i64);
        assert_eq!(group.variable_names(), ["a", "b"]);
        assert_eq!(group.get_i64("a"), Some(3));
    }

    #[test]
    fn test_patch_overwrites_and_appends() {
        let mut base = Namelist::new();
        base.insert_group("share").insert("max_dom", 1i64);

        let mut patch = Namelist::new();
        patch
            .insert_group("share")
            .insert("max_dom", 2i64)
            .insert("wrf_core", "ARW");
        patch.insert_group("geogrid").insert("dx", 27000i64);

        base.apply_patch(&patch);
        let share = base.get_group("share").unwrap();
        assert_eq!(share.get_i64("max_dom"), Some(2));
        assert_eq!(share.get_string("wrf_core"), Some("ARW"));
        assert!(base.has_group("geogrid"));
    }

    #[test]
    fn test_vec_getters() {
        let mut group = NmlGroup::new();
        group.insert("ids", vec![1i64, 2, 3]);
        group.insert("dx", 27000i64);
        assert_eq!(group.get_i64_vec("ids"), Some(vec![1, 2, 3]));
        assert_eq!(group.get_f64_vec("dx"), Some(vec![27000.0]));
    }

    #[test]
    fn test_format_group() {
        let mut nml = Namelist::new();
        nml.insert_group("time_control")
            .insert("run_days", 0i64)
            .insert("restart", false);
        let text = nml.to_fortran_string(&WriteOptions::default());
        assert!(text.contains("&time_control"));
        assert!(text.contains("run_days = 0"));
        assert!(text.contains("restart = .false."));
        assert!(text.trim_end().ends_with('/'));
    }
}
