// nml/src/lib.rs

//! A compact Rust library for reading and writing Fortran namelists.
//!
//! This crate covers the subset of the namelist format used by WRF and its
//! preprocessing tools:
//! - `&group ... /` blocks with `name = value` assignments
//! - integers, reals (including `d` exponents), logicals, quoted strings
//! - arrays as comma separated values and `N*value` repeats
//! - `!` comments
//!
//! Namelists can be patched against a template (template provides baseline
//! values, the patch overrides) and formatted back to namelist text.

pub mod error;
pub mod namelist;
pub mod parser;
pub mod value;

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub use error::{NmlError, Result};
pub use namelist::{Namelist, NmlGroup};
pub use value::NmlValue;

/// Parse a namelist from a file path.
pub fn read<P: AsRef<Path>>(path: P) -> Result<Namelist> {
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    reads(&contents)
}

/// Parse a namelist from a string.
///
/// ```
/// let nml = wrfrs_nml::reads("&data_nml x=1 y=2.0 z=.true. /").unwrap();
/// assert_eq!(nml.get_group("data_nml").unwrap().get_i64("x"), Some(1));
/// ```
pub fn reads(content: &str) -> Result<Namelist> {
    parser::parse(content)
}

/// Write a namelist to a file with default options.
pub fn write<P: AsRef<Path>>(nml: &Namelist, path: P) -> Result<()> {
    write_with_options(nml, path, &WriteOptions::default())
}

/// Write a namelist to a file with specific options.
pub fn write_with_options<P: AsRef<Path>>(
    nml: &Namelist,
    path: P,
    options: &WriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    if !options.force && path.exists() {
        return Err(NmlError::FileAlreadyExists(path.to_path_buf()));
    }
    let mut file = File::create(path)?;
    file.write_all(nml.to_fortran_string(options).as_bytes())?;
    Ok(())
}

/// Create a new namelist from a base and a patch; the patch's values win.
pub fn patch(base: &Namelist, patch: &Namelist) -> Namelist {
    let mut result = base.clone();
    result.apply_patch(patch);
    result
}

/// Options controlling namelist output formatting.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Overwrite existing files
    pub force: bool,
    /// Column width before values wrap to a continuation line
    pub column_width: usize,
    /// Indentation for variable assignments
    pub indent: String,
    /// Append a comma after each assignment
    pub end_comma: bool,
    /// Uppercase group and variable names
    pub uppercase: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            force: false,
            column_width: 72,
            indent: " ".to_string(),
            end_comma: false,
            uppercase: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_text() {
        let mut nml = Namelist::new();
        nml.insert_group("share")
            .insert("wrf_core", "ARW")
            .insert("max_dom", 2i64)
            .insert("start_date", vec!["2015-01-01_00:00:00", "2015-01-01_00:00:00"]);
        nml.insert_group("geogrid")
            .insert("dx", 27000.0)
            .insert("parent_id", vec![0i64, 1]);

        let text = nml.to_fortran_string(&WriteOptions::default());
        let reread = reads(&text).unwrap();
        assert_eq!(nml, reread);
    }

    #[test]
    fn test_write_refuses_existing_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.nml");
        let mut nml = Namelist::new();
        nml.insert_group("d").insert("x", 1i64);

        write(&nml, &path).unwrap();
        assert!(matches!(
            write(&nml, &path),
            Err(NmlError::FileAlreadyExists(_))
        ));
        let forced = WriteOptions {
            force: true,
            ..Default::default()
        };
        write_with_options(&nml, &path, &forced).unwrap();
    }

    #[test]
    fn test_patch_against_template() {
        let template = reads("&domains max_dom = 1 time_step = 60 /").unwrap();
        let mut update = Namelist::new();
        update.insert_group("domains").insert("max_dom", 3i64);

        let merged = patch(&template, &update);
        let domains = merged.get_group("domains").unwrap();
        assert_eq!(domains.get_i64("max_dom"), Some(3)); // overridden
        assert_eq!(domains.get_i64("time_step"), Some(60)); // preserved
    }
}
