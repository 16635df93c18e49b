// wrfrs/src/namelist/wps.rs

//! Namelist derivation for the WPS preprocessing tools (geogrid, ungrib,
//! metgrid).

use crate::config::ConfigStore;
use crate::dates::{format_date, DateFormat};
use crate::namelist::{template_from_config, to_nml_value, NamelistDoc, NamelistError};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

const GEOG_DATA_RES: [&str; 4] = ["10m", "5m", "2m", "30s"];

/// Derives `namelist.wps`.
pub struct WpsNamelist<'c> {
    doc: NamelistDoc<'c>,
}

impl<'c> WpsNamelist<'c> {
    pub fn new(config: &'c ConfigStore) -> Result<Self, NamelistError> {
        Self::with_template(config, None)
    }

    /// The template path defaults to the `nml_wps_template` configuration
    /// key; an explicit argument is the fallback.
    pub fn with_template(
        config: &'c ConfigStore,
        template: Option<PathBuf>,
    ) -> Result<Self, NamelistError> {
        let template = template_from_config(config, "nml_wps_template", template);
        Ok(Self {
            doc: NamelistDoc::new(config, template)?,
        })
    }

    pub fn doc(&self) -> &NamelistDoc<'c> {
        &self.doc
    }

    /// Populate the `share`, `geogrid`, `ungrib` and `metgrid` sections.
    pub fn calc_values(&mut self) -> Result<(), NamelistError> {
        let nd = self.doc.max_dom;
        let cfg = self.doc.config();

        let start_date = format_date(&self.doc.date_s, DateFormat::Wrf);
        let end_date = format_date(&self.doc.date_e, DateFormat::Wrf);
        let interval_seconds = self.doc.from_config("interval_seconds", 10800i64);

        let share = self.doc.section("share");
        share.insert("wrf_core", "ARW");
        share.insert("max_dom", nd);
        share.insert("start_date", vec![start_date; nd]);
        share.insert("end_date", vec![end_date; nd]);
        share.insert("interval_seconds", interval_seconds);

        // geogrid numbers domains from zero in its parent table
        let parent_id = self
            .doc
            .from_config("parent_id", (0..nd as i64).collect::<Vec<i64>>());
        let parent_grid_ratio = self.doc.from_config("parent_grid_ratio", padded(1, 3, nd));
        let i_parent_start = self.doc.from_config("i_parent_start", padded(1, 10, nd));
        let j_parent_start = self.doc.from_config("j_parent_start", padded(1, 10, nd));
        let e_we = self.doc.from_config("e_we", padded(70, 88, nd));
        let e_sn = self.doc.from_config("e_sn", padded(70, 88, nd));
        let dx = self.doc.from_config("dx", Value::from(27000i64));
        let dy = self.doc.from_config("dy", Value::from(27000i64));
        let geog_data_res = self.doc.from_config(
            "geog_data_res",
            GEOG_DATA_RES[..nd.min(GEOG_DATA_RES.len())]
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
        );
        let map_proj = self.doc.from_config("map_proj", "mercator".to_string());
        let ref_lat = self.doc.from_config("ref_lat", Value::from(0.0));
        let ref_lon = self.doc.from_config("ref_lon", Value::from(0.0));
        let truelat1 = self.doc.from_config("truelat1", ref_lat.clone());
        let truelat2 = self.doc.from_config("truelat2", truelat1.clone());
        let stand_lon = self.doc.from_config("stand_lon", ref_lon.clone());
        let geog_data_path = self.doc.from_config("geog_data_path", ".".to_string());
        let geogrid_tbl_path = self.doc.from_config("opt_geogrid_tbl_path", ".".to_string());

        let geogrid = self.doc.section("geogrid");
        geogrid.insert("parent_id", parent_id);
        geogrid.insert("parent_grid_ratio", parent_grid_ratio);
        geogrid.insert("i_parent_start", i_parent_start);
        geogrid.insert("j_parent_start", j_parent_start);
        geogrid.insert("e_we", e_we);
        geogrid.insert("e_sn", e_sn);
        geogrid.insert("dx", to_nml_value(&dx));
        geogrid.insert("dy", to_nml_value(&dy));
        geogrid.insert("geog_data_res", geog_data_res);
        geogrid.insert("map_proj", map_proj);
        geogrid.insert("ref_lat", to_nml_value(&ref_lat));
        geogrid.insert("ref_lon", to_nml_value(&ref_lon));
        geogrid.insert("truelat1", to_nml_value(&truelat1));
        geogrid.insert("truelat2", to_nml_value(&truelat2));
        geogrid.insert("stand_lon", to_nml_value(&stand_lon));
        geogrid.insert("geog_data_path", geog_data_path);
        geogrid.insert("opt_geogrid_tbl_path", geogrid_tbl_path);

        let data_type = self.doc.from_config("data_type", "GFS".to_string());
        let prefix = self.doc.from_config("ungrib_prefix", data_type);
        let ungrib = self.doc.section("ungrib");
        ungrib.insert("out_format", "WPS");
        ungrib.insert("prefix", prefix);

        let fg_name = cfg.lookup("list_ungrib_prefixes").ok();
        let metgrid_tbl_path = self.doc.from_config("opt_metgrid_tbl_path", ".".to_string());
        let metgrid = self.doc.section("metgrid");
        if let Some(fg_name) = fg_name {
            metgrid.insert("fg_name", to_nml_value(&fg_name));
        }
        metgrid.insert("opt_metgrid_tbl_path", metgrid_tbl_path);

        self.doc.apply_extras("namelist_wps");
        Ok(())
    }

    /// Compute and serialize in one step, overwriting the target file.
    pub fn write<P: AsRef<Path>>(&mut self, path: P) -> Result<(), NamelistError> {
        self.calc_values()?;
        self.doc.write(path)
    }
}

// [first, rest, rest, ...] of length n
pub(crate) fn padded(first: i64, rest: i64, n: usize) -> Vec<i64> {
    std::iter::once(first)
        .chain(std::iter::repeat(rest).take(n.saturating_sub(1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded() {
        assert_eq!(padded(1, 10, 3), vec![1, 10, 10]);
        assert_eq!(padded(70, 88, 1), vec![70]);
    }
}
