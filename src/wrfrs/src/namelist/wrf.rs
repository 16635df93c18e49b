// wrfrs/src/namelist/wrf.rs

//! Namelist derivation for the WRF model itself, with downscaling variants
//! for the ndown pipeline stages.

use crate::config::{ConfigStore, ConfigValue};
use crate::dates::advance_date;
use crate::namelist::wps::padded;
use crate::namelist::{
    map_flag, map_get, map_list, map_or, template_from_config, to_nml_value, NamelistDoc,
    NamelistError,
};
use chrono::{Datelike, Duration, Timelike};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

// output interval the model time step must divide evenly
const TIME_STEP_INTERVAL_S: i64 = 3600;

const AFWA_DIAGS: [&str; 8] = [
    "diag", "severe", "ptype", "buoy", "therm", "icing", "vis", "cloud",
];

const ADVECTION_OPTIONS: [&str; 5] = [
    "moist_adv_opt",
    "scalar_adv_opt",
    "tracer_adv_opt",
    "tke_adv_opt",
    "momentum_adv_opt",
];

/// Which stage of the run pipeline the namelist is generated for.
///
/// Every variant first runs the full multi-domain computation, then adjusts
/// the result; callers always read complete `time_control`, `domains`,
/// `dynamics` and `physics` sections afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrfVariant {
    /// Standard multi-domain run
    #[default]
    Base,
    /// `real.exe` over the fine domain subset, rebased on the first fine
    /// domain
    DownscaleReal,
    /// The two-domain `ndown.exe` step itself
    DownscaleNdown,
    /// DownscaleReal with the advection options forced to safe values for
    /// digital filter initialization
    DownscaleDfiFix,
    /// The continuation WRF run over the fine domains
    DownscaleWrfContinuation,
}

/// Derives `namelist.input`.
pub struct WrfNamelist<'c> {
    doc: NamelistDoc<'c>,
    variant: WrfVariant,
    dfi_opt: i64,
}

// per-domain quantities shared between the common computation and the
// variant adjustments, all indexed by domain number minus one
struct GridLayout {
    grid_id: Vec<i64>,
    parent_id: Vec<i64>,
    parent_grid_ratio: Vec<i64>,
    accumulated_gr: Vec<i64>,
    dt: i64,
    dt_start: Vec<i64>,
    dt_min: Vec<i64>,
    dt_max: Vec<i64>,
    dx: Vec<f64>,
    dy: Vec<f64>,
}

impl<'c> WrfNamelist<'c> {
    pub fn new(config: &'c ConfigStore, variant: WrfVariant) -> Result<Self, NamelistError> {
        Self::with_template(config, variant, None)
    }

    pub fn with_template(
        config: &'c ConfigStore,
        variant: WrfVariant,
        template: Option<PathBuf>,
    ) -> Result<Self, NamelistError> {
        let template = template_from_config(config, "nml_wrf_template", template);
        let doc = NamelistDoc::new(config, template)?;
        let dfi_opt = config.lookup_or("dfi_opt", 0i64);
        Ok(Self {
            doc,
            variant,
            dfi_opt,
        })
    }

    pub fn doc(&self) -> &NamelistDoc<'c> {
        &self.doc
    }

    pub fn calc_values(&mut self) -> Result<(), NamelistError> {
        let layout = self.calc_layout();

        self.calc_time_control();
        self.calc_domains(&layout);
        self.calc_dynamics();
        self.calc_physics(&layout)?;
        self.calc_diagnostics();

        self.doc.apply_extras("namelist_wrf");

        match self.variant {
            WrfVariant::Base => {}
            WrfVariant::DownscaleReal => {
                self.calc_downscale_real(&layout)?;
            }
            WrfVariant::DownscaleNdown => {
                self.calc_downscale_ndown(&layout)?;
            }
            WrfVariant::DownscaleDfiFix => {
                self.calc_downscale_real(&layout)?;
                self.calc_dfi_advection_fix()?;
            }
            WrfVariant::DownscaleWrfContinuation => {
                self.calc_downscale_real(&layout)?;
                self.calc_continuation()?;
            }
        }

        self.calc_dfi();
        Ok(())
    }

    /// Compute and serialize in one step, overwriting the target file.
    pub fn write<P: AsRef<Path>>(&mut self, path: P) -> Result<(), NamelistError> {
        self.calc_values()?;
        self.doc.write(path)
    }

    fn calc_layout(&self) -> GridLayout {
        let nd = self.doc.max_dom;

        let mut dx = self.doc.from_config("dx", 27000.0);
        let mut dy = self.doc.from_config("dy", dx);
        if dx < 10.0 {
            // dx is in degrees: use the projected spacing metgrid computed
            dx = self.doc.from_config("met_dx", dx);
            dy = self.doc.from_config("met_dy", dy);
        }
        let dt = calc_time_step(dx.min(dy), TIME_STEP_INTERVAL_S);

        let grid_id: Vec<i64> = (1..=nd as i64).collect();
        let parent_grid_ratio = self.doc.from_config("parent_grid_ratio", vec![1i64]);
        let parent_id = self.doc.from_config(
            "parent_id",
            (0..parent_grid_ratio.len() as i64).collect::<Vec<i64>>(),
        );

        // accumulated ratio relative to the root domain; parent ids always
        // reference an earlier domain
        let mut accumulated_gr = vec![1i64];
        for (i, gr) in parent_grid_ratio.iter().enumerate().skip(1) {
            let parent = (parent_id[i] - 1).max(0) as usize;
            accumulated_gr.push(accumulated_gr[parent] * gr);
        }

        let dt_start: Vec<i64> = accumulated_gr
            .iter()
            .map(|gr| ((dt as f64 / *gr as f64).ceil() as i64).max(2))
            .collect();
        let dt_min: Vec<i64> = dt_start
            .iter()
            .map(|dts| (*dts as f64 / 2.0).ceil() as i64)
            .collect();
        let dt_max: Vec<i64> = dt_start.iter().map(|dts| dts * 2).collect();

        let dx_list: Vec<f64> = accumulated_gr.iter().map(|gr| dx / *gr as f64).collect();
        let dy_list: Vec<f64> = accumulated_gr.iter().map(|gr| dy / *gr as f64).collect();

        GridLayout {
            grid_id,
            parent_id,
            parent_grid_ratio,
            accumulated_gr,
            dt,
            dt_start,
            dt_min,
            dt_max,
            dx: dx_list,
            dy: dy_list,
        }
    }

    fn calc_time_control(&mut self) {
        let nd = self.doc.max_dom;
        let date_s = self.doc.date_s;
        let date_e = self.doc.date_e;

        let interval_seconds = self.doc.from_config("interval_seconds", 10800i64);
        let history_interval = self.doc.from_config_list("history_interval", 60i64, nd);
        let restart_interval = self.doc.from_config("restart_interval", 1440i64);
        let restart = self.doc.from_config("restart", false);
        let input_from_file = self.doc.from_config_list("input_from_file", true, nd);
        let frames_per_outfile = self.doc.from_config_list("frames_per_outfile", 999999i64, nd);
        let fine_input_stream = self.doc.from_config_list("fine_input_stream", 0i64, nd);
        let write_hist_at_0h_rst = self.doc.from_config("write_hist_at_0h_rst", true);
        let adjust_output_times = self.doc.from_config("adjust_output_times", true);
        let ignore_iofields = self.doc.from_config("ignore_iofields_warning", true);
        let iofields_filename =
            self.doc
                .from_config_list("iofields_filename", "NONE_SPECIFIED".to_string(), nd);

        let tc = self.doc.section("time_control");
        tc.insert("start_year", vec![date_s.year() as i64; nd]);
        tc.insert("start_month", vec![date_s.month() as i64; nd]);
        tc.insert("start_day", vec![date_s.day() as i64; nd]);
        tc.insert("start_hour", vec![date_s.hour() as i64; nd]);
        tc.insert("end_year", vec![date_e.year() as i64; nd]);
        tc.insert("end_month", vec![date_e.month() as i64; nd]);
        tc.insert("end_day", vec![date_e.day() as i64; nd]);
        tc.insert("end_hour", vec![date_e.hour() as i64; nd]);

        tc.insert("interval_seconds", interval_seconds);
        tc.insert("history_interval", history_interval);
        tc.insert("restart_interval", restart_interval);
        tc.insert("restart", restart);
        tc.insert("input_from_file", input_from_file);
        tc.insert("frames_per_outfile", frames_per_outfile);
        tc.insert("fine_input_stream", fine_input_stream);

        tc.insert("write_hist_at_0h_rst", write_hist_at_0h_rst);
        tc.insert("adjust_output_times", adjust_output_times);
        tc.insert("ignore_iofields_warning", ignore_iofields);
        tc.insert("iofields_filename", iofields_filename);
    }

    fn calc_domains(&mut self, layout: &GridLayout) {
        let nd = self.doc.max_dom;
        let cfg = self.doc.config();

        let i_parent_start = self.doc.from_config("i_parent_start", padded(1, 10, nd));
        let j_parent_start = self.doc.from_config("j_parent_start", padded(1, 10, nd));
        let e_we = self.doc.from_config("e_we", padded(70, 88, nd));
        let e_sn = self.doc.from_config("e_sn", padded(70, 88, nd));

        let time_step = self.doc.from_config("time_step", layout.dt);
        let use_adaptive = self.doc.from_config("use_adaptive_time_step", false);
        let starting_time_step = self
            .doc
            .from_config("starting_time_step", layout.dt_start.clone());
        let min_time_step = self.doc.from_config("min_time_step", layout.dt_min.clone());
        let max_time_step = self.doc.from_config("max_time_step", layout.dt_max.clone());
        let max_step_increase_pct = self
            .doc
            .from_config("max_step_increase_pct", padded(10, 51, nd));

        let num_metgrid_levels = cfg.lookup("num_metgrid_levels").ok();
        let num_metgrid_soil_levels = cfg.lookup("num_metgrid_soil_levels").ok();
        let num_eta_levels = self.doc.from_config("num_eta_levels", 41i64);
        let eta_levels = cfg.lookup("eta_levels").ok();

        let domains = self.doc.section("domains");
        domains.insert("max_dom", nd);
        domains.insert("dx", layout.dx.clone());
        domains.insert("dy", layout.dy.clone());
        domains.insert("grid_id", layout.grid_id.clone());
        domains.insert("parent_id", layout.parent_id.clone());
        domains.insert("parent_grid_ratio", layout.parent_grid_ratio.clone());
        domains.insert("parent_time_step_ratio", layout.parent_grid_ratio.clone());

        domains.insert("i_parent_start", i_parent_start);
        domains.insert("j_parent_start", j_parent_start);
        domains.insert("e_we", e_we);
        domains.insert("e_sn", e_sn);

        if let Some(levels) = num_metgrid_levels {
            domains.insert("num_metgrid_levels", to_nml_value(&levels));
        }
        if let Some(levels) = num_metgrid_soil_levels {
            domains.insert("num_metgrid_soil_levels", to_nml_value(&levels));
        }

        domains.insert("time_step", time_step);
        domains.insert("use_adaptive_time_step", use_adaptive);
        domains.insert("starting_time_step", starting_time_step);
        domains.insert("min_time_step", min_time_step);
        domains.insert("max_time_step", max_time_step);
        domains.insert("max_step_increase_pct", max_step_increase_pct);

        match eta_levels {
            Some(Value::String(mode)) if mode == "spline" => {
                let levels = compute_eta_levels(num_eta_levels as usize);
                domains.insert("e_vert", vec![levels.len() as i64; nd]);
                domains.insert("eta_levels", levels);
            }
            Some(Value::Sequence(items)) => {
                let levels: Vec<f64> = items
                    .iter()
                    .filter_map(|level| level.as_f64().or_else(|| level.as_i64().map(|i| i as f64)))
                    .collect();
                domains.insert("e_vert", vec![levels.len() as i64; nd]);
                domains.insert("eta_levels", levels);
            }
            _ => {
                domains.insert("e_vert", vec![num_eta_levels; nd]);
            }
        }
    }

    fn calc_dynamics(&mut self) {
        let nd = self.doc.max_dom;
        let diff_opt = self.doc.from_config_list("diff_opt", 1i64, nd);
        let km_opt = self.doc.from_config_list("km_opt", 4i64, nd);
        let damp_opt = self.doc.from_config("damp_opt", 0i64);
        let dampcoef = self.doc.from_config_list("dampcoef", 0.0, nd);

        let dynamics = self.doc.section("dynamics");
        dynamics.insert("diff_opt", diff_opt);
        dynamics.insert("km_opt", km_opt);
        dynamics.insert("damp_opt", damp_opt);
        dynamics.insert("dampcoef", dampcoef);
    }

    fn calc_physics(&mut self, layout: &GridLayout) -> Result<(), NamelistError> {
        let nd = self.doc.max_dom;
        let cfg = self.doc.config();

        let mp_physics = self.doc.from_config("mp_physics", 3i64); // WSM 3-class simple ice
        let cu_physics = self.doc.from_config("cu_physics", 1i64); // Kain-Fritsch (new Eta)
        let ra_lw_physics = self.doc.from_config("ra_lw_physics", 1i64); // RRTM
        let ra_sw_physics = self.doc.from_config("ra_sw_physics", 1i64); // Dudhia
        let bl_pbl_physics = self.doc.from_config("bl_pbl_physics", 1i64); // YSU
        let sf_sfclay_physics = self.doc.from_config("sf_sfclay_physics", 1i64); // revised MM5
        let sf_surface_physics = self.doc.from_config("sf_surface_physics", 2i64); // unified Noah

        // soil layer count implied by the land surface model
        let num_soil_layers = match sf_surface_physics {
            0 => 0,  // no LSM
            1 => 5,  // thermal diffusion
            2 => 4,  // unified Noah
            3 => 6,  // RUC
            4 => 4,  // Noah-MP
            5 => 10, // CLM4
            7 => 2,  // Pleim-Xiu
            8 => 3,  // SSiB
            other => return Err(NamelistError::UnknownSurfacePhysics(other)),
        };

        let num_land_cat = cfg.lookup("num_land_cat").ok();

        // radiation is called about once per kilometer of finest spacing
        let radt_default = (layout.dx.last().copied().unwrap_or(27000.0) / 1000.0).ceil() as i64;
        let radt = self.doc.from_config_list("radt", radt_default, nd);
        let cudt = self.doc.from_config_list("cudt", 0i64, nd);
        let bldt = self.doc.from_config_list("bldt", 0i64, nd);

        let physics = self.doc.section("physics");
        physics.insert("mp_physics", vec![mp_physics; nd]);
        physics.insert("cu_physics", vec![cu_physics; nd]);
        physics.insert("ra_lw_physics", vec![ra_lw_physics; nd]);
        physics.insert("ra_sw_physics", vec![ra_sw_physics; nd]);
        physics.insert("bl_pbl_physics", vec![bl_pbl_physics; nd]);
        physics.insert("sf_sfclay_physics", vec![sf_sfclay_physics; nd]);
        physics.insert("sf_surface_physics", vec![sf_surface_physics; nd]);
        if let Some(num_land_cat) = num_land_cat {
            physics.insert("num_land_cat", to_nml_value(&num_land_cat));
        }
        physics.insert("num_soil_layers", num_soil_layers);
        physics.insert("radt", radt);
        physics.insert("cudt", cudt);
        physics.insert("bldt", bldt);
        Ok(())
    }

    fn calc_diagnostics(&mut self) {
        let nd = self.doc.max_dom;
        let diagnostics = match self.doc.config().lookup("diagnostics") {
            Ok(Value::Mapping(mapping)) => mapping,
            _ => return,
        };

        if let Some(Value::Mapping(climate)) = map_get(&diagnostics, "climate") {
            if map_flag(climate, "activate") {
                let io_form = map_or(climate, "io_form", 2i64);
                let outname = map_or(climate, "outname", "wrfxtrm_d<domain>_<date>".to_string());
                let interval = map_list(climate, "interval", 1440i64, nd);
                let frames = map_list(climate, "frames_per_file", 999999i64, nd);

                let tc = self.doc.section("time_control");
                tc.insert("output_diagnostics", 1i64);
                tc.insert("io_form_auxhist3", io_form);
                tc.insert("auxhist3_outname", outname);
                tc.insert("auxhist3_interval", interval);
                tc.insert("frames_per_auxhist3", frames);
            }
        }

        if let Some(Value::Mapping(p_levels)) = map_get(&diagnostics, "p_levels") {
            if map_flag(p_levels, "activate") {
                let press_levels =
                    map_or(p_levels, "press_levels", vec![92500i64, 85000, 70000]);
                let extrap_below_grnd = map_or(p_levels, "extrap_below_grnd", 2i64);
                let io_form = map_or(p_levels, "io_form", 2i64);
                let outname = map_or(p_levels, "outname", "wrfplev_d<domain>_<date>".to_string());
                let interval = map_list(p_levels, "interval", 60i64, nd);
                let frames = map_list(p_levels, "frames_per_file", 999999i64, nd);

                let diags = self.doc.section("diags");
                diags.insert("p_lev_diags", 1i64);
                diags.insert("num_press_levels", press_levels.len());
                diags.insert("press_levels", press_levels);
                diags.insert("extrap_below_grnd", extrap_below_grnd);

                let tc = self.doc.section("time_control");
                tc.insert("io_form_auxhist23", io_form);
                tc.insert("auxhist23_outname", outname);
                tc.insert("auxhist23_interval", interval);
                tc.insert("frames_per_auxhist23", frames);
            }
        }

        if let Some(Value::Mapping(afwa)) = map_get(&diagnostics, "afwa") {
            self.doc.section("afwa");
            for diag in AFWA_DIAGS {
                let diag_value: Vec<i64> = map_list(afwa, diag, 0i64, nd);
                if !diag_value.iter().take(nd).any(|v| *v != 0) {
                    continue;
                }
                // activating any diag on a grid requires afwa_diag_opt there
                let section = self.doc.section("afwa");
                let mut diag_opt = section
                    .get_i64_vec("afwa_diag_opt")
                    .unwrap_or_else(|| diag_value.clone());
                if diag_opt.len() < diag_value.len() {
                    diag_opt.extend_from_slice(&diag_value[diag_opt.len()..]);
                }
                for (opt, value) in diag_opt.iter_mut().zip(&diag_value) {
                    *opt |= value;
                }
                section.insert("afwa_diag_opt", diag_opt);
                section.insert(&format!("afwa_{}_opt", diag), diag_value);
            }

            let activated = self.doc.group("afwa").map(|g| !g.is_empty()).unwrap_or(false);
            if activated {
                let outname = map_or(afwa, "outname", "wrfafwa_d<domain>_<date>".to_string());
                let interval = map_list(afwa, "interval", 60i64, nd);
                let tc = self.doc.section("time_control");
                tc.insert("io_form_auxhist2", 2i64);
                tc.insert("auxhist2_outname", outname);
                tc.insert("auxhist2_interval", interval);
            }
        }
    }

    fn calc_dfi(&mut self) {
        if self.dfi_opt == 0 {
            return;
        }
        let backward_m = self.doc.from_config("dfi_backward_m", 0i64);
        let foreward_m = self.doc.from_config("dfi_foreward_m", 0i64);

        let date_s = self.doc.date_s;
        let date_bck = advance_date(date_s, Duration::minutes(-backward_m));
        let date_fwd = advance_date(date_s, Duration::minutes(foreward_m));

        let dfi = self.doc.section("dfi_control");
        dfi.insert("dfi_opt", self.dfi_opt);
        dfi.insert("dfi_bckstop_year", date_bck.year() as i64);
        dfi.insert("dfi_bckstop_month", date_bck.month() as i64);
        dfi.insert("dfi_bckstop_day", date_bck.day() as i64);
        dfi.insert("dfi_bckstop_hour", date_bck.hour() as i64);
        dfi.insert("dfi_bckstop_minute", date_bck.minute() as i64);
        dfi.insert("dfi_fwdstop_year", date_fwd.year() as i64);
        dfi.insert("dfi_fwdstop_month", date_fwd.month() as i64);
        dfi.insert("dfi_fwdstop_day", date_fwd.day() as i64);
        dfi.insert("dfi_fwdstop_hour", date_fwd.hour() as i64);
        dfi.insert("dfi_fwdstop_minute", date_fwd.minute() as i64);
    }

    fn fine_domains(&self) -> Result<Vec<usize>, NamelistError> {
        let value = self.doc.config().lookup("ndown/fine_domains")?;
        let fine = Vec::<usize>::from_value(&value).unwrap_or_default();
        if fine.is_empty() {
            return Err(NamelistError::NoFineDomains);
        }
        Ok(fine)
    }

    /// Rebase the domain set on the first fine domain, which becomes the
    /// new root for the downscaled run.
    fn calc_downscale_real(&mut self, layout: &GridLayout) -> Result<(), NamelistError> {
        let fine = self.fine_domains()?;
        let first = fine[0];
        let nd_orig = self.doc.max_dom;
        let date_s = self.doc.date_s;

        let domains = self.doc.section("domains");
        let i_start = domains.get_i64_vec("i_parent_start").unwrap_or_default();
        let j_start = domains.get_i64_vec("j_parent_start").unwrap_or_default();
        let e_we = domains.get_i64_vec("e_we").unwrap_or_default();
        let e_sn = domains.get_i64_vec("e_sn").unwrap_or_default();
        let dx = domains.get_f64_vec("dx").unwrap_or_default();
        let dy = domains.get_f64_vec("dy").unwrap_or_default();
        let dt_start = domains.get_i64_vec("starting_time_step").unwrap_or_default();
        let dt_min = domains.get_i64_vec("min_time_step").unwrap_or_default();
        let dt_max = domains.get_i64_vec("max_time_step").unwrap_or_default();

        let parent_id: Vec<i64> = fine
            .iter()
            .map(|d| layout.parent_id[d - 1] - layout.parent_id[first - 1])
            .collect();
        let grid_ratio: Vec<i64> = fine
            .iter()
            .map(|d| layout.accumulated_gr[d - 1] / layout.accumulated_gr[first - 1])
            .collect();
        let dx_new: Vec<f64> = fine.iter().map(|d| dx[d - 1]).collect();
        let dy_new: Vec<f64> = fine.iter().map(|d| dy[d - 1]).collect();

        domains.insert("max_dom", fine.len());
        domains.insert("parent_id", parent_id);
        domains.insert("parent_grid_ratio", grid_ratio);
        domains.insert(
            "i_parent_start",
            fine.iter().map(|d| i_start[d - 1]).collect::<Vec<_>>(),
        );
        domains.insert(
            "j_parent_start",
            fine.iter().map(|d| j_start[d - 1]).collect::<Vec<_>>(),
        );
        domains.insert(
            "e_we",
            fine.iter().map(|d| e_we[d - 1]).collect::<Vec<_>>(),
        );
        domains.insert(
            "e_sn",
            fine.iter().map(|d| e_sn[d - 1]).collect::<Vec<_>>(),
        );
        domains.insert("time_step", calc_time_step(dx_new[0], TIME_STEP_INTERVAL_S));
        domains.insert("dx", dx_new);
        domains.insert("dy", dy_new);
        domains.insert(
            "starting_time_step",
            dt_start.get(first - 1..).unwrap_or_default().to_vec(),
        );
        domains.insert(
            "min_time_step",
            dt_min.get(first - 1..).unwrap_or_default().to_vec(),
        );
        domains.insert(
            "max_time_step",
            dt_max.get(first - 1..).unwrap_or_default().to_vec(),
        );

        // real only has forcing data at the start time; running it further
        // would require forcing for the whole inner period
        let tc = self.doc.section("time_control");
        tc.insert("end_year", vec![date_s.year() as i64; nd_orig]);
        tc.insert("end_month", vec![date_s.month() as i64; nd_orig]);
        tc.insert("end_day", vec![date_s.day() as i64; nd_orig]);
        tc.insert("end_hour", vec![date_s.hour() as i64; nd_orig]);
        Ok(())
    }

    /// Restrict to the first fine domain and its immediate parent, which is
    /// all ndown.exe consumes.
    fn calc_downscale_ndown(&mut self, layout: &GridLayout) -> Result<(), NamelistError> {
        let fine = self.fine_domains()?;
        let first = fine[0];
        let parent = usize::try_from(layout.parent_id[first - 1])
            .ok()
            .filter(|p| *p > 0)
            .ok_or(NamelistError::NoParentDomain(first))?;

        if self.doc.date_s == self.doc.date_e {
            // a degenerate window would leave ndown without a wrfbdy_d02
            self.doc.date_e = advance_date(self.doc.date_e, Duration::hours(1));
        }
        let date_s = self.doc.date_s;
        let date_e = self.doc.date_e;

        let domains = self.doc.section("domains");
        let grid_ratio = domains.get_i64_vec("parent_grid_ratio").unwrap_or_default();
        let i_start = domains.get_i64_vec("i_parent_start").unwrap_or_default();
        let j_start = domains.get_i64_vec("j_parent_start").unwrap_or_default();
        let e_we = domains.get_i64_vec("e_we").unwrap_or_default();
        let e_sn = domains.get_i64_vec("e_sn").unwrap_or_default();
        let dx = domains.get_f64_vec("dx").unwrap_or_default();
        let dy = domains.get_f64_vec("dy").unwrap_or_default();

        domains.insert("max_dom", 2i64);
        domains.insert("parent_id", vec![0i64, 1]);
        domains.insert("parent_grid_ratio", vec![1, grid_ratio[first - 1]]);
        domains.insert("i_parent_start", vec![1, i_start[first - 1]]);
        domains.insert("j_parent_start", vec![1, j_start[first - 1]]);
        domains.insert("e_we", vec![e_we[parent - 1], e_we[first - 1]]);
        domains.insert("e_sn", vec![e_sn[parent - 1], e_sn[first - 1]]);
        domains.insert("dx", vec![dx[parent - 1], dx[first - 1]]);
        domains.insert("dy", vec![dy[parent - 1], dy[first - 1]]);

        let tc = self.doc.section("time_control");
        tc.insert("start_year", vec![date_s.year() as i64; 2]);
        tc.insert("start_month", vec![date_s.month() as i64; 2]);
        tc.insert("start_day", vec![date_s.day() as i64; 2]);
        tc.insert("start_hour", vec![date_s.hour() as i64; 2]);
        tc.insert("end_year", vec![date_e.year() as i64; 2]);
        tc.insert("end_month", vec![date_e.month() as i64; 2]);
        tc.insert("end_day", vec![date_e.day() as i64; 2]);
        tc.insert("end_hour", vec![date_e.hour() as i64; 2]);

        let current = tc.get_i64("interval_seconds").unwrap_or(10800);
        let interval = self
            .doc
            .config()
            .lookup_or("ndown/interval_seconds", current);
        self.doc
            .section("time_control")
            .insert("interval_seconds", interval);
        Ok(())
    }

    /// WRF aborts during digital filter initialization when a tracer
    /// advection option is above 1.
    fn calc_dfi_advection_fix(&mut self) -> Result<(), NamelistError> {
        let nd = self.fine_domains()?.len();
        let dynamics = self.doc.section("dynamics");
        for option in ADVECTION_OPTIONS {
            dynamics.insert(option, vec![1i64; nd]);
        }
        Ok(())
    }

    /// The continuation run integrates to the true end date and feeds the
    /// nested domains from the downscaled input stream.
    fn calc_continuation(&mut self) -> Result<(), NamelistError> {
        let nd = self.fine_domains()?.len();
        let date_e = self.doc.date_e;

        let tc = self.doc.section("time_control");
        tc.insert("end_year", vec![date_e.year() as i64; nd]);
        tc.insert("end_month", vec![date_e.month() as i64; nd]);
        tc.insert("end_day", vec![date_e.day() as i64; nd]);
        tc.insert("end_hour", vec![date_e.hour() as i64; nd]);

        let current = tc.get_i64("interval_seconds").unwrap_or(10800);
        let interval = self
            .doc
            .config()
            .lookup_or("ndown/interval_seconds", current);

        let mut fine_input_stream = vec![0i64];
        fine_input_stream.extend(std::iter::repeat(2i64).take(nd.saturating_sub(1).max(1)));

        let tc = self.doc.section("time_control");
        tc.insert("interval_seconds", interval);
        tc.insert("fine_input_stream", fine_input_stream);

        // DFI already ran in the coarse stage
        self.dfi_opt = 0;
        Ok(())
    }
}

/// Model time step for a grid spacing, as the largest value not above the
/// physical estimate `5 * dx / 1000` seconds that divides the output
/// interval evenly, so history writes align with integration boundaries.
pub fn calc_time_step(dx: f64, interval_s: i64) -> i64 {
    let target = 5.0 * dx / 1000.0;
    let mut k = ((interval_s as f64 / target).ceil() as i64).max(1);
    while (interval_s as f64 / k as f64) - ((interval_s / k) as f64) > 1e-12 {
        k += 1;
    }
    interval_s / k
}

/// Eta levels from 1.0 down to 0.0 on a cubic Hermite spline blend.
pub fn compute_eta_levels(n_levels: usize) -> Vec<f64> {
    const M0: f64 = 0.7;
    const M1: f64 = 0.6;
    const N0: f64 = -0.2;
    const N1: f64 = -0.275;

    let h00 = |t: f64| 2.0 * t * t * t - 3.0 * t * t + 1.0;
    let h01 = |t: f64| t * t * (3.0 - 2.0 * t);
    let h10 = |t: f64| t * (t * t - 2.0 * t + 1.0);
    let h11 = |t: f64| t * t * (t - 1.0);

    (0..n_levels)
        .map(|i| {
            let x = i as f64 / (n_levels - 1) as f64;
            let fc = h01(x) + M0 * h10(x) + M1 * h11(x);
            h00(fc) + N0 * h10(x) + N1 * h11(x)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_step_divides_interval() {
        for (dx, interval) in [(27000.0, 10800i64), (27000.0, 3600), (9000.0, 10800)] {
            let step = calc_time_step(dx, interval);
            assert!(step > 0);
            assert_eq!(interval % step, 0, "dx={} interval={}", dx, interval);
            // never above the physical estimate
            assert!((step as f64) <= (5.0 * dx / 1000.0).ceil());
        }
    }

    #[test]
    fn test_time_step_values() {
        // 5 * 27 = 135 s target; 10800 s splits into 80 exact steps
        assert_eq!(calc_time_step(27000.0, 10800), 135);
        // 3600 is not divisible by 135; the search lands on 120
        assert_eq!(calc_time_step(27000.0, 3600), 120);
    }

    #[test]
    fn test_eta_levels_shape() {
        let levels = compute_eta_levels(41);
        assert_eq!(levels.len(), 41);
        assert!((levels[0] - 1.0).abs() < 1e-12);
        assert!(levels[40].abs() < 1e-12);
        for pair in levels.windows(2) {
            assert!(pair[1] < pair[0], "levels must strictly decrease");
        }
    }
}
