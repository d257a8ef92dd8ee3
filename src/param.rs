use crate::error::{Result, SearchError};
use crate::pareto::ParetoStrategy;
use crate::problem::SearchMode;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// Field definitions and associated default values

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub ga: GA,
    #[serde(default)]
    pub cv: CV,
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub hyperparams: Hyperparams,
    #[serde(default)]
    pub structure: Structure,
    #[serde(default)]
    pub pareto: Pareto,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct General {
    #[serde(default = "seed_default")]
    pub seed: u64,
    /// Comma separated list of modes (`features`, `params`, `structure`, `pareto`) or `all`
    #[serde(default = "mode_default")]
    pub mode: String,
    /// `fast` or `full`, empty to keep the values of the file
    #[serde(default = "empty_string")]
    pub preset: String,
    /// 0 lets rayon pick the number of available cores
    #[serde(default = "uzero_default")]
    pub thread_number: usize,
    #[serde(default = "log_base_default")]
    pub log_base: String,
    #[serde(default = "log_suffix_default")]
    pub log_suffix: String,
    #[serde(default = "log_level_default")]
    pub log_level: String,
    #[serde(default = "true_default")]
    pub display_colorful: bool,
    #[serde(default = "empty_string")]
    pub save_exp: String,
    #[serde(default = "empty_string")]
    pub export_csv: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Data {
    /// Key of the dataset to load, looked up in `datasets`
    #[serde(default = "dataset_default")]
    pub dataset: String,
    #[serde(default = "datasets_default")]
    pub datasets: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GA {
    #[serde(default = "pop_size_default")]
    pub population_size: usize,
    #[serde(default = "n_gen_default")]
    pub n_gen: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CV {
    #[serde(default = "splits_default")]
    pub splits: usize,
    #[serde(default = "max_iter_default")]
    pub max_iter: usize,
    #[serde(default = "uzero_u64_default")]
    pub model_seed: u64,
    #[serde(default = "batch_size_default")]
    pub batch_size: usize,
    #[serde(default = "tol_default")]
    pub tol: f64,
    #[serde(default = "n_iter_no_change_default")]
    pub n_iter_no_change: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Features {
    #[serde(default = "feature_hidden_layer_default")]
    pub hidden_layer: usize,
    #[serde(default = "features_mutation_default")]
    pub mutation_rate: f64,
    /// 0 samples parents from the whole scored population
    #[serde(default = "uzero_default")]
    pub parent_pool: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Hyperparams {
    #[serde(default = "hidden_min_default")]
    pub hidden_min: usize,
    #[serde(default = "hidden_max_default")]
    pub hidden_max: usize,
    /// When not empty, hidden widths are drawn from this list instead of the range
    #[serde(default = "empty_usize_vec")]
    pub hidden_choices: Vec<usize>,
    /// Base-10 exponents bounding the learning rate
    #[serde(default = "lr_log_range_default")]
    pub lr_log_range: (f64, f64),
    #[serde(default = "empty_f64_vec")]
    pub lr_choices: Vec<f64>,
    /// Base-10 exponents bounding the L2 penalty
    #[serde(default = "alpha_log_range_default")]
    pub alpha_log_range: (f64, f64),
    #[serde(default = "empty_f64_vec")]
    pub alpha_choices: Vec<f64>,
    #[serde(default = "tuple_mutation_default")]
    pub mutation_rate: f64,
    #[serde(default = "parent_pool_default")]
    pub parent_pool: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Structure {
    #[serde(default = "one_default")]
    pub min_layers: usize,
    #[serde(default = "max_layers_default")]
    pub max_layers: usize,
    #[serde(default = "width_min_default")]
    pub width_min: usize,
    #[serde(default = "width_max_default")]
    pub width_max: usize,
    #[serde(default = "tuple_mutation_default")]
    pub mutation_rate: f64,
    #[serde(default = "parent_pool_default")]
    pub parent_pool: usize,
    #[serde(default = "false_default")]
    pub force_novelty: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Pareto {
    #[serde(default = "pareto_mutation_default")]
    pub mutation_rate: f64,
    #[serde(default = "true_default")]
    pub force_novelty: bool,
    #[serde(default = "pareto_strategy_default")]
    pub strategy: ParetoStrategy,
}

// Default section definitions

impl Default for General {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Data {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for GA {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for CV {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Features {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Hyperparams {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Structure {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Pareto {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Param {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Param {
    /// Modes requested by `general.mode`, in the order they were listed.
    pub fn modes(&self) -> Result<Vec<SearchMode>> {
        if self.general.mode.trim() == "all" {
            return Ok(SearchMode::all().to_vec());
        }
        self.general
            .mode
            .split(',')
            .map(|m| m.trim().parse::<SearchMode>())
            .collect()
    }

    /// Overrides the GA budget with one of the two reference presets.
    ///
    /// `fast` is meant for demonstrations (tiny populations, few iterations),
    /// `full` for results worth reporting.
    pub fn apply_preset(&mut self, preset: &str) -> Result<()> {
        match preset {
            "fast" => {
                self.ga.population_size = 5;
                self.ga.n_gen = 5;
                self.features.mutation_rate = 0.2;
                self.cv.splits = 2;
                self.cv.max_iter = 50;
                self.hyperparams.hidden_min = 8;
                self.hyperparams.hidden_max = 32;
                self.hyperparams.lr_log_range = (-3.5, -2.0);
                self.hyperparams.alpha_log_range = (-5.0, -3.0);
            }
            "full" => {
                self.ga.population_size = 10;
                self.ga.n_gen = 20;
                self.features.mutation_rate = 0.1;
                self.cv.splits = 3;
                self.cv.max_iter = 200;
                self.hyperparams.hidden_min = 16;
                self.hyperparams.hidden_max = 128;
                self.hyperparams.lr_log_range = (-4.0, -2.0);
                self.hyperparams.alpha_log_range = (-6.0, -3.0);
            }
            other => {
                return Err(SearchError::InvalidConfig(format!(
                    "Unknown preset '{}' (expected 'fast' or 'full')",
                    other
                )))
            }
        }
        info!("Preset '{}' applied", preset);
        Ok(())
    }
}

/// Reads a parameter file (YAML, or TOML when the extension is `.toml`) and validates it.
pub fn get<P: AsRef<Path>>(param_file: P) -> Result<Param> {
    let path = param_file.as_ref();
    let content = fs::read_to_string(path)?;

    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    let mut config: Param = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };

    validate(&mut config)?;

    Ok(config)
}

/// Applies the preset and the display overrides, then checks the result.
pub fn validate(param: &mut Param) -> Result<()> {
    if !param.general.log_base.is_empty() {
        param.general.display_colorful = false;
    }

    if !param.general.preset.is_empty() {
        let preset = param.general.preset.clone();
        param.apply_preset(&preset)?;
    }

    param.check()
}

impl Param {
    /// Rejects parameters a search cannot run with. Never modifies `self`.
    pub fn check(&self) -> Result<()> {
        self.modes()?;

        if self.ga.population_size == 0 {
            return Err(SearchError::InvalidConfig(
                "population_size must be > 0".to_string(),
            ));
        }

        if self.ga.n_gen == 0 {
            return Err(SearchError::InvalidConfig("n_gen must be > 0".to_string()));
        }

        if self.ga.population_size == 1 {
            warn!("population_size=1: the champion is the only individual, no child will ever be bred.");
        }

        validate_cv(self)?;
        validate_rates(self)?;
        validate_hyperparams(self)?;
        validate_structure(self)?;

        Ok(())
    }
}

fn validate_cv(param: &Param) -> Result<()> {
    if param.cv.splits < 2 {
        return Err(SearchError::InvalidConfig(format!(
            "Invalid cv.splits={}. Must be >= 2.",
            param.cv.splits
        )));
    }

    if param.cv.max_iter == 0 {
        return Err(SearchError::InvalidConfig(
            "cv.max_iter must be > 0".to_string(),
        ));
    }

    if param.cv.batch_size == 0 {
        return Err(SearchError::InvalidConfig(
            "cv.batch_size must be > 0".to_string(),
        ));
    }

    if param.cv.tol < 0.0 {
        return Err(SearchError::InvalidConfig(format!(
            "Invalid cv.tol={:.3e}. Must be >= 0.",
            param.cv.tol
        )));
    }

    Ok(())
}

fn validate_rates(param: &Param) -> Result<()> {
    let rates = [
        ("features.mutation_rate", param.features.mutation_rate),
        ("hyperparams.mutation_rate", param.hyperparams.mutation_rate),
        ("structure.mutation_rate", param.structure.mutation_rate),
        ("pareto.mutation_rate", param.pareto.mutation_rate),
    ];

    for (name, rate) in rates {
        if !(0.0..=1.0).contains(&rate) {
            return Err(SearchError::InvalidConfig(format!(
                "Invalid {}={:.3}. Must be in range [0, 1].",
                name, rate
            )));
        }
    }

    let pools = [
        ("features.parent_pool", param.features.parent_pool),
        ("hyperparams.parent_pool", param.hyperparams.parent_pool),
        ("structure.parent_pool", param.structure.parent_pool),
    ];

    for (name, pool) in pools {
        if pool > param.ga.population_size {
            warn!(
                "{}={} exceeds population_size={}: parents will be drawn from the whole population.",
                name, pool, param.ga.population_size
            );
        }
    }

    if param.features.hidden_layer == 0 {
        return Err(SearchError::InvalidConfig(
            "features.hidden_layer must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_hyperparams(param: &Param) -> Result<()> {
    let hp = &param.hyperparams;

    if hp.hidden_choices.is_empty() {
        if hp.hidden_min == 0 || hp.hidden_min > hp.hidden_max {
            return Err(SearchError::InvalidConfig(format!(
                "Invalid hidden range [{}, {}]. Expected 0 < hidden_min <= hidden_max.",
                hp.hidden_min, hp.hidden_max
            )));
        }
    } else if hp.hidden_choices.iter().any(|&h| h == 0) {
        return Err(SearchError::InvalidConfig(
            "hidden_choices must only contain positive widths".to_string(),
        ));
    }

    for (name, range, choices) in [
        ("lr", hp.lr_log_range, &hp.lr_choices),
        ("alpha", hp.alpha_log_range, &hp.alpha_choices),
    ] {
        if choices.is_empty() {
            if !(range.0.is_finite() && range.1.is_finite()) || range.0 > range.1 {
                return Err(SearchError::InvalidConfig(format!(
                    "Invalid {}_log_range ({}, {}).",
                    name, range.0, range.1
                )));
            }
        } else if choices.iter().any(|&c| !(c > 0.0) || !c.is_finite()) {
            return Err(SearchError::InvalidConfig(format!(
                "{}_choices must only contain positive finite values",
                name
            )));
        }
    }

    Ok(())
}

fn validate_structure(param: &Param) -> Result<()> {
    let st = &param.structure;

    if st.min_layers == 0 || st.min_layers > st.max_layers || st.max_layers > 3 {
        return Err(SearchError::InvalidConfig(format!(
            "Invalid layer count range [{}, {}]. Expected 1 <= min_layers <= max_layers <= 3.",
            st.min_layers, st.max_layers
        )));
    }

    if st.width_min == 0 || st.width_min > st.width_max {
        return Err(SearchError::InvalidConfig(format!(
            "Invalid width range [{}, {}]. Expected 0 < width_min <= width_max.",
            st.width_min, st.width_max
        )));
    }

    if st.width_min == st.width_max && (st.force_novelty || param.pareto.force_novelty) {
        warn!("A single layer width is allowed: forced novelty can only change architectures through their depth.");
    }

    Ok(())
}

// Default value definitions

fn seed_default() -> u64 {
    123
}
fn mode_default() -> String {
    "features".to_string()
}
fn empty_string() -> String {
    "".to_string()
}
fn log_base_default() -> String {
    "".to_string()
}
fn log_suffix_default() -> String {
    "log".to_string()
}
fn log_level_default() -> String {
    "info".to_string()
}
fn dataset_default() -> String {
    "s1".to_string()
}
fn datasets_default() -> BTreeMap<String, String> {
    [
        ("s1", "data/s1_hourly.csv"),
        ("s2", "data/s2_daily.csv"),
        ("s3", "data/s3_hourly_vre.csv"),
        ("s4", "data/s4_shift.csv"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
fn pop_size_default() -> usize {
    8
}
fn n_gen_default() -> usize {
    5
}
fn splits_default() -> usize {
    3
}
fn max_iter_default() -> usize {
    200
}
fn batch_size_default() -> usize {
    200
}
fn tol_default() -> f64 {
    1e-4
}
fn n_iter_no_change_default() -> usize {
    10
}
fn feature_hidden_layer_default() -> usize {
    32
}
fn features_mutation_default() -> f64 {
    0.2
}
fn tuple_mutation_default() -> f64 {
    0.3
}
fn pareto_mutation_default() -> f64 {
    0.6
}
fn parent_pool_default() -> usize {
    5
}
fn hidden_min_default() -> usize {
    16
}
fn hidden_max_default() -> usize {
    64
}
fn lr_log_range_default() -> (f64, f64) {
    (-4.0, -2.0)
}
fn alpha_log_range_default() -> (f64, f64) {
    (-6.0, -3.0)
}
fn max_layers_default() -> usize {
    3
}
fn width_min_default() -> usize {
    8
}
fn width_max_default() -> usize {
    64
}
fn pareto_strategy_default() -> ParetoStrategy {
    ParetoStrategy::cumulative
}
fn empty_usize_vec() -> Vec<usize> {
    Vec::new()
}
fn empty_f64_vec() -> Vec<f64> {
    Vec::new()
}
fn false_default() -> bool {
    false
}
fn true_default() -> bool {
    true
}
fn uzero_default() -> usize {
    0
}
fn uzero_u64_default() -> u64 {
    0
}
fn one_default() -> usize {
    1
}
