use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_ENV: &str = "ATLAS_IMPORT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "atlas_import.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImportConfig {
    pub database: PathBuf,
    pub batch_size: NonZeroUsize,
    /// Inclusive range of population years kept for department-year.
    pub population_years: (i64, i64),
    pub classifications: ClassificationPaths,
    pub datasets: DatasetPaths,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassificationPaths {
    pub product: PathBuf,
    pub location: PathBuf,
    pub industry: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatasetPaths {
    pub trade: PathBuf,
    pub gdp: PathBuf,
    pub population: PathBuf,
    pub employment_department: PathBuf,
    pub employment_municipality: PathBuf,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("atlas.db"),
            batch_size: NonZeroUsize::new(10_000).unwrap_or(NonZeroUsize::MIN),
            population_years: (2007, 2013),
            classifications: ClassificationPaths::default(),
            datasets: DatasetPaths::default(),
        }
    }
}

impl Default for ClassificationPaths {
    fn default() -> Self {
        Self {
            product: PathBuf::from("product/HS/Atlas/out/hs92_atlas.csv"),
            location: PathBuf::from("location/Colombia/DANE/out/locations_colombia_dane.csv"),
            industry: PathBuf::from("industry/ISIC/Colombia/out/isic_ac_3.0.csv"),
        }
    }
}

impl Default for DatasetPaths {
    fn default() -> Self {
        Self {
            trade: PathBuf::from("data/Aduanas/exp_ecomplexity_dpto.csv"),
            gdp: PathBuf::from("data/metadata/COL_nomrealgdp_dept_annual1990-2012.csv"),
            population: PathBuf::from("data/metadata/COL_pop_deptmunicip_1985-2012.csv"),
            employment_department: PathBuf::from(
                "data/PILA/COL_PILA_ecomp-E_yir_2008-2012_rev3_dpto.csv",
            ),
            employment_municipality: PathBuf::from(
                "data/PILA/COL_PILA_ecomp-E_yir_2008-2012_rev3_mun.csv",
            ),
        }
    }
}

impl ImportConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reads the file at `path`; a missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Resolves the config path from `ATLAS_IMPORT_CONFIG`, falling back to
    /// `atlas_import.toml` in the working directory.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }
}
