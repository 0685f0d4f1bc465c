use crate::classification::{merge_to_table, Classification};
use crate::config::ImportConfig;
use crate::error::Result;
use crate::facets::{first_by, process_cpy};
use crate::frame::{
    cut_columns, fillin, mapped_columns, read_table, translate_columns, zfill_code, ColumnMap,
};
use crate::models::{classification_to_models, ModelTable};
use crate::pl_sql::{Database, SqlWriter, SqliteColOption, SqliteDataType, SqliteSchema};
use polars::prelude::*;
use tracing::info;

pub const ADUANAS_TO_ATLAS: &ColumnMap = &[
    ("r", "department"),
    ("p", "product"),
    ("yr", "year"),
    ("X_rpy_p", "export_value"),
    ("density_natl", "density"),
    ("eci_natl", "eci"),
    ("pci", "pci"),
    ("coi_natl", "coi"),
    ("cog_natl", "cog"),
    ("RCA_natl", "export_rca"),
];

pub const GDP_TO_ATLAS: &ColumnMap = &[
    ("depcode", "department"),
    ("depgdpn", "gdp_nominal"),
    ("gdpkmultipliedbydeflator", "gdp_real"),
    ("year", "year"),
];

pub const POP_TO_ATLAS: &ColumnMap = &[
    ("year", "year"),
    ("dp", "department"),
    ("popdept", "population"),
];

pub const PILA_TO_ATLAS: &ColumnMap = &[
    ("r", "department"),
    ("i", "industry"),
    ("year", "year"),
    ("E_yir", "employment"),
    ("W_yir", "wages"),
    ("rca", "rca"),
    ("density", "density"),
    ("cog", "cog"),
    ("coi", "coi"),
    ("pci", "complexity"),
];

pub const PILA_TO_ATLAS_MUNI: &ColumnMap = &[
    ("r", "municipality"),
    ("i", "industry"),
    ("year", "year"),
    ("E_yir", "employment"),
    ("W_yir", "wages"),
    ("rca", "rca"),
    ("density", "density"),
    ("cog", "cog"),
    ("coi", "coi"),
    ("pci", "complexity"),
];

const INDUSTRY_FIELDS: [&str; 6] = ["employment", "wages", "rca", "density", "cog", "coi"];
const GDP_SCALE: f64 = 1_000_000.0;
const CPY_KEYS: [&str; 3] = ["department_id", "product_id", "year"];
const IY_KEYS: [&str; 2] = ["industry_id", "year"];
const DIY_KEYS: [&str; 3] = ["department_id", "industry_id", "year"];
const MIY_KEYS: [&str; 3] = ["municipality_id", "industry_id", "year"];

/// The three classifications every dataset is merged against.
#[derive(Debug, Clone)]
pub struct Classifications {
    pub product: Classification,
    pub location: Classification,
    pub industry: Classification,
}

impl Classifications {
    pub fn load(config: &ImportConfig) -> Result<Self> {
        Ok(Self {
            product: Classification::load(&config.classifications.product)?,
            location: Classification::load(&config.classifications.location)?,
            industry: Classification::load(&config.classifications.industry)?,
        })
    }

    /// Stores every classification entry in its model table.
    pub fn store(&self, db: &Database) -> Result<()> {
        for (table, classification) in [
            (ModelTable::Product, &self.product),
            (ModelTable::Location, &self.location),
            (ModelTable::Industry, &self.industry),
        ] {
            let models = classification_to_models(classification)?;
            db.add_all(table, &models)?;
        }
        Ok(())
    }
}

fn source_columns(mapping: &ColumnMap, targets: &[&str]) -> Vec<&'static str> {
    mapping
        .iter()
        .filter(|(_, target)| targets.contains(target))
        .map(|(source, _)| *source)
        .collect()
}

/// Append writer for a facet table whose `keys` are integer and never null.
fn writer<'a>(db: &'a Database, config: &ImportConfig, table: &str, keys: &[&str]) -> SqlWriter<'a> {
    let mut schema = SqliteSchema::default();
    for key in keys {
        schema.with_column(
            *key,
            SqliteColOption::default()
                .with_type_sql(SqliteDataType::INTEGER)
                .with_nullable(false),
        );
    }
    SqlWriter::new(db, table)
        .with_batch_size(config.batch_size)
        .with_schema(Some(schema))
}

/// Department trade frame: translated, product codes padded to 4 digits,
/// completed over (department, product, year) and merged to ids.
pub fn prepare_trade(df: &DataFrame, classifications: &Classifications) -> Result<DataFrame> {
    let df = translate_columns(df, ADUANAS_TO_ATLAS)?;
    let df = cut_columns(&df, &mapped_columns(ADUANAS_TO_ATLAS))?;
    let df = df
        .lazy()
        .with_column(col("year").cast(DataType::Int64))
        .collect()?;
    let df = zfill_code(df, "product", 4)?;
    let df = zfill_code(df, "department", 2)?;

    let df = fillin(&df, &["department", "product", "year"])?;

    let products = classifications.product.level("4digit")?;
    let departments = classifications.location.level("department")?;
    let df = merge_to_table(&products, "product_id", &df, "product")?.frame;
    let df = merge_to_table(&departments, "department_id", &df, "department")?.frame;
    Ok(df)
}

pub fn prepare_gdp(df: &DataFrame) -> Result<DataFrame> {
    let df = translate_columns(df, GDP_TO_ATLAS)?;
    let df = cut_columns(&df, &mapped_columns(GDP_TO_ATLAS))?;
    let df = df
        .lazy()
        .with_columns([
            col("year").cast(DataType::Int64),
            (col("gdp_real").cast(DataType::Float64) * lit(GDP_SCALE)).alias("gdp_real"),
            (col("gdp_nominal").cast(DataType::Float64) * lit(GDP_SCALE)).alias("gdp_nominal"),
        ])
        .collect()?;
    zfill_code(df, "department", 2)
}

/// First population per (department, year), within `years` inclusive.
pub fn prepare_population(df: &DataFrame, years: (i64, i64)) -> Result<DataFrame> {
    let df = translate_columns(df, POP_TO_ATLAS)?;
    let df = cut_columns(&df, &mapped_columns(POP_TO_ATLAS))?;
    let df = df
        .lazy()
        .with_column(col("year").cast(DataType::Int64))
        .collect()?;
    let df = zfill_code(df, "department", 2)?;
    let df = first_by(&df, &["department", "year"], &["population"])?;
    Ok(df
        .lazy()
        .filter(
            col("year")
                .gt_eq(lit(years.0))
                .and(col("year").lt_eq(lit(years.1))),
        )
        .collect()?)
}

/// Department-year facet joined with GDP and population, per-capita GDP
/// derived and the department code dropped.
pub fn department_year(cy: &DataFrame, gdp: &DataFrame, population: &DataFrame) -> Result<DataFrame> {
    let on = [col("department"), col("year")];
    let joined = cy
        .clone()
        .lazy()
        .join(
            gdp.clone().lazy(),
            on.clone(),
            on.clone(),
            JoinArgs::new(JoinType::Left),
        )
        .join(
            population.clone().lazy(),
            on.clone(),
            on,
            JoinArgs::new(JoinType::Left),
        )
        .with_columns([
            (col("gdp_real") / col("population").cast(DataType::Float64)).alias("gdp_pc_real"),
            (col("gdp_nominal") / col("population").cast(DataType::Float64))
                .alias("gdp_pc_nominal"),
        ])
        .collect()?;
    Ok(joined.drop("department")?)
}

/// Industry frame: rows without an industry (".") dropped, completed over
/// (`location`, industry, year) and merged to ids at `location_level`.
pub fn prepare_industry(
    df: &DataFrame,
    mapping: &ColumnMap,
    classifications: &Classifications,
    location: &str,
    location_level: &str,
) -> Result<DataFrame> {
    let df = translate_columns(df, mapping)?;
    let df = cut_columns(&df, &mapped_columns(mapping))?;
    let df = df
        .lazy()
        .with_columns([
            col("year").cast(DataType::Int64),
            col("industry").cast(DataType::String),
            col(location).cast(DataType::String),
        ])
        .filter(col("industry").neq(lit(".")))
        .collect()?;

    let df = fillin(&df, &[location, "industry", "year"])?;

    let industries = classifications.industry.level("class")?;
    let locations = classifications.location.level(location_level)?;
    let location_id = format!("{}_id", location);
    let df = merge_to_table(&industries, "industry_id", &df, "industry")?.frame;
    let df = merge_to_table(&locations, &location_id, &df, location)?.frame;
    Ok(df)
}

/// Department-product-year: writes `product_year`, `department_year` and
/// `department_product_year`.
pub fn import_trade(db: &Database, config: &ImportConfig, classifications: &Classifications) -> Result<()> {
    let text = ["department", "product"];
    let raw = read_table(&config.datasets.trade, &source_columns(ADUANAS_TO_ATLAS, &text))?;
    let df = prepare_trade(&raw, classifications)?;
    info!(rows = df.height(), "trade prepared");
    let facets = process_cpy(&df)?;

    writer(db, config, "product_year", &["product_id", "year"]).finish(&facets.py)?;

    let gdp = read_table(
        &config.datasets.gdp,
        &source_columns(GDP_TO_ATLAS, &["department"]),
    )?;
    let gdp = prepare_gdp(&gdp)?;
    let population = read_table(
        &config.datasets.population,
        &source_columns(POP_TO_ATLAS, &["department"]),
    )?;
    let population = prepare_population(&population, config.population_years)?;
    let cy = department_year(&facets.cy, &gdp, &population)?;
    writer(db, config, "department_year", &["year"]).finish(&cy)?;

    writer(db, config, "department_product_year", &CPY_KEYS).finish(&facets.cpy)?;
    Ok(())
}

/// Department-industry-year: writes `industry_year` and
/// `department_industry_year`.
pub fn import_department_industry(
    db: &Database,
    config: &ImportConfig,
    classifications: &Classifications,
) -> Result<()> {
    let text = ["department", "industry"];
    let raw = read_table(
        &config.datasets.employment_department,
        &source_columns(PILA_TO_ATLAS, &text),
    )?;
    let df = prepare_industry(&raw, PILA_TO_ATLAS, classifications, "department", "department")?;
    info!(rows = df.height(), "department industry prepared");

    let iy = first_by(&df, &IY_KEYS, &["complexity"])?;
    writer(db, config, "industry_year", &IY_KEYS).finish(&iy)?;

    let diy = first_by(&df, &DIY_KEYS, &INDUSTRY_FIELDS)?;
    writer(db, config, "department_industry_year", &DIY_KEYS).finish(&diy)?;
    Ok(())
}

/// Municipality-industry-year: writes `municipality_industry_year`.
pub fn import_municipality_industry(
    db: &Database,
    config: &ImportConfig,
    classifications: &Classifications,
) -> Result<()> {
    let text = ["municipality", "industry"];
    let raw = read_table(
        &config.datasets.employment_municipality,
        &source_columns(PILA_TO_ATLAS_MUNI, &text),
    )?;
    let df = prepare_industry(
        &raw,
        PILA_TO_ATLAS_MUNI,
        classifications,
        "municipality",
        "municipality",
    )?;
    info!(rows = df.height(), "municipality industry prepared");

    let miy = first_by(&df, &MIY_KEYS, &INDUSTRY_FIELDS)?;
    writer(db, config, "municipality_industry_year", &MIY_KEYS).finish(&miy)?;
    Ok(())
}

/// Full import in source order: classifications first, then every dataset.
pub fn run(db: &Database, config: &ImportConfig) -> Result<()> {
    let classifications = Classifications::load(config)?;
    classifications.store(db)?;
    import_trade(db, config, &classifications)?;
    import_department_industry(db, config, &classifications)?;
    import_municipality_industry(db, config, &classifications)?;
    info!("import finished");
    Ok(())
}
