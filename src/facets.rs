use crate::error::Result;
use crate::frame::key_exprs;
use polars::prelude::*;

pub const CY_FIELDS: [&str; 3] = ["department_id", "eci", "diversity"];
pub const PY_FIELDS: [&str; 1] = ["pci"];
pub const CPY_FIELDS: [&str; 6] = [
    "export_value",
    "import_value",
    "export_rca",
    "density",
    "cog",
    "coi",
];

/// Department-year, product-year and department-product-year facets of a
/// trade frame.
#[derive(Debug, Clone)]
pub struct CpyFacets {
    pub cy: DataFrame,
    pub py: DataFrame,
    pub cpy: DataFrame,
}

fn without_null_keys(df: &DataFrame, keys: &[&str]) -> LazyFrame {
    let mut lf = df.clone().lazy();
    for key in keys {
        lf = lf.filter(col(*key).is_not_null());
    }
    lf
}

fn present<'a>(df: &DataFrame, columns: &[&'a str]) -> Vec<&'a str> {
    let names = df.get_column_names_str();
    columns
        .iter()
        .copied()
        .filter(|c| names.contains(c))
        .collect()
}

fn aggregate(df: &DataFrame, keys: &[&str], aggs: Vec<Expr>) -> Result<DataFrame> {
    Ok(without_null_keys(df, keys)
        .group_by(key_exprs(keys))
        .agg(aggs)
        .sort_by_exprs(key_exprs(keys), SortMultipleOptions::default())
        .collect()?)
}

/// One row per distinct key tuple holding the first non-null value of each
/// column in `values`, in row order. NaN counts as missing in float columns.
/// Rows with a null key are left out.
pub fn first_by(df: &DataFrame, keys: &[&str], values: &[&str]) -> Result<DataFrame> {
    let schema = df.schema();
    let aggs = values
        .iter()
        .map(|v| match schema.get(*v) {
            Some(dtype) if dtype.is_float() => col(*v)
                .filter(col(*v).is_not_null().and(col(*v).is_not_nan()))
                .first(),
            _ => col(*v).drop_nulls().first(),
        })
        .collect();
    aggregate(df, keys, aggs)
}

/// One row per distinct key tuple holding the sum of each column in
/// `values`.
pub fn sum_by(df: &DataFrame, keys: &[&str], values: &[&str]) -> Result<DataFrame> {
    let aggs = values.iter().map(|v| col(*v).sum()).collect();
    aggregate(df, keys, aggs)
}

/// Splits a department-product-year frame (with `department`,
/// `department_id`, `product_id` and `year`) into its facets. Data columns
/// the frame lacks are skipped.
pub fn process_cpy(df: &DataFrame) -> Result<CpyFacets> {
    let cy = first_by(df, &["department", "year"], &present(df, &CY_FIELDS))?;
    let py = first_by(df, &["product_id", "year"], &present(df, &PY_FIELDS))?;
    let cpy = first_by(
        df,
        &["department_id", "product_id", "year"],
        &present(df, &CPY_FIELDS),
    )?;
    Ok(CpyFacets { cy, py, cpy })
}
