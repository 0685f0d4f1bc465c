use crate::error::{ImportError, Result};
use crate::xlsx_to_pl::ExcelReader;
use polars::prelude::*;
use std::path::Path;
use tracing::debug;

/// Ordered source → destination column names.
pub type ColumnMap = [(&'static str, &'static str)];

/// Reads a tabular file into a `DataFrame`, choosing the reader by
/// extension. `text_columns` are forced to `String` so codes keep their
/// leading zeros.
pub fn read_table<P: AsRef<Path>>(path: P, text_columns: &[&str]) -> Result<DataFrame> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let df = match ext.as_str() {
        "csv" => {
            let mut schema = Schema::with_capacity(text_columns.len());
            for column in text_columns {
                schema.with_column((*column).into(), DataType::String);
            }
            LazyCsvReader::new(path)
                .with_has_header(true)
                .with_infer_schema_length(Some(10_000))
                .with_dtype_overwrite(Some(SchemaRef::new(schema)))
                .finish()?
                .collect()?
        }
        "xlsx" => ExcelReader::new(path)?
            .with_text_columns(text_columns.iter().copied())
            .finish()?,
        _ => return Err(ImportError::UnsupportedFormat(path.display().to_string())),
    };
    debug!(path = %path.display(), rows = df.height(), "table read");
    Ok(df)
}

/// Renames columns following `mapping`; columns absent from the mapping are
/// dropped, mapped columns absent from the frame are skipped.
pub fn translate_columns(df: &DataFrame, mapping: &ColumnMap) -> Result<DataFrame> {
    let present = df.get_column_names_str();
    let selection: Vec<Expr> = mapping
        .iter()
        .filter(|(source, _)| present.contains(source))
        .map(|(source, target)| col(*source).alias(*target))
        .collect();
    Ok(df.clone().lazy().select(selection).collect()?)
}

/// Destination names of `mapping`, in order.
pub fn mapped_columns(mapping: &ColumnMap) -> Vec<&'static str> {
    mapping.iter().map(|(_, target)| *target).collect()
}

/// Keeps exactly `columns`, in that order. Fails on a missing column.
pub fn cut_columns(df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
    for column in columns {
        if df.column(column).is_err() {
            return Err(ImportError::MissingColumn(column.to_string()));
        }
    }
    Ok(df.select(columns.iter().copied())?)
}

/// Casts `column` to text and left pads it with zeros up to `width`.
/// Integral floats lose their fractional part first ("5.0" → "05").
pub fn zfill_code(df: DataFrame, column: &str, width: usize) -> Result<DataFrame> {
    let as_int = col(column).cast(DataType::Float64).cast(DataType::Int64);
    let padded = when(as_int.clone().is_not_null())
        .then(as_int.cast(DataType::String))
        .otherwise(col(column).cast(DataType::String))
        .str()
        .zfill(lit(width as u64))
        .alias(column);
    Ok(df.lazy().with_column(padded).collect()?)
}

fn all_not_null(keys: &[&str]) -> Expr {
    keys.iter()
        .map(|k| col(*k).is_not_null())
        .reduce(|acc, e| acc.and(e))
        .unwrap_or_else(|| lit(true))
}

pub(crate) fn key_exprs(keys: &[&str]) -> Vec<Expr> {
    keys.iter().map(|k| col(*k)).collect()
}

/// Completes `df` to the cartesian product of the distinct non-null values
/// of each key column. Existing rows keep their values, new key
/// combinations get nulls in every other column.
pub fn fillin(df: &DataFrame, keys: &[&str]) -> Result<DataFrame> {
    let (first, rest) = keys.split_first().ok_or(ImportError::NoKeys)?;
    for key in keys {
        if df.column(key).is_err() {
            return Err(ImportError::MissingColumn(key.to_string()));
        }
    }
    let observed = df.clone().lazy().filter(all_not_null(keys));

    let observed_rows = observed.clone().select(key_exprs(keys)).collect()?.height();
    let distinct_rows = observed
        .clone()
        .select(key_exprs(keys))
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?
        .height();
    if distinct_rows != observed_rows {
        return Err(ImportError::DuplicateKeys {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            duplicates: observed_rows - distinct_rows,
        });
    }

    let level = |key: &str| observed.clone().select([col(key).unique()]);
    let mut grid = level(*first);
    for key in rest {
        grid = grid.cross_join(level(*key), None);
    }
    let filled = grid
        .join(
            observed,
            key_exprs(keys),
            key_exprs(keys),
            JoinArgs::new(JoinType::Left),
        )
        .sort_by_exprs(key_exprs(keys), SortMultipleOptions::default())
        .collect()?;
    debug!(
        keys = ?keys,
        before = df.height(),
        after = filled.height(),
        "fillin"
    );
    Ok(filled)
}
