use crate::error::{ImportError, Result};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

pub const ID_COLUMN: &str = "index";
const TABLE_COLUMNS: [&str; 4] = ["code", "name", "level", "parent_id"];
const INDEX_HEADERS: [&str; 4] = ["", "index", "id", "Unnamed: 0"];

/// A hierarchical classification (products, locations, industries): one row
/// per entry with a surrogate integer id and a textual code.
#[derive(Debug, Clone)]
pub struct Classification {
    table: DataFrame,
}

/// Outcome of looking up one code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(i64),
    /// A code was given but the classification does not contain it.
    Unmatched(String),
    /// No code to look up.
    Absent,
}

impl Resolution {
    pub fn id(&self) -> Option<i64> {
        match self {
            Resolution::Found(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub rows: usize,
    pub matched: usize,
    /// Rows with a null code.
    pub absent: usize,
    /// Rows whose code is not in the classification.
    pub unmatched: usize,
    pub unmatched_codes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Merged {
    pub frame: DataFrame,
    pub report: MergeReport,
}

fn is_index_header(name: &str) -> bool {
    INDEX_HEADERS.contains(&name) || name.starts_with("column_")
}

impl Classification {
    /// Builds a classification from a frame holding `index`, `code`, `name`,
    /// `level` and `parent_id` columns.
    pub fn from_frame(table: DataFrame) -> Result<Self> {
        for column in std::iter::once(ID_COLUMN).chain(TABLE_COLUMNS) {
            if table.column(column).is_err() {
                return Err(ImportError::MissingColumn(column.to_string()));
            }
        }
        let table = table
            .lazy()
            .with_columns([
                col(ID_COLUMN)
                    .cast(DataType::Float64)
                    .cast(DataType::Int64),
                col("code").cast(DataType::String),
                col("name").cast(DataType::String),
                col("level").cast(DataType::String),
                col("parent_id").cast(DataType::Float64),
            ])
            .collect()?;
        Ok(Self { table })
    }

    /// Reads a classification CSV. Every field is read as text so codes keep
    /// leading zeros; an unnamed or `index`/`id` first column is the id,
    /// otherwise rows are numbered from zero.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut lf = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()?;
        let schema = lf.collect_schema()?;
        let first = schema
            .iter_names()
            .next()
            .map(|n| n.to_string())
            .unwrap_or_default();
        lf = if first == ID_COLUMN {
            lf
        } else if is_index_header(&first) {
            lf.rename([first.as_str()], [ID_COLUMN], true)
        } else {
            lf.with_row_index(ID_COLUMN, None)
        };
        let classification = Self::from_frame(lf.collect()?)?;
        info!(
            path = %path.display(),
            entries = classification.table.height(),
            "classification loaded"
        );
        Ok(classification)
    }

    pub fn table(&self) -> &DataFrame {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.height()
    }

    pub fn is_empty(&self) -> bool {
        self.table.height() == 0
    }

    /// Entries at one hierarchy level, ids unchanged.
    pub fn level(&self, name: &str) -> Result<Classification> {
        let table = self
            .table
            .clone()
            .lazy()
            .filter(col("level").eq(lit(name)))
            .collect()?;
        Ok(Self { table })
    }

    /// Code → id pairs of this classification.
    pub fn code_to_id(&self) -> Result<HashMap<String, i64>> {
        let codes = self.table.column("code")?.str()?;
        let ids = self.table.column(ID_COLUMN)?.i64()?;
        Ok(codes
            .into_iter()
            .zip(ids)
            .filter_map(|(code, id)| Some((code?.to_string(), id?)))
            .collect())
    }

    /// Looks one code up by scanning the table. Use `code_to_id` when
    /// resolving many codes.
    pub fn resolve(&self, code: Option<&str>) -> Result<Resolution> {
        let Some(code) = code else {
            return Ok(Resolution::Absent);
        };
        let codes = self.table.column("code")?.str()?;
        let ids = self.table.column(ID_COLUMN)?.i64()?;
        let found = codes
            .into_iter()
            .zip(ids)
            .find_map(|(c, id)| if c == Some(code) { id } else { None });
        Ok(match found {
            Some(id) => Resolution::Found(id),
            None => Resolution::Unmatched(code.to_string()),
        })
    }
}

/// Left joins `df` on `merge_on` against the classification codes, adding
/// the matching ids as `classification_name`. Unknown codes get a null id;
/// the report tells them apart from rows that had no code at all.
pub fn merge_to_table(
    classification: &Classification,
    classification_name: &str,
    df: &DataFrame,
    merge_on: &str,
) -> Result<Merged> {
    let code_to_id = classification
        .table
        .clone()
        .lazy()
        .select([
            col("code").alias(merge_on),
            col(ID_COLUMN).alias(classification_name),
        ])
        .group_by_stable([col(merge_on)])
        .agg([col(classification_name).first()]);
    let frame = df
        .clone()
        .lazy()
        .with_column(col(merge_on).cast(DataType::String))
        .join(
            code_to_id,
            [col(merge_on)],
            [col(merge_on)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;

    let codes = frame.column(merge_on)?.str()?;
    let ids = frame.column(classification_name)?.i64()?;
    let mut report = MergeReport {
        rows: frame.height(),
        ..Default::default()
    };
    for (code, id) in codes.into_iter().zip(ids) {
        match (code, id) {
            (_, Some(_)) => report.matched += 1,
            (None, None) => report.absent += 1,
            (Some(code), None) => {
                report.unmatched += 1;
                if !report.unmatched_codes.iter().any(|c| c == code) {
                    report.unmatched_codes.push(code.to_string());
                }
            }
        }
    }
    if report.unmatched > 0 {
        warn!(
            column = merge_on,
            target = classification_name,
            rows = report.unmatched,
            codes = ?report.unmatched_codes,
            "codes not found in classification"
        );
    }
    Ok(Merged { frame, report })
}
