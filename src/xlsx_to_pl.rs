use crate::error::Result;
use calamine::{open_workbook, Data, Reader, Xlsx};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// Columns listed in `text_columns` keep the cell's text form, so numeric
// codes such as 05 stay zero padded when Excel stored them as text.
fn data_excel_to_polars(data_excel: &Data, as_text: bool) -> AnyValue<'static> {
    match data_excel {
        Data::Empty => AnyValue::Null,
        Data::Int(i) if as_text => AnyValue::StringOwned(i.to_string().into()),
        Data::Float(f) if as_text && f.fract() == 0.0 => {
            AnyValue::StringOwned(format!("{}", *f as i64).into())
        }
        Data::Int(i) => AnyValue::Int64(*i),
        Data::Float(f) => AnyValue::Float64(*f),
        Data::Bool(b) => AnyValue::Boolean(*b),
        _ => AnyValue::StringOwned(data_excel.to_string().into()),
    }
}

fn excel_to_dataframe(
    workbook: &mut Xlsx<BufReader<File>>,
    text_columns: &HashSet<String>,
) -> Result<DataFrame> {
    let sheet_name = workbook.sheet_names().first().cloned().unwrap_or_default();
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let header_row: Vec<String> = match rows.next() {
        Some(row) => row.iter().map(|cell| cell.to_string()).collect(),
        None => return Ok(DataFrame::empty()),
    };
    let data_rows: Vec<&[Data]> = rows.collect();

    let mut columns: Vec<Column> = Vec::with_capacity(header_row.len());
    for (col_idx, col_name) in header_row.iter().enumerate() {
        let as_text = text_columns.contains(col_name);
        let column_data: Vec<AnyValue> = data_rows
            .iter()
            .map(|row| {
                row.get(col_idx)
                    .map(|cell| data_excel_to_polars(cell, as_text))
                    .unwrap_or(AnyValue::Null)
            })
            .collect();
        let series = Series::from_any_values(col_name.as_str().into(), &column_data, false)?;
        columns.push(series.into_column());
    }

    Ok(DataFrame::new(columns)?)
}

/// Reads the first sheet of a workbook; the first row is the header.
pub struct ExcelReader {
    workbook: Xlsx<BufReader<File>>,
    text_columns: HashSet<String>,
}

impl ExcelReader {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let workbook: Xlsx<BufReader<File>> = open_workbook(file_path.as_ref())?;
        Ok(ExcelReader {
            workbook,
            text_columns: HashSet::new(),
        })
    }
    pub fn with_text_columns<I, T>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.text_columns = columns.into_iter().map(Into::into).collect();
        self
    }
    pub fn finish(&mut self) -> Result<DataFrame> {
        excel_to_dataframe(&mut self.workbook, &self.text_columns)
    }
}
