#![cfg(not(tarpaulin_include))]

use calamine::{Data, Reader, open_workbook_auto};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::CacheError;

/// A source spreadsheet flattened to text: one header row and the data rows
/// below it.
///
/// Rows may be shorter than the header; missing trailing cells read as empty.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Records that could not be decoded and were left out of `rows`.
    pub skipped: usize,
}

/// Text of `row` at `column`, or `""` when the column is unresolved or the
/// row is too short.
pub fn cell(row: &[String], column: Option<usize>) -> &str {
    column
        .and_then(|c| row.get(c))
        .map(|s| s.as_str())
        .unwrap_or("")
}

/// Load a CSV file
///
/// The first record is the header. Records that fail to decode (bad UTF-8,
/// broken quoting) are skipped and counted rather than failing the load.
///
/// # Arguments
/// * `filepath` - Path to the CSV file to load
///
/// # Returns
/// * `Result<SheetTable, CacheError>` - The table, or `SourceUnavailable` if
///   the file can't be opened or has no readable header
///
/// # Examples
/// ```no_run
/// use claim_lookup::loader::from_csv;
///
/// match from_csv("data/customers.csv") {
///     Ok(table) => println!("{} rows, {} skipped", table.rows.len(), table.skipped),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<SheetTable, CacheError> {
    let path = filepath.as_ref();
    let file = File::open(path).map_err(|e| CacheError::unavailable(path, e))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader
        .headers()
        .map_err(|e| CacheError::unavailable(path, e))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut table = SheetTable {
        headers,
        ..SheetTable::default()
    };

    for (line, record) in reader.records().enumerate() {
        match record {
            Ok(record) => table.rows.push(record.iter().map(|f| f.to_string()).collect()),
            Err(e) => {
                log::debug!("skipping record {} of {}: {}", line + 2, path.display(), e);
                table.skipped += 1;
            }
        }
    }

    Ok(table)
}

/// Load the first worksheet of an Excel or OpenDocument workbook
///
/// Cell values are rendered as text. Integral floats lose their fractional
/// part so numeric phone numbers come out as plain digits.
///
/// # Arguments
/// * `filepath` - Path to the workbook (.xlsx, .xlsm, .xlsb, .xls or .ods)
///
/// # Returns
/// * `Result<SheetTable, CacheError>` - The first sheet as text, or
///   `SourceUnavailable` if the workbook can't be opened or has no sheets
pub fn from_excel(filepath: impl AsRef<Path>) -> Result<SheetTable, CacheError> {
    let path = filepath.as_ref();
    let mut workbook = open_workbook_auto(path).map_err(|e| CacheError::unavailable(path, e))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| CacheError::unavailable(path, "workbook has no sheets"))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| CacheError::unavailable(path, e))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header) => header.iter().map(cell_to_string).collect(),
        None => Vec::new(),
    };

    Ok(SheetTable {
        headers,
        rows: rows
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect(),
        skipped: 0,
    })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}

/// Detect file type and load appropriate format
///
/// Dispatches on the file extension. Anything that is not CSV or a workbook
/// format calamine understands is reported as unavailable.
///
/// # Arguments
/// * `filepath` - Path to the source spreadsheet
///
/// # Returns
/// * `Result<SheetTable, CacheError>` - The loaded table or an error
///
/// # Examples
/// ```no_run
/// use claim_lookup::loader::load_table;
///
/// let table = load_table("data/customers.xlsx").unwrap();
/// println!("headers: {:?}", table.headers);
/// ```
pub fn load_table(filepath: impl AsRef<Path>) -> Result<SheetTable, CacheError> {
    let path = filepath.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => from_csv(path),
        Some("xlsx") | Some("xlsm") | Some("xlsb") | Some("xls") | Some("ods") => from_excel(path),
        Some(ext) => Err(CacheError::unavailable(
            path,
            format!("unsupported file extension: {}", ext),
        )),
        None => Err(CacheError::unavailable(path, "file has no extension")),
    }
}
