use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use crate::columns::{ColumnMap, ColumnSet};
use crate::error::CacheError;
use crate::loader::{self, SheetTable};

/// Display name used when none of a customer's rows carry a name.
pub const UNKNOWN_CUSTOMER: &str = "Unknown";

/// Branch assumed for rows that don't name a store.
pub const DEFAULT_BRANCH: &str = "Main Branch";

/// Reads slower than this are logged as a warning.
const SLOW_READ_SECS: f64 = 3.0;

lazy_static! {
    // Numeric cells exported as text pick up a trailing ".0".
    static ref FLOAT_SUFFIX: Regex = Regex::new(r"\.0$").unwrap();
}

/// One purchase row as it appears in the source spreadsheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    pub phone: String,
    pub name: String,
    pub invoice: String,
    pub model: String,
    pub serial: String,
    pub product_id: String,
    pub branch: String,
}

impl SourceRecord {
    fn from_row(row: &[String], columns: &ColumnMap) -> Self {
        let text = |column| loader::cell(row, column).trim().to_string();
        SourceRecord {
            phone: loader::cell(row, columns.phone).to_string(),
            name: text(columns.name),
            invoice: text(columns.invoice),
            model: text(columns.model),
            serial: text(columns.serial),
            product_id: text(columns.product_id),
            branch: text(columns.branch),
        }
    }
}

/// A product bought by a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub invoice: String,
    pub model: String,
    pub serial: String,
    pub product_id: String,
    pub branch: String,
}

/// Everything known about one phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerEntry {
    pub name: String,
    /// In source row order.
    pub products: Vec<ProductRecord>,
}

/// Normalized phone number to customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerIndex {
    entries: HashMap<String, CustomerEntry>,
}

impl CustomerIndex {
    pub fn get(&self, phone: &str) -> Option<&CustomerEntry> {
        self.entries.get(phone)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Groups records by normalized phone number.
    ///
    /// Records with an empty phone are dropped. The first non-empty name of a
    /// group becomes the customer name.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = SourceRecord>,
    {
        let mut entries: HashMap<String, CustomerEntry> = HashMap::new();

        for record in records {
            let phone = normalize_phone(&record.phone);
            if phone.is_empty() {
                continue;
            }

            let entry = entries.entry(phone).or_insert_with(|| CustomerEntry {
                name: String::new(),
                products: Vec::new(),
            });
            if entry.name.is_empty() {
                entry.name = record.name;
            }
            entry.products.push(ProductRecord {
                invoice: record.invoice,
                model: record.model,
                serial: record.serial,
                product_id: record.product_id,
                branch: if record.branch.is_empty() {
                    DEFAULT_BRANCH.to_string()
                } else {
                    record.branch
                },
            });
        }

        for entry in entries.values_mut() {
            if entry.name.is_empty() {
                entry.name = UNKNOWN_CUSTOMER.to_string();
            }
        }

        CustomerIndex { entries }
    }
}

/// Canonical form of a phone number cell: whitespace trimmed, spreadsheet
/// ".0" artifact removed.
pub fn normalize_phone(raw: &str) -> String {
    FLOAT_SUFFIX.replace(raw.trim(), "").trim().to_string()
}

/// Builds an index from an already loaded table.
pub fn index_table(
    table: &SheetTable,
    columns: &ColumnSet,
    path: &Path,
) -> Result<CustomerIndex, CacheError> {
    let map = columns.resolve(&table.headers);
    if map.phone.is_none() {
        return Err(CacheError::SchemaError {
            path: path.to_path_buf(),
            headers: table.headers.clone(),
        });
    }

    Ok(CustomerIndex::from_records(
        table.rows.iter().map(|row| SourceRecord::from_row(row, &map)),
    ))
}

/// Reads the spreadsheet at `path` and indexes it by phone number.
pub fn build_index(path: &Path, columns: &ColumnSet) -> Result<CustomerIndex, CacheError> {
    if !path.is_file() {
        return Err(CacheError::unavailable(path, "file not found"));
    }

    let started = Instant::now();
    log::info!("reading customer spreadsheet {}", path.display());

    let table = loader::load_table(path)?;
    let read_secs = started.elapsed().as_secs_f64();
    if read_secs > SLOW_READ_SECS {
        log::warn!(
            "reading {} took {:.2}s ({} rows)",
            path.display(),
            read_secs,
            table.rows.len()
        );
    }

    let index = index_table(&table, columns, path)?;
    log::info!(
        "indexed {} customers from {} rows in {:.2}s ({} rows skipped)",
        index.len(),
        table.rows.len(),
        started.elapsed().as_secs_f64(),
        table.skipped
    );

    Ok(index)
}
