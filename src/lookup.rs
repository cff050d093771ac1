use serde::Serialize;

use crate::cache::CustomerCache;
use crate::error::CacheError;
use crate::index::{CustomerEntry, ProductRecord, normalize_phone};

/// Length of a valid phone number query after trimming.
pub const PHONE_LENGTH: usize = 10;

/// Outcome of a customer lookup. A missing customer is a new customer, not
/// an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(CustomerEntry),
    NotFound,
}

/// Wire shape of a lookup: `{found, name?, products?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupReply {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<ProductRecord>>,
}

impl From<Lookup> for LookupReply {
    fn from(lookup: Lookup) -> Self {
        match lookup {
            Lookup::Found(entry) => LookupReply {
                found: true,
                name: Some(entry.name),
                products: Some(entry.products),
            },
            Lookup::NotFound => LookupReply {
                found: false,
                name: None,
                products: None,
            },
        }
    }
}

/// Checks the shape of a phone query and returns it trimmed.
pub fn validate_phone(raw: &str) -> Result<&str, CacheError> {
    let phone = raw.trim();
    if phone.chars().count() != PHONE_LENGTH {
        return Err(CacheError::InvalidInput(format!(
            "phone number must be {} digits, got {:?}",
            PHONE_LENGTH, phone
        )));
    }
    Ok(phone)
}

impl CustomerCache {
    /// Finds the customer behind `phone`.
    ///
    /// The query is validated before the cache is touched. After that this
    /// costs one map lookup, plus whatever [`CustomerCache::get_index`] costs
    /// (nothing once warm).
    pub fn lookup(&self, phone: &str) -> Result<Lookup, CacheError> {
        let phone = validate_phone(phone)?;
        let index = self.get_index()?;

        Ok(match index.get(&normalize_phone(phone)) {
            Some(entry) => Lookup::Found(entry.clone()),
            None => Lookup::NotFound,
        })
    }
}
