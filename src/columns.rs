//! Header matching for the loosely structured purchase spreadsheet.
//!
//! Every logical field has an ordered list of exact synonyms and a list of
//! substrings. Exact synonyms are tried first, in order; if none match, the
//! first header containing one of the substrings wins. Headers are compared
//! trimmed and lower-cased, and a column serves at most one field.

/// A logical column of a purchase record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Phone,
    Name,
    Invoice,
    Model,
    Serial,
    ProductId,
    Branch,
}

impl Field {
    /// Resolution order. Earlier fields claim their column first.
    pub const ALL: [Field; 7] = [
        Field::Phone,
        Field::Name,
        Field::Invoice,
        Field::Model,
        Field::Serial,
        Field::ProductId,
        Field::Branch,
    ];
}

/// Synonyms for one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMatcher {
    pub field: Field,
    pub synonyms: Vec<String>,
    pub substrings: Vec<String>,
}

impl ColumnMatcher {
    pub fn new(field: Field, synonyms: &[&str], substrings: &[&str]) -> Self {
        ColumnMatcher {
            field,
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            substrings: substrings.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn find_exact(&self, headers: &[String], taken: &[bool]) -> Option<usize> {
        self.synonyms.iter().find_map(|synonym| {
            (0..headers.len()).find(|&i| !taken[i] && headers[i] == *synonym)
        })
    }

    fn find_substring(&self, headers: &[String], taken: &[bool]) -> Option<usize> {
        self.substrings.iter().find_map(|needle| {
            (0..headers.len()).find(|&i| !taken[i] && headers[i].contains(needle.as_str()))
        })
    }
}

/// The full synonym table, one matcher per field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSet {
    matchers: Vec<ColumnMatcher>,
}

impl Default for ColumnSet {
    fn default() -> Self {
        ColumnSet {
            matchers: vec![
                ColumnMatcher::new(
                    Field::Phone,
                    &[
                        "mobile no",
                        "mobile",
                        "mobile number",
                        "phone",
                        "phone number",
                        "contact",
                        "contact no",
                    ],
                    &["mobile", "phone"],
                ),
                ColumnMatcher::new(
                    Field::Name,
                    &["customer", "customer name", "name"],
                    &["customer", "name"],
                ),
                ColumnMatcher::new(
                    Field::Invoice,
                    &["invoice no", "invoice", "invoice_no", "invoice number"],
                    &["invoice"],
                ),
                ColumnMatcher::new(Field::Model, &["model"], &["model"]),
                ColumnMatcher::new(
                    Field::Serial,
                    &["serial no", "serialno", "serial_no", "serial number"],
                    &["serial"],
                ),
                ColumnMatcher::new(
                    Field::ProductId,
                    &["osid", "product id", "product_id"],
                    &["osid"],
                ),
                ColumnMatcher::new(
                    Field::Branch,
                    &["store name", "store_name", "branch", "branch name"],
                    &["store", "branch"],
                ),
            ],
        }
    }
}

impl ColumnSet {
    /// Replaces the matcher for `matcher.field`.
    pub fn with_matcher(mut self, matcher: ColumnMatcher) -> Self {
        match self.matchers.iter_mut().find(|m| m.field == matcher.field) {
            Some(slot) => *slot = matcher,
            None => self.matchers.push(matcher),
        }
        self
    }

    fn matcher(&self, field: Field) -> Option<&ColumnMatcher> {
        self.matchers.iter().find(|m| m.field == field)
    }

    /// Maps every field to a column index of `headers`, if any matches.
    ///
    /// Exact synonyms are resolved for all fields before any substring
    /// fallback runs, so a header that is an exact hit for one field (say
    /// "store name" for the branch) is never taken by another field's
    /// substring ("name").
    pub fn resolve(&self, headers: &[String]) -> ColumnMap {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let mut taken = vec![false; normalized.len()];
        let mut map = ColumnMap::default();

        for field in Field::ALL {
            let Some(matcher) = self.matcher(field) else {
                continue;
            };
            if let Some(i) = matcher.find_exact(&normalized, &taken) {
                taken[i] = true;
                map.set(field, i);
            }
        }

        for field in Field::ALL {
            let Some(matcher) = self.matcher(field) else {
                continue;
            };
            if map.get(field).is_some() {
                continue;
            }
            if let Some(i) = matcher.find_substring(&normalized, &taken) {
                taken[i] = true;
                map.set(field, i);
            }
        }

        map
    }
}

/// Column index per field, as resolved against one header row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub phone: Option<usize>,
    pub name: Option<usize>,
    pub invoice: Option<usize>,
    pub model: Option<usize>,
    pub serial: Option<usize>,
    pub product_id: Option<usize>,
    pub branch: Option<usize>,
}

impl ColumnMap {
    pub fn get(&self, field: Field) -> Option<usize> {
        match field {
            Field::Phone => self.phone,
            Field::Name => self.name,
            Field::Invoice => self.invoice,
            Field::Model => self.model,
            Field::Serial => self.serial,
            Field::ProductId => self.product_id,
            Field::Branch => self.branch,
        }
    }

    fn set(&mut self, field: Field, index: usize) {
        let slot = match field {
            Field::Phone => &mut self.phone,
            Field::Name => &mut self.name,
            Field::Invoice => &mut self.invoice,
            Field::Model => &mut self.model,
            Field::Serial => &mut self.serial,
            Field::ProductId => &mut self.product_id,
            Field::Branch => &mut self.branch,
        };
        *slot = Some(index);
    }
}

pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}
