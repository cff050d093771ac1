/*!
# Customer Lookup Cache

Phone-number lookup over a spreadsheet of historical purchases, for the
warranty-claim desk.

## Overview

Claim submission starts by asking "have we sold to this number before?". The
answer lives in a multi-thousand-row spreadsheet that is rewritten from time
to time. Reading it takes seconds, so lookups are served from an in-memory
index that is rebuilt in the background whenever the file changes.

## Architecture

### Data flow
```text
spreadsheet file → loader → index builder → in-memory index → lookups
                                          ↘ on-disk snapshot (cold start)
```

### Stale-while-revalidate
- **Cold**: no index yet. The first call restores the snapshot, or reads the
  spreadsheet synchronously when there is none.
- **Warm**: every call compares the spreadsheet's modification time with the
  one the index was built from. When they differ a rebuild is queued on the
  refresh worker and the current index is served immediately.
- **Refreshing**: reads keep getting the old index. The finished rebuild is
  swapped in as a whole; a failed one is logged and the old index stays.

At most one rebuild runs at a time: the refresh worker has a single slot and
rejects submissions while it is occupied.

### Data Persistence Layer
- Snapshot with Gzip compression and bincode serialization
- Written to a temporary file and renamed into place

## Modules

- **config**: Paths, load timeout, listen address
- **error**: `CacheError`
- **columns**: Header synonyms per logical field
- **loader**: CSV and Excel readers
- **index**: Data model and index builder
- **saving**: Snapshot persistence
- **refresh**: Single-slot background worker
- **cache**: The stale-while-revalidate orchestrator
- **lookup**: Phone-number query
- **app**: HTTP routes (`web` feature)

## REST API Endpoints

- `POST /lookup-customer` - `{"mobile": "9876543210"}` → customer and products
- `GET /health` - liveness plus cache state
*/

pub mod cache;
pub mod columns;
pub mod config;
pub mod error;
pub mod index;
pub mod loader;
pub mod lookup;
pub mod refresh;
pub mod saving;

#[cfg(feature = "web")]
pub mod app;

pub use cache::{CacheState, CacheStatus, CustomerCache, IndexSource, SpreadsheetSource, TimedSource};
pub use columns::{ColumnMatcher, ColumnSet, Field};
pub use config::{CacheConfig, ServerConfig};
pub use error::CacheError;
pub use index::{CustomerEntry, CustomerIndex, ProductRecord, SourceRecord, build_index, normalize_phone};
pub use lookup::{Lookup, LookupReply, validate_phone};
