use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::SystemTime;
use tempfile::NamedTempFile;

use crate::index::CustomerIndex;

/// Bumped whenever the layout of [`CustomerIndex`] changes. Snapshots from
/// another version are ignored.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    source_modified: SystemTime,
    index: &'a CustomerIndex,
}

/// A decoded on-disk snapshot.
#[derive(Debug, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Modification time of the spreadsheet the index was built from.
    pub source_modified: SystemTime,
    pub index: CustomerIndex,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("snapshot version {found} does not match {expected}")]
    Version { found: u32, expected: u32 },
}

/// Writes `index` to `filename` as gzip-compressed bincode.
///
/// The data goes to a temporary file in the same directory first and is
/// renamed over `filename`, so readers never see a half-written snapshot.
///
/// # Arguments
/// * `index` - The index to persist
/// * `source_modified` - Modification time of the source `index` was built from
/// * `filename` - Destination path; missing parent directories are created
///
/// # Returns
/// * `Result<(), SnapshotError>` - Success or the I/O or encoding failure
pub fn save_snapshot(
    index: &CustomerIndex,
    source_modified: SystemTime,
    filename: &Path,
) -> Result<(), SnapshotError> {
    let dir = match filename.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
        let mut writer = BufWriter::new(encoder);

        serialize_into(
            &mut writer,
            &SnapshotRef {
                version: SNAPSHOT_VERSION,
                source_modified,
                index,
            },
        )?;

        let encoder = writer.into_inner().map_err(|e| e.into_error())?;
        encoder.finish()?;
    }
    tmp.persist(filename).map_err(|e| e.error)?;

    Ok(())
}

/// Reads a snapshot written by [`save_snapshot`].
///
/// # Returns
/// * `Result<Snapshot, SnapshotError>` - The snapshot, or `Version` if it was
///   written by an incompatible format
pub fn load_snapshot(filename: &Path) -> Result<Snapshot, SnapshotError> {
    let file = File::open(filename)?;
    let decoder = GzDecoder::new(file);
    let mut reader = BufReader::new(decoder);

    let snapshot: Snapshot = deserialize_from(&mut reader)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Version {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    Ok(snapshot)
}
