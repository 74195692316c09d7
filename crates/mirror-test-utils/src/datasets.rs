//! Data-set record factories.

use mirror_data::{DataSetRecord, FileManifest, ManifestEntry};

/// A physical data set with the given properties and payload files.
///
/// Each `(path, content-size)` pair becomes one manifest file entry. Seed
/// the matching payload bytes into the fake store with
/// [`FakeRemote::seed_file`](crate::FakeRemote::seed_file).
pub fn record(code: &str, properties: &[(&str, &str)], files: &[(&str, u64)]) -> DataSetRecord {
    let mut record = DataSetRecord::physical(code);
    record.properties = properties
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    record.manifest = FileManifest::new(
        files
            .iter()
            .map(|(path, size)| ManifestEntry {
                path: path.to_string(),
                directory: false,
                size: Some(*size),
                checksum_crc32: None,
            })
            .collect(),
    );
    record
}
