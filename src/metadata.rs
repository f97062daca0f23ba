use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::lookup::Lookup;
use crate::record::LogRecord;

/// Well-known file written by the host monitoring agent. Its first line is
/// the path of the actual metadata properties file.
pub const MAGIC_FILE_PATH: &str = "dt_metadata_e617c525669e072eebe3d0f08212e8f2.properties";

/// Host metadata exported by the monitoring agent, read once at construction.
///
/// Registered under the `dt` prefix by [`init`](crate::init). Unknown keys
/// resolve to an empty string.
#[derive(Debug, Clone, Default)]
pub struct MetadataFileLookup {
    metadata: HashMap<String, String>,
}

impl MetadataFileLookup {
    /// Read the metadata referenced by the default magic file.
    pub fn from_magic_file() -> Self {
        Self::from_magic_path(MAGIC_FILE_PATH)
    }

    pub fn from_magic_path(magic_file: impl AsRef<Path>) -> Self {
        let magic_file = magic_file.as_ref();
        let target = match fs::read_to_string(magic_file) {
            Ok(contents) => contents.lines().next().map(|line| PathBuf::from(line.trim())),
            Err(e) => {
                tracing::error!(path = %magic_file.display(), error = %e, "cannot read metadata magic file");
                None
            }
        };

        let metadata = target.map(|path| read_metadata_file(&path)).unwrap_or_default();
        tracing::debug!(keys = metadata.len(), "metadata lookup initialized");
        MetadataFileLookup { metadata }
    }

    pub fn get(&self, key: &str) -> &str {
        self.metadata.get(key).map(String::as_str).unwrap_or("")
    }
}

fn read_metadata_file(path: &Path) -> HashMap<String, String> {
    match fs::read_to_string(path) {
        Ok(contents) => parse_properties(&contents),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "cannot read metadata file");
            HashMap::new()
        }
    }
}

fn parse_properties(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.starts_with('='))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

impl Lookup for MetadataFileLookup {
    fn lookup(&self, _record: &LogRecord, key: &str) -> Option<String> {
        Some(self.get(key).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_metadata_through_magic_file() {
        let dir = tempfile::tempdir().unwrap();
        let metadata_path = dir.path().join("metadata.properties");
        let mut metadata = fs::File::create(&metadata_path).unwrap();
        writeln!(metadata, "pgi=1234\nhostid=host1\n\n=orphan\nnoequals\npg=").unwrap();

        let magic_path = dir.path().join("magic.properties");
        fs::write(&magic_path, metadata_path.display().to_string()).unwrap();

        let lookup = MetadataFileLookup::from_magic_path(&magic_path);
        assert_eq!(lookup.get("pgi"), "1234");
        assert_eq!(lookup.get("hostid"), "host1");
        assert_eq!(lookup.get("pg"), "");
        assert_eq!(lookup.get("noequals"), "");
        assert_eq!(lookup.metadata.len(), 3);
    }

    #[test]
    fn missing_magic_file_yields_empty_values() {
        let lookup = MetadataFileLookup::from_magic_path("/nonexistent/magic.properties");
        assert_eq!(lookup.get("pgi"), "");
    }
}
