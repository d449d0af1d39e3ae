use std::path::{Path, PathBuf};

use prefmatch_core::{MatchError, MatchResult, UserVector, VectorSource};
use prefmatch_service::BulkLoadRequest;

/// Snapshot file in bulk-load shape: `{"user_vectors":[{"user_id":..,"vector":[..]}]}`.
///
/// The file is re-read on every snapshot, so an external exporter can
/// overwrite it between refresh cycles.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
    name: String,
}

impl JsonFileSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> MatchError {
        MatchError::SourceUnavailable {
            source_name: self.name.clone(),
            source: source.into(),
        }
    }
}

impl VectorSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn snapshot(&self) -> MatchResult<Vec<UserVector>> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| self.unavailable(e))?;
        let request: BulkLoadRequest =
            serde_json::from_str(&contents).map_err(|e| self.unavailable(e))?;
        Ok(request.user_vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_bulk_load_shape() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("users.json");
        std::fs::write(
            &path,
            r#"{"user_vectors":[{"user_id":"a","vector":[1.0,-1.0]}]}"#,
        )
        .expect("write");
        let source = JsonFileSource::new(&path);
        let snapshot = source.snapshot().expect("snapshot");
        assert_eq!(snapshot, vec![UserVector::new("a", vec![1.0, -1.0])]);
        assert_eq!(source.path(), path.as_path());
    }

    #[test]
    fn missing_or_malformed_file_is_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = JsonFileSource::new(dir.path().join("absent.json"));
        assert!(matches!(
            missing.snapshot().unwrap_err(),
            MatchError::SourceUnavailable { .. }
        ));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{").expect("write");
        assert!(matches!(
            JsonFileSource::new(path).snapshot().unwrap_err(),
            MatchError::SourceUnavailable { .. }
        ));
    }
}
