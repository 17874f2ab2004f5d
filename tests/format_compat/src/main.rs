fn main() {
    println!("Run `cargo test -p format-compat` to execute progress-layout compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use blobsync_progress::{Progress, ProgressStore};
    use blobsync_types::{DiscoveredFile, UploadOutcome};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture_text(name: &str) -> String {
        let path = fixtures_dir().join(name);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    #[test]
    fn fixture_deserializes() {
        let progress: Progress =
            serde_json::from_str(&load_fixture_text("upload-progress.json")).unwrap();

        assert_eq!(progress.completed_files.len(), 2);
        assert_eq!(progress.failed_files.len(), 1);
        assert!(progress.completed_at.is_some());

        let first = &progress.completed_files[0];
        assert_eq!(first.source_path, PathBuf::from("/data/reports/2026-02.csv"));
        assert_eq!(first.blob_name, "archive/2026-02.csv");
        assert_eq!(first.fingerprint, "XrY7u+Ae7tCTyyK7j1rNww==");
        assert!(first.error.is_none());

        let failed = &progress.failed_files[0];
        assert_eq!(failed.error.as_deref(), Some("max retries (3) exceeded"));
    }

    #[test]
    fn serialized_keys_stay_camel_case() {
        let mut progress = Progress::default();
        progress.mark_completed(&UploadOutcome::succeeded(
            PathBuf::from("/a/ok.txt"),
            "ok.txt".into(),
            "fp-ok".into(),
        ));
        progress.mark_failed(&UploadOutcome::failed(
            PathBuf::from("/a/bad.txt"),
            "bad.txt".into(),
            "fp-bad".into(),
            "HTTP 403".into(),
        ));

        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&progress).unwrap()).unwrap();
        let doc = value.as_object().unwrap();
        for key in ["startedAt", "completedAt", "completedFiles", "failedFiles"] {
            assert!(doc.contains_key(key), "missing document key {key}");
        }

        let entry = value["completedFiles"][0].as_object().unwrap();
        for key in ["sourcePath", "blobName", "fingerprint", "timestamp"] {
            assert!(entry.contains_key(key), "missing entry key {key}");
        }
        // `error` is omitted on completed entries, present on failed ones.
        assert!(!entry.contains_key("error"));
        assert_eq!(value["failedFiles"][0]["error"], "HTTP 403");
    }

    #[test]
    fn fixture_roundtrips_unchanged() {
        let text = load_fixture_text("upload-progress.json");
        let progress: Progress = serde_json::from_str(&text).unwrap();
        let reserialized: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&progress).unwrap()).unwrap();
        let original: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reserialized, original);
    }

    #[test]
    fn store_resumes_from_fixture_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload-progress.json");
        std::fs::write(&path, load_fixture_text("upload-progress.json")).unwrap();

        let progress = ProgressStore::new(&path).load();

        let mut done = DiscoveredFile::new(
            PathBuf::from("/data/reports/2026-02.csv"),
            10,
            PathBuf::from("/data/reports"),
        );
        done.fingerprint = Some("XrY7u+Ae7tCTyyK7j1rNww==".into());
        assert!(progress.is_completed(&done));

        // The failed file is not completed; it will be retried.
        let mut failed = DiscoveredFile::new(
            PathBuf::from("/data/reports/broken.csv"),
            10,
            PathBuf::from("/data/reports"),
        );
        failed.fingerprint = Some("1B2M2Y8AsgTpgAmY7PhCfg==".into());
        assert!(!progress.is_completed(&failed));
    }
}
