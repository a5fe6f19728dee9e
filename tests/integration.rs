use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use backhaul::archive::MARKER_NAME;
use backhaul::config::{BackupConfig, RetentionConfig};
use backhaul::run::run;
use backhaul::storage::{LocalBackend, StorageBackend};

static TRACING_INIT: std::sync::Once = std::sync::Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .init();
    });
}

fn make_config(source: &Path, work: &Path, daily: usize) -> BackupConfig {
    init_tracing();
    BackupConfig {
        bucket: "integration-bucket".into(),
        prefix: "backups".into(),
        data_dir: source.to_string_lossy().into_owned(),
        work_dir: Some(work.to_string_lossy().into_owned()),
        retention: RetentionConfig {
            daily,
            ..RetentionConfig::default()
        },
    }
}

fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
    let file = fs::File::open(path).unwrap();
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut entries = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let name = entry.path().unwrap().to_string_lossy().into_owned();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        entries.push((name, content));
    }
    entries
}

#[test]
fn full_pipeline_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("data");
    fs::create_dir(&source).unwrap();
    fs::write(source.join("a.txt"), "hello").unwrap();
    fs::create_dir(source.join("sub")).unwrap();
    fs::write(source.join("sub").join("b.txt"), "world").unwrap();

    let remote_root = tmp.path().join("remote");
    fs::create_dir(&remote_root).unwrap();
    let backend = LocalBackend::new(remote_root.to_str().unwrap()).unwrap();

    let config = make_config(&source, &tmp.path().join("work"), 7);
    let report = run(&config, &backend, "daily").unwrap();
    assert!(report.warnings.is_empty());

    // Exactly one new remote object under the daily prefix.
    let keys = backend.list("backups/daily").unwrap();
    assert_eq!(keys, vec![report.remote_key.clone()]);

    // Extracting the uploaded object reproduces every file's relative path
    // and byte content, preceded by the marker entry.
    let entries = read_entries(&remote_root.join(&report.remote_key));
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].0, MARKER_NAME);
    assert_eq!(
        entries[0].1,
        format!("daily/{}\n", report.timestamp).into_bytes()
    );
    assert_eq!(entries[1], ("a.txt".to_string(), b"hello".to_vec()));
    assert_eq!(entries[2], ("sub/b.txt".to_string(), b"world".to_vec()));

    // Temp state is gone.
    assert!(!config.work_dir().exists());
}

#[test]
fn pipeline_prunes_seeded_history() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("data");
    fs::create_dir(&source).unwrap();
    fs::write(source.join("state.db"), "contents").unwrap();

    let remote_root = tmp.path().join("remote");
    fs::create_dir(&remote_root).unwrap();
    let backend = LocalBackend::new(remote_root.to_str().unwrap()).unwrap();

    // Five historical daily archives, oldest first.
    for day in 1..=5 {
        let key = format!("backups/daily/2020-01-{day:02}T00:00:00Z.tar.gz");
        let data = b"historical archive";
        let mut cursor = std::io::Cursor::new(&data[..]);
        backend
            .put_stream(&key, &mut cursor, data.len() as u64)
            .unwrap();
    }

    let config = make_config(&source, &tmp.path().join("work"), 3);
    let report = run(&config, &backend, "daily").unwrap();
    assert!(report.warnings.is_empty());

    let mut keys = backend.list("backups/daily").unwrap();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "backups/daily/2020-01-04T00:00:00Z.tar.gz".to_string(),
            "backups/daily/2020-01-05T00:00:00Z.tar.gz".to_string(),
            report.remote_key.clone(),
        ]
    );

    // Other tiers are untouched by a daily run.
    assert!(backend.list("backups/hourly").unwrap().is_empty());
}
