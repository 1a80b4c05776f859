use std::time::{Duration, Instant};

use anyhow::Result;
use assert_matches::assert_matches;
use tempfile::TempDir;

use journey_tui::app::{EditorScreen, RecoveryChoice};
use journey_tui::cache::{CacheSlot, EntryFields, EntrySnapshot, LocalCacheStore, PutOutcome};
use journey_tui::config::{AutoSaveConfig, CacheOptions, ConfigPaths};
use journey_tui::journaling::AutosaveTick;
use journey_tui::storage::{self, KeyValueStore, SqliteStore};

fn temp_paths(root: &TempDir) -> ConfigPaths {
    let base = root.path();
    let config_dir = base.join("config");
    let data_dir = base.join("data");
    let state_dir = base.join("state");
    ConfigPaths {
        config_dir: config_dir.clone(),
        config_file: config_dir.join("config.toml"),
        data_dir: data_dir.clone(),
        cache_db_path: data_dir.join("cache.db"),
        log_dir: state_dir.join("logs"),
        state_dir,
    }
}

fn open_store(root: &TempDir, quota_bytes: u64) -> Result<SqliteStore> {
    let paths = temp_paths(root);
    paths.ensure_directories()?;
    let options = CacheOptions {
        quota_bytes,
        ..CacheOptions::default()
    };
    storage::init(&paths, &options)
}

fn snapshot(slot: CacheSlot, title: &str, cached_at: i64) -> EntrySnapshot {
    let fields = EntryFields {
        title: title.to_string(),
        notebook_id: Some(1),
        ..EntryFields::default()
    };
    EntrySnapshot::capture(slot, &fields, cached_at, None).expect("notebook present")
}

#[test]
fn unsaved_entry_survives_a_restart() -> Result<()> {
    let root = TempDir::new()?;
    let now = Instant::now();
    let interval = AutoSaveConfig::default().interval();
    {
        let cache = LocalCacheStore::new(open_store(&root, 0)?);
        let mut screen = EditorScreen::open_new(cache, &AutoSaveConfig::default(), Some(1), now);
        screen
            .editor_mut()
            .expect("mounted")
            .active_mut()
            .insert_str("Before the crash");
        assert_matches!(screen.on_tick(now + interval), AutosaveTick::Wrote(_));
    }

    let cache = LocalCacheStore::new(open_store(&root, 0)?);
    let mut screen = EditorScreen::open_new(cache, &AutoSaveConfig::default(), Some(1), now);
    assert!(screen.is_recovering());
    assert_eq!(screen.choose_recovery(RecoveryChoice::Continue, now), None);
    assert_eq!(screen.editor().title().text(), "Before the crash");
    assert!(!screen.has_unsaved_changes());

    screen.on_tick(now + Duration::from_millis(100));
    assert_matches!(
        screen.on_tick(now + interval),
        AutosaveTick::Unchanged | AutosaveTick::Idle
    );
    Ok(())
}

#[test]
fn quota_failure_sweeps_cached_snapshots_and_retries() -> Result<()> {
    let root = TempDir::new()?;
    let store = open_store(&root, 2_000)?;
    store.set("unrelated_setting", "x")?;
    let cache = LocalCacheStore::new(store.clone());

    assert_eq!(cache.put(&snapshot(CacheSlot::Editing(1), "first", 1_000)), PutOutcome::Written);
    assert_eq!(cache.put(&snapshot(CacheSlot::Editing(2), "second", 2_000)), PutOutcome::Written);

    let large = "a".repeat(1_600);
    assert_eq!(
        cache.put(&snapshot(CacheSlot::New, &large, 3_000)),
        PutOutcome::WrittenAfterSweep
    );
    assert!(cache.list_editing().is_empty());
    assert_eq!(
        cache.get(CacheSlot::New).map(|s| s.title.len()),
        Some(1_600)
    );
    assert_eq!(store.get("unrelated_setting")?.as_deref(), Some("x"));
    assert!(store.used_bytes()? <= 2_000);
    Ok(())
}

#[test]
fn snapshot_larger_than_quota_is_dropped() -> Result<()> {
    let root = TempDir::new()?;
    let store = open_store(&root, 500)?;
    let cache = LocalCacheStore::new(store);
    assert_eq!(cache.put(&snapshot(CacheSlot::Editing(9), "small", 1_000)), PutOutcome::Written);

    let huge = "b".repeat(1_000);
    assert_eq!(
        cache.put(&snapshot(CacheSlot::New, &huge, 2_000)),
        PutOutcome::Dropped
    );
    assert!(cache.get(CacheSlot::New).is_none());
    assert!(!cache.has_any());
    Ok(())
}

#[test]
fn latest_prefers_non_empty_new_entry() -> Result<()> {
    let root = TempDir::new()?;
    let cache = LocalCacheStore::new(open_store(&root, 0)?);
    cache.put(&snapshot(CacheSlot::New, "", 5_000));
    cache.put(&snapshot(CacheSlot::Editing(3), "older", 1_000));
    cache.put(&snapshot(CacheSlot::Editing(4), "newer", 2_000));

    let latest = cache.get_any_latest().expect("editing snapshot");
    assert_eq!(latest.slot(), CacheSlot::Editing(4));

    cache.put(&snapshot(CacheSlot::New, "fresh", 500));
    assert_eq!(
        cache.get_any_latest().map(|s| s.slot()),
        Some(CacheSlot::New)
    );
    assert_eq!(cache.remove_all(), 3);
    Ok(())
}
