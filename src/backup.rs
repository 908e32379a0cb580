//! Scheduled weekly backup of the durable state.
//!
//! The job runs on its own task and shares the durable documents with the
//! polling loop, so it snapshots through the store's read guard and the
//! same `load_*` calls used everywhere, so it can only ever observe complete
//! documents. Snapshots are timestamped directories, pruned to the newest
//! five; admins get a notice (or the error) after every tick.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::config::load_bot_config;
use crate::error::StoreError;
use crate::state::AppState;
use crate::store::StateStore;
use crate::telegram::TelegramClient;

const BACKUP_PERIOD: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const SNAPSHOTS_KEPT: usize = 5;

pub fn spawn(
    state: Arc<AppState>,
    tg: TelegramClient,
    config_path: PathBuf,
    backup_dir: PathBuf,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + BACKUP_PERIOD;
        let mut ticker = tokio::time::interval_at(start, BACKUP_PERIOD);
        loop {
            ticker.tick().await;
            // Admin list re-read per tick, same as the polling loop does.
            let cfg = load_bot_config(&config_path).unwrap_or_default();
            let result = {
                let store = state.store.read().await;
                run_once(&store, &backup_dir, Utc::now())
            };
            let notice = match result {
                Ok(snap) => {
                    info!(target: "backup", path = %snap.display(), "Weekly backup written");
                    format!("Weekly backup written: {}", snap.display())
                }
                Err(e) => {
                    error!(target: "backup", error = %e, "Weekly backup failed");
                    format!("Weekly backup FAILED: {e}")
                }
            };
            for admin in &cfg.admin_users {
                if let Err(e) = tg.send_message(*admin, &notice).await {
                    warn!(target: "backup", admin, error = %e, "Backup notice not delivered");
                }
            }
        }
    })
}

/// Take one snapshot. Reads both documents through the store (structural
/// validation included), writes them under `backup_dir/<timestamp>/`, then
/// prunes old snapshots.
#[instrument(level = "info", skip(store))]
pub fn run_once(
    store: &StateStore,
    backup_dir: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf, StoreError> {
    let quizzes = store.load_quizzes()?;
    let progress = store.load_progress()?;

    let snap = backup_dir.join(now.format("%Y%m%d_%H%M%S").to_string());
    fs::create_dir_all(&snap).map_err(|e| StoreError::Io { path: snap.clone(), source: e })?;
    write_snapshot(&snap.join("quizzes.json"), &quizzes)?;
    write_snapshot(&snap.join("quiz_progress.json"), &progress)?;

    prune(backup_dir, SNAPSHOTS_KEPT);
    Ok(snap)
}

fn write_snapshot<T: serde::Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    let mut raw = serde_json::to_vec_pretty(items)
        .map_err(|e| StoreError::Corrupt { path: path.to_path_buf(), source: e })?;
    raw.push(b'\n');
    fs::write(path, raw).map_err(|e| StoreError::Io { path: path.to_path_buf(), source: e })
}

/// Keep only the newest `keep` snapshot directories. Timestamped names sort
/// chronologically, so lexicographic order is enough.
fn prune(backup_dir: &Path, keep: usize) {
    let Ok(entries) = fs::read_dir(backup_dir) else { return };
    let mut snaps: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    snaps.sort();
    if snaps.len() <= keep {
        return;
    }
    let excess = snaps.len() - keep;
    for old in &snaps[..excess] {
        match fs::remove_dir_all(old) {
            Ok(()) => info!(target: "backup", path = %old.display(), "Pruned old snapshot"),
            Err(e) => warn!(target: "backup", path = %old.display(), error = %e, "Failed to prune snapshot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Question, Quiz};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn sample_quiz() -> Quiz {
        Quiz {
            id: "q1".into(),
            title: "Quiz q1".into(),
            hidden: false,
            questions: vec![Question { prompt: "2+2=?".into(), expected: "4".into() }],
        }
    }

    #[test]
    fn snapshot_contains_both_documents() {
        let data = tempdir().unwrap();
        let store = StateStore::new(data.path());
        store.save_quizzes(&[sample_quiz()]).unwrap();

        let backups = data.path().join("backups");
        let now = Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).unwrap();
        let snap = run_once(&store, &backups, now).unwrap();
        assert!(snap.ends_with("20260827_120000"));
        assert!(snap.join("quizzes.json").exists());
        assert!(snap.join("quiz_progress.json").exists());

        let raw = fs::read_to_string(snap.join("quizzes.json")).unwrap();
        let quizzes: Vec<Quiz> = serde_json::from_str(&raw).unwrap();
        assert_eq!(quizzes.len(), 1);
    }

    #[test]
    fn corrupt_state_aborts_the_snapshot() {
        let data = tempdir().unwrap();
        let store = StateStore::new(data.path());
        fs::write(data.path().join("quizzes.json"), "{ broken").unwrap();
        let backups = data.path().join("backups");
        assert!(matches!(
            run_once(&store, &backups, Utc::now()),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn only_the_newest_five_snapshots_survive() {
        let data = tempdir().unwrap();
        let store = StateStore::new(data.path());
        store.save_quizzes(&[sample_quiz()]).unwrap();
        let backups = data.path().join("backups");

        for hour in 0..8 {
            let now = Utc.with_ymd_and_hms(2026, 8, 27, hour, 0, 0).unwrap();
            run_once(&store, &backups, now).unwrap();
        }
        let mut left: Vec<String> = fs::read_dir(&backups)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        left.sort();
        assert_eq!(left.len(), 5);
        assert_eq!(left[0], "20260827_030000");
    }
}
