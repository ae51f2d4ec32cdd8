use anyhow::{anyhow, Result};
use chrono::{Duration, Local, NaiveDate};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::models::usage::{DayUsage, TokenUsageRecord, TokenUsageStats};

const LOG_FILE: &str = "token_usage.ndjson";
const STATS_FILE: &str = "token_usage_stats.json";

/// Flush the in-memory buffer to disk every this many records.
const FLUSH_THRESHOLD: usize = 20;

/// Records every provider attempt and maintains incremental per-day and
/// per-model rollups. Raw records append to an NDJSON log; the rollup JSON
/// is rewritten on each flush via temp-file-then-rename so a crash can
/// never leave it truncated.
pub struct UsageTracker {
    log_path: PathBuf,
    stats_path: PathBuf,
    inner: Mutex<TrackerInner>,
}

struct TrackerInner {
    buffer: Vec<TokenUsageRecord>,
    stats: TokenUsageStats,
}

impl UsageTracker {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let log_path = dir.join(LOG_FILE);
        let stats_path = dir.join(STATS_FILE);

        let mut stats = match fs::read_to_string(&stats_path) {
            Ok(contents) => match serde_json::from_str::<TokenUsageStats>(&contents) {
                Ok(stats) => stats,
                Err(e) => {
                    log::warn!("could not parse {}, starting fresh: {}", STATS_FILE, e);
                    TokenUsageStats::default()
                }
            },
            Err(_) => TokenUsageStats::default(),
        };

        // Legacy rollup files carried only per-day data. Reconstruct the
        // all-time per-model table from the day breakdowns once.
        if stats.models.is_empty() && !stats.days.is_empty() {
            log::info!("rebuilding per-model totals from legacy per-day rollups");
            for day in stats.days.values() {
                for (model, totals) in &day.by_model {
                    stats
                        .models
                        .entry(model.clone())
                        .or_default()
                        .add_totals(totals);
                }
            }
        }

        Ok(Self {
            log_path,
            stats_path,
            inner: Mutex::new(TrackerInner {
                buffer: Vec::new(),
                stats,
            }),
        })
    }

    pub fn track_usage(&self, record: TokenUsageRecord) -> Result<()> {
        let mut inner = self.lock()?;

        let day = record.day_key();
        inner.stats.days.entry(day).or_default().add_record(&record);
        inner
            .stats
            .models
            .entry(record.model.clone())
            .or_default()
            .add_record(&record);

        inner.buffer.push(record);
        if inner.buffer.len() >= FLUSH_THRESHOLD {
            self.flush_locked(&mut inner)?;
        }
        Ok(())
    }

    pub fn get_today_usage(&self) -> Result<DayUsage> {
        self.get_usage_by_date(Local::now().date_naive())
            .map(|usage| usage.unwrap_or_default())
    }

    pub fn get_usage_by_date(&self, date: NaiveDate) -> Result<Option<DayUsage>> {
        let inner = self.lock()?;
        let key = date.format("%Y-%m-%d").to_string();
        Ok(inner.stats.days.get(&key).cloned())
    }

    /// Per-day usage for the last `days` days (including today), oldest
    /// first. Days with no recorded usage are omitted.
    pub fn get_recent_usage(&self, days: u32) -> Result<Vec<(String, DayUsage)>> {
        let inner = self.lock()?;
        let today = Local::now().date_naive();
        let mut recent = Vec::new();
        for offset in (0..days as i64).rev() {
            let key = (today - Duration::days(offset))
                .format("%Y-%m-%d")
                .to_string();
            if let Some(usage) = inner.stats.days.get(&key) {
                recent.push((key, usage.clone()));
            }
        }
        Ok(recent)
    }

    /// All-time totals for one model, if any attempt against it was made.
    pub fn get_model_totals(
        &self,
        model: &str,
    ) -> Result<Option<crate::models::usage::TokenTotals>> {
        let inner = self.lock()?;
        Ok(inner.stats.models.get(model).cloned())
    }

    pub fn flush(&self) -> Result<()> {
        let mut inner = self.lock()?;
        self.flush_locked(&mut inner)
    }

    fn flush_locked(&self, inner: &mut TrackerInner) -> Result<()> {
        if !inner.buffer.is_empty() {
            let mut log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.log_path)?;
            for record in &inner.buffer {
                let line = serde_json::to_string(record)?;
                writeln!(log_file, "{}", line)?;
            }
            inner.buffer.clear();
        }

        // Never truncate the rollup in place: write a sibling temp file and
        // rename it over the old one.
        let tmp_path = self.stats_path.with_extension("json.tmp");
        let serialized = serde_json::to_vec_pretty(&inner.stats)?;
        fs::write(&tmp_path, serialized)?;
        fs::rename(&tmp_path, &self.stats_path)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, TrackerInner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("usage tracker lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::usage::TokenTotals;

    fn record(model: &str, total: i64, success: bool) -> TokenUsageRecord {
        let prompt = total / 2;
        TokenUsageRecord {
            timestamp: Local::now(),
            model: model.to_string(),
            prompt_tokens: prompt,
            completion_tokens: total - prompt,
            total_tokens: total,
            endpoint: "https://test.invalid/v1".to_string(),
            success,
        }
    }

    #[test]
    fn test_day_totals_equal_sum_of_records() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = UsageTracker::open(dir.path()).unwrap();

        let totals = [120, 80, 42];
        for t in totals {
            tracker.track_usage(record("haiku", t, true)).unwrap();
        }
        tracker.track_usage(record("haiku", 0, false)).unwrap();

        let today = tracker.get_today_usage().unwrap();
        assert_eq!(today.total_tokens, totals.iter().sum::<i64>());
        assert_eq!(today.requests, 4);
        assert_eq!(today.failures, 1);
    }

    #[test]
    fn test_reload_reproduces_aggregates() {
        let dir = tempfile::tempdir().unwrap();
        {
            let tracker = UsageTracker::open(dir.path()).unwrap();
            tracker.track_usage(record("haiku", 100, true)).unwrap();
            tracker.track_usage(record("gpt-4o-mini", 60, true)).unwrap();
            tracker.flush().unwrap();
        }

        let reloaded = UsageTracker::open(dir.path()).unwrap();
        let today = reloaded.get_today_usage().unwrap();
        assert_eq!(today.total_tokens, 160);
        assert_eq!(today.requests, 2);
        assert_eq!(today.by_model["haiku"].total_tokens, 100);
        assert_eq!(
            reloaded
                .get_model_totals("gpt-4o-mini")
                .unwrap()
                .unwrap()
                .total_tokens,
            60
        );
    }

    #[test]
    fn test_legacy_rollup_rebuilds_model_totals() {
        let dir = tempfile::tempdir().unwrap();

        let mut day = DayUsage::default();
        day.total_tokens = 300;
        day.requests = 3;
        day.by_model.insert(
            "haiku".to_string(),
            TokenTotals {
                prompt_tokens: 200,
                completion_tokens: 100,
                total_tokens: 300,
                requests: 3,
            },
        );
        let legacy = serde_json::json!({ "days": { "2026-08-01": day } });
        fs::write(
            dir.path().join(STATS_FILE),
            serde_json::to_vec(&legacy).unwrap(),
        )
        .unwrap();

        let tracker = UsageTracker::open(dir.path()).unwrap();
        let totals = tracker.get_model_totals("haiku").unwrap().unwrap();
        assert_eq!(totals.total_tokens, 300);
        assert_eq!(totals.requests, 3);
    }

    #[test]
    fn test_buffer_auto_flushes_at_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = UsageTracker::open(dir.path()).unwrap();

        for _ in 0..FLUSH_THRESHOLD {
            tracker.track_usage(record("haiku", 10, true)).unwrap();
        }

        let log = fs::read_to_string(dir.path().join(LOG_FILE)).unwrap();
        assert_eq!(log.lines().count(), FLUSH_THRESHOLD);
        // Rollup was rewritten too and is valid JSON
        let stats: TokenUsageStats = serde_json::from_str(
            &fs::read_to_string(dir.path().join(STATS_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(stats.models["haiku"].requests, FLUSH_THRESHOLD as i64);
    }

    #[test]
    fn test_corrupt_rollup_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STATS_FILE), b"{ not json").unwrap();

        let tracker = UsageTracker::open(dir.path()).unwrap();
        assert_eq!(tracker.get_today_usage().unwrap(), DayUsage::default());
    }

    #[test]
    fn test_recent_usage_is_chronological() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = UsageTracker::open(dir.path()).unwrap();
        tracker.track_usage(record("haiku", 50, true)).unwrap();

        let recent = tracker.get_recent_usage(7).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].1.total_tokens, 50);
    }
}
