use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use sluice_adapter::{CachedResponse, ResponseCache};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, warn};

// redb table: key = edge cache key, value = JSON encoded CachedResponse
const EDGE_CACHE: TableDefinition<'_, &str, &[u8]> = TableDefinition::new("edge_cache");

pub const DEFAULT_SWEEP_SCHEDULE: &str = "0 */5 * * * *";

/// Persistent edge cache.
///
/// A memory-mapped redb database holding fully buffered public responses
/// until their `max-age` runs out, so a restart does not empty the fast tier.
/// Expired entries read as misses and are dropped by [`spawn_sweep_scheduler`].
#[derive(Clone)]
pub struct RedbResponseCache {
    db: Arc<RwLock<Database>>,
    max_entries: usize,
}

impl RedbResponseCache {
    /// Open or create the cache database
    pub fn open(path: &Path, max_entries: usize) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let db = Database::create(path)
            .with_context(|| format!("opening edge cache at {}", path.display()))?;

        // Initialize table
        let write_txn = db.begin_write()?;
        {
            let _table = write_txn.open_table(EDGE_CACHE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
            max_entries: max_entries.max(1),
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(EDGE_CACHE)?;

        let Some(raw) = table.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_slice::<CachedResponse>(raw.value()) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                warn!(%key, error = %err, "dropping unreadable edge cache entry");
                Ok(None)
            }
        }
    }

    /// Stores `entry`, making room first when the table is full: expired
    /// entries go, then the one closest to expiry.
    pub fn insert(&self, key: &str, entry: &CachedResponse) -> Result<()> {
        let encoded = serde_json::to_vec(entry).context("encoding edge cache entry")?;
        let now = Utc::now();
        let db = self.db.write();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(EDGE_CACHE)?;
            let exists = table.get(key)?.is_some();
            if !exists {
                let expiries = collect_expiries(&table)?;
                if expiries.len() >= self.max_entries {
                    let mut doomed: Vec<&String> = expiries
                        .iter()
                        .filter(|(_, expires_at)| *expires_at <= now)
                        .map(|(key, _)| key)
                        .collect();
                    if doomed.is_empty()
                        && let Some((key, _)) = expiries.iter().min_by_key(|(_, at)| *at)
                    {
                        doomed.push(key);
                    }
                    for key in doomed {
                        table.remove(key.as_str())?;
                    }
                }
            }
            table.insert(key, encoded.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Removes entries that expired at or before `now`.
    pub fn remove_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let db = self.db.write();
        let write_txn = db.begin_write()?;
        let removed;
        {
            let mut table = write_txn.open_table(EDGE_CACHE)?;
            let expired: Vec<String> = collect_expiries(&table)?
                .into_iter()
                .filter(|(_, expires_at)| *expires_at <= now)
                .map(|(key, _)| key)
                .collect();
            for key in &expired {
                table.remove(key.as_str())?;
            }
            removed = expired.len() as u64;
        }
        write_txn.commit()?;
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(EDGE_CACHE)?;
        Ok(table.iter()?.flatten().count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Expiry of every entry; unreadable entries count as already expired.
fn collect_expiries<T>(table: &T) -> Result<Vec<(String, DateTime<Utc>)>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut out = Vec::new();
    for (key, value) in table.iter()?.flatten() {
        let expires_at = serde_json::from_slice::<CachedResponse>(value.value())
            .map(|entry| entry.expires_at)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        out.push((key.value().to_string(), expires_at));
    }
    Ok(out)
}

#[async_trait]
impl ResponseCache for RedbResponseCache {
    async fn lookup(&self, key: &str) -> Result<Option<CachedResponse>> {
        Ok(self.get(key)?.filter(|entry| !entry.is_expired(Utc::now())))
    }

    async fn put(&self, key: &str, response: CachedResponse) -> Result<()> {
        self.insert(key, &response)
    }

    async fn sweep(&self) -> Result<u64> {
        self.remove_expired(Utc::now())
    }
}

/// Runs [`ResponseCache::sweep`] on `schedule` from a dedicated scheduler
/// thread. An empty schedule disables sweeping.
pub fn spawn_sweep_scheduler(schedule: &str, cache: Arc<dyn ResponseCache>) {
    if schedule.trim().is_empty() {
        tracing::info!("Edge cache sweep disabled");
        return;
    }
    let schedule = schedule.to_string();

    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(err) => {
                tracing::error!(error = %err, "Failed to create sweep scheduler runtime");
                return;
            }
        };

        rt.block_on(async move {
            let _sched = match start_sweep_scheduler(&schedule, cache).await {
                Ok(sched) => sched,
                Err(err) => {
                    tracing::error!(schedule = %schedule, error = %err, "Edge cache sweep scheduler failed");
                    return;
                }
            };
            tracing::info!(schedule = %schedule, "Edge cache sweep scheduler started");

            // Keep the scheduler runtime alive forever
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            }
        });
    });
}

async fn start_sweep_scheduler(schedule: &str, cache: Arc<dyn ResponseCache>) -> Result<JobScheduler> {
    let sched = JobScheduler::new()
        .await
        .context("creating sweep scheduler")?;

    let job = Job::new_async(schedule, move |_uuid, _l| {
        let cache = cache.clone();
        Box::pin(async move {
            match cache.sweep().await {
                Ok(count) if count > 0 => {
                    tracing::info!(removed = count, "Swept expired edge cache entries");
                }
                Ok(_) => debug!("No expired edge cache entries"),
                Err(err) => tracing::error!(error = %err, "Edge cache sweep failed"),
            }
        })
    })
    .context("creating sweep job")?;

    sched.add(job).await.context("adding sweep job")?;
    sched.start().await.context("starting sweep scheduler")?;
    Ok(sched)
}
