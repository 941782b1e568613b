use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncReadExt, AsyncWriteExt},
};

use crate::object::{ObjectMetadata, ObjectStore, StoredObject};

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_MS: u64 = 100;

/// Object store on the local filesystem.
///
/// Keys are addressed by their SHA-256 digest and fanned out over 256
/// directories: `<root>/ab/<digest>` holds the body and `<digest>.meta.json`
/// the metadata. Both files are written through a temp file and renamed into
/// place, metadata last, so a reader never sees metadata without its body.
#[derive(Clone)]
pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    pub fn new(root: PathBuf) -> Self {
        FilesystemStorage { root }
    }

    pub async fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating storage root {}", self.root.display()))
    }

    pub(crate) fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Relative location of the body file for `key`.
    pub(crate) fn object_path(key: &str) -> String {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        format!("{}/{}", &digest[..2], digest)
    }

    fn meta_path(key: &str) -> String {
        format!("{}.meta.json", Self::object_path(key))
    }

    pub(crate) async fn open_read(&self, relative: &str) -> Result<Option<FileHandle>> {
        let path = self.resolve(relative);
        let file = match retry_io("open", &path, || File::open(&path)).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(anyhow::Error::from(err)
                    .context(format!("opening stored object {}", path.display())));
            }
        };
        let size = file
            .metadata()
            .await
            .with_context(|| format!("reading metadata {}", path.display()))?
            .len();
        Ok(Some(FileHandle { file, size, path }))
    }

    pub(crate) async fn create_temp_writer(&self, relative: &str) -> Result<TempFile> {
        let final_path = self.resolve(relative);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating storage dir {}", parent.display()))?;
        }

        let tmp_path = temp_path_for(&final_path);
        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        let file = retry_io("create", &tmp_path, || options.open(&tmp_path))
            .await
            .with_context(|| format!("creating temp file {}", tmp_path.display()))?;

        Ok(TempFile {
            tmp_path,
            final_path,
            file,
        })
    }

    async fn write_file(&self, relative: &str, data: &[u8]) -> Result<()> {
        let mut temp = self.create_temp_writer(relative).await?;
        if let Err(err) = temp.file_mut().write_all(data).await {
            temp.rollback().await?;
            return Err(anyhow::Error::from(err).context(format!("writing {relative}")));
        }
        temp.commit().await
    }

    async fn read_file(&self, relative: &str) -> Result<Option<Vec<u8>>> {
        let Some(mut handle) = self.open_read(relative).await? else {
            return Ok(None);
        };
        let mut buf = Vec::with_capacity(usize::try_from(handle.size).unwrap_or_default());
        handle
            .file
            .read_to_end(&mut buf)
            .await
            .with_context(|| format!("reading {}", handle.path.display()))?;
        Ok(Some(buf))
    }

    async fn remove_file(&self, relative: &str) -> Result<bool> {
        let path = self.resolve(relative);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => {
                Err(anyhow::Error::from(e).context(format!("removing {}", path.display())))
            }
        }
    }
}

#[async_trait]
impl ObjectStore for FilesystemStorage {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        let Some(raw_meta) = self.read_file(&Self::meta_path(key)).await? else {
            return Ok(None);
        };
        let metadata: ObjectMetadata = match serde_json::from_slice(&raw_meta) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(key, error = %err, "discarding unreadable object metadata");
                return Ok(None);
            }
        };
        let Some(body) = self.read_file(&Self::object_path(key)).await? else {
            return Ok(None);
        };
        Ok(Some(StoredObject {
            body: Bytes::from(body),
            metadata,
        }))
    }

    async fn put(&self, key: &str, body: Bytes, metadata: ObjectMetadata) -> Result<()> {
        let meta = serde_json::to_vec(&metadata).context("encoding object metadata")?;
        self.write_file(&Self::object_path(key), &body)
            .await
            .with_context(|| format!("storing object {key}"))?;
        self.write_file(&Self::meta_path(key), &meta)
            .await
            .with_context(|| format!("storing metadata for {key}"))
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        let mut removed = 0;
        for key in keys {
            // metadata first: without it the body is invisible to readers
            let had_meta = self.remove_file(&Self::meta_path(key)).await?;
            let had_body = self.remove_file(&Self::object_path(key)).await?;
            if had_meta || had_body {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

pub(crate) struct FileHandle {
    pub(crate) file: File,
    pub(crate) size: u64,
    pub(crate) path: PathBuf,
}

pub(crate) struct TempFile {
    tmp_path: PathBuf,
    final_path: PathBuf,
    file: File,
}

impl TempFile {
    pub(crate) fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    pub(crate) async fn commit(self) -> Result<()> {
        let Self {
            tmp_path,
            final_path,
            mut file,
        } = self;

        file.flush()
            .await
            .with_context(|| format!("flushing {}", tmp_path.display()))?;
        drop(file);

        retry_io("rename", &tmp_path, || fs::rename(&tmp_path, &final_path))
            .await
            .with_context(|| {
                format!("moving {} to {}", tmp_path.display(), final_path.display())
            })
    }

    pub(crate) async fn rollback(self) -> Result<()> {
        let Self { tmp_path, file, .. } = self;
        drop(file);
        match fs::remove_file(&tmp_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::from(e)
                .context(format!("removing temp file {}", tmp_path.display()))),
        }
    }
}

fn temp_path_for(final_path: &Path) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let pid = std::process::id();
    let tmp_name = match final_path.file_name().and_then(|s| s.to_str()) {
        Some(name) => format!("{name}.tmp-{pid}-{timestamp}"),
        None => format!("tmp-{pid}-{timestamp}"),
    };
    final_path.with_file_name(tmp_name)
}

/// Runs `op` up to [`MAX_ATTEMPTS`] times while it fails with a transient
/// error, sleeping [`BACKOFF_MS`] between attempts.
async fn retry_io<T, F, Fut>(label: &str, path: &Path, mut op: F) -> std::io::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::io::Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Err(err) if should_retry(&err) && attempt < MAX_ATTEMPTS => {
                tracing::debug!(
                    op = label,
                    attempt,
                    path = %path.display(),
                    error = %err,
                    "transient storage error, retrying"
                );
                tokio::time::sleep(Duration::from_millis(BACKOFF_MS)).await;
            }
            result => return result,
        }
    }
}

/// Determines if an I/O error should be retried
fn should_retry(error: &std::io::Error) -> bool {
    matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted)
        || matches!(error.raw_os_error(), Some(16) | Some(11))
    // 16 = EBUSY (Device or resource busy)
    // 11 = EAGAIN (Resource temporarily unavailable)
}
