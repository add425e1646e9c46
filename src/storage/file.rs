use super::{MessageStorage, StorageError, apply_limit};
use crate::domain::message::{Message, MessageId, NewMessage};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const RECORD_EXT: &str = "json";
const SEQUENCE_FILE: &str = "sequence";
const TMP_SUFFIX: &str = ".tmp";

/// One JSON file per message, named by zero-padded id, plus a `sequence` file
/// holding the last id handed out.
///
/// Every file is written to a temporary name and renamed into place, so readers
/// see either the whole record or nothing. All operations go through one mutex.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Opens (creating if needed) the message directory and removes temporary
    /// files left behind by an interrupted write.
    ///
    /// # Errors
    /// Returns `StorageError::Io` if the directory cannot be created or scanned.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().ends_with(TMP_SUFFIX) {
                tracing::warn!(path = %entry.path().display(), "Removing stale temporary file");
                fs::remove_file(entry.path()).await?;
            }
        }

        Ok(Self { dir, lock: Mutex::new(()) })
    }

    fn record_path(&self, id: MessageId) -> PathBuf {
        self.dir.join(format!("{:020}.{RECORD_EXT}", id.0))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| StorageError::Corrupt(format!("invalid path {}", path.display())))?
            .to_string_lossy();
        let tmp = self.dir.join(format!(".{file_name}{TMP_SUFFIX}"));

        let result = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            fs::rename(&tmp, path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn record_paths(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|ext| ext == RECORD_EXT)
                && !entry.file_name().to_string_lossy().starts_with('.');
            if is_record {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    async fn read_record(path: &Path) -> Result<Message, StorageError> {
        let bytes = fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Last id handed out. Falls back to the highest id on disk when the
    /// sequence file is missing.
    async fn last_id(&self) -> Result<i64, StorageError> {
        match fs::read_to_string(self.dir.join(SEQUENCE_FILE)).await {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| StorageError::Corrupt(format!("sequence file holds {raw:?}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut max = 0;
                for path in self.record_paths().await? {
                    let id = path
                        .file_stem()
                        .and_then(|stem| stem.to_str())
                        .and_then(|stem| stem.parse::<i64>().ok())
                        .unwrap_or(0);
                    max = max.max(id);
                }
                Ok(max)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn store_last_id(&self, id: i64) -> Result<(), StorageError> {
        self.write_atomic(&self.dir.join(SEQUENCE_FILE), id.to_string().as_bytes()).await
    }
}

#[async_trait]
impl MessageStorage for FileStorage {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn insert_record(&self, message: NewMessage) -> Result<Message, StorageError> {
        let _guard = self.lock.lock().await;

        let id = MessageId(self.last_id().await? + 1);
        // Sequence first: a crash between the two writes leaves a gap, never a reused id.
        self.store_last_id(id.0).await?;

        let record = Message {
            id,
            content: message.content.into_inner(),
            created_at: OffsetDateTime::now_utc(),
            origin: message.meta.origin,
            user_agent: message.meta.user_agent,
        };
        let bytes = serde_json::to_vec_pretty(&record)?;
        self.write_atomic(&self.record_path(id), &bytes).await?;

        tracing::debug!(id = %id, "message file written");
        Ok(record)
    }

    async fn query_all(&self, limit: Option<i64>) -> Result<Vec<Message>, StorageError> {
        let _guard = self.lock.lock().await;

        let paths = self.record_paths().await?;
        let mut messages = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::read_record(&path).await {
                Ok(message) => messages.push(message),
                Err(StorageError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        messages.sort_by(Message::newest_first);
        apply_limit(&mut messages, limit);
        Ok(messages)
    }

    async fn query_count(&self) -> Result<i64, StorageError> {
        let _guard = self.lock.lock().await;
        let count = self.record_paths().await?.len();
        i64::try_from(count).map_err(|_| StorageError::Corrupt("record count overflow".into()))
    }

    async fn delete_one(&self, id: MessageId) -> Result<bool, StorageError> {
        let _guard = self.lock.lock().await;
        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_all(&self, reset_sequence: bool) -> Result<u64, StorageError> {
        let _guard = self.lock.lock().await;

        // Pin the sequence before removing files so the fallback scan cannot lower it.
        let last_id = self.last_id().await?;
        self.store_last_id(last_id).await?;

        let mut removed = 0;
        for path in self.record_paths().await? {
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        // Only rewind once nothing is left that a reissued id could overwrite.
        if reset_sequence {
            self.store_last_id(0).await?;
        }
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let metadata = fs::metadata(&self.dir).await?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(StorageError::Corrupt(format!("{} is not a directory", self.dir.display())))
        }
    }
}
