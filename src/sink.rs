//! Append-only result buckets.
//!
//! Every finished probe ends up as one line in one bucket. [`FileSink`] keeps
//! one append handle per bucket file behind a lock, so concurrent probes
//! never interleave partial lines.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::probe::{Bucket, SinkError};

pub trait ResultSink: Send + Sync {
    fn record(
        &self,
        bucket: &Bucket,
        line: &str,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// One `<dir>/<bucket>` file per bucket, opened lazily in append mode.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    files: Mutex<HashMap<Bucket, File>>,
}

impl FileSink {
    /// Creates `dir` when missing.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| SinkError::Open {
                path: dir.clone(),
                source,
            })?;
        Ok(Self {
            dir,
            files: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, bucket: &Bucket) -> PathBuf {
        self.dir.join(bucket.name())
    }

    /// Flushes every open bucket handle.
    pub async fn flush(&self) -> Result<(), SinkError> {
        let mut files = self.files.lock().await;
        for (bucket, file) in files.iter_mut() {
            file.flush().await.map_err(|source| SinkError::Write {
                bucket: bucket.to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

impl ResultSink for FileSink {
    fn record(
        &self,
        bucket: &Bucket,
        line: &str,
    ) -> impl Future<Output = Result<(), SinkError>> + Send {
        async move {
            let mut files = self.files.lock().await;
            let file = match files.entry(bucket.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let path = self.path_of(bucket);
                    let file = OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&path)
                        .await
                        .map_err(|source| SinkError::Open { path, source })?;
                    entry.insert(file)
                }
            };
            let mut payload = String::with_capacity(line.len() + 1);
            payload.push_str(line);
            payload.push('\n');
            let write = async {
                file.write_all(payload.as_bytes()).await?;
                file.flush().await
            };
            write.await.map_err(|source| SinkError::Write {
                bucket: bucket.to_string(),
                source,
            })
        }
    }
}

/// Keeps records in memory; handy for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: StdMutex<Vec<(Bucket, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Bucket, String)> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn lines(&self, bucket: &Bucket) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(b, _)| b == bucket)
            .map(|(_, line)| line)
            .collect()
    }
}

impl ResultSink for MemorySink {
    fn record(
        &self,
        bucket: &Bucket,
        line: &str,
    ) -> impl Future<Output = Result<(), SinkError>> + Send {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((bucket.clone(), line.to_string()));
        std::future::ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn file_sink_appends_one_line_per_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = FileSink::create(dir.path().join("retornos"))
            .await
            .expect("sink");
        sink.record(&Bucket::LIVE, "a@example.com").await.expect("write");
        sink.record(&Bucket::LIVE, "b@example.com").await.expect("write");
        sink.record(&Bucket::DIE, "c@example.com").await.expect("write");

        let live = std::fs::read_to_string(sink.path_of(&Bucket::LIVE)).expect("read");
        assert_eq!(live, "a@example.com\nb@example.com\n");
        let die = std::fs::read_to_string(dir.path().join("retornos/DIE.txt")).expect("read");
        assert_eq!(die, "c@example.com\n");
    }

    #[tokio::test]
    async fn file_sink_appends_to_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("Unknow.txt"), "old@example.com\n").expect("seed");
        let sink = FileSink::create(dir.path()).await.expect("sink");
        sink.record(&Bucket::UNKNOWN, "new@example.com")
            .await
            .expect("write");
        let text = std::fs::read_to_string(sink.path_of(&Bucket::UNKNOWN)).expect("read");
        assert_eq!(text, "old@example.com\nnew@example.com\n");
    }

    #[tokio::test]
    async fn concurrent_writers_keep_lines_whole() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = Arc::new(FileSink::create(dir.path()).await.expect("sink"));
        let mut tasks = Vec::new();
        for i in 0..50 {
            let sink = Arc::clone(&sink);
            tasks.push(tokio::spawn(async move {
                sink.record(&Bucket::ERROR, &format!("user{i}@example.com"))
                    .await
                    .expect("write");
            }));
        }
        for task in tasks {
            task.await.expect("task");
        }
        let text = std::fs::read_to_string(sink.path_of(&Bucket::ERROR)).expect("read");
        let mut lines: Vec<&str> = text.lines().collect();
        lines.sort();
        assert_eq!(lines.len(), 50);
        assert!(lines.iter().all(|l| l.starts_with("user") && l.ends_with("@example.com")));
    }

    #[tokio::test]
    async fn memory_sink_filters_by_bucket() {
        let sink = MemorySink::new();
        sink.record(&Bucket::LIVE, "a@example.com").await.expect("write");
        sink.record(&Bucket::new("IG.txt"), "b@ig.com.br")
            .await
            .expect("write");
        assert_eq!(sink.lines(&Bucket::LIVE), vec!["a@example.com"]);
        assert_eq!(sink.lines(&Bucket::new("IG.txt")), vec!["b@ig.com.br"]);
        assert_eq!(sink.records().len(), 2);
    }
}
