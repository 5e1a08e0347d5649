//! Client-side upload pipeline.
//!
//! slice → hash (separate task) → check → upload missing chunks with
//! bounded parallelism → re-check → merge.

use std::path::Path;
use std::sync::Arc;

use bigfile_transfer::{
    ChunkReader, Fingerprint, Slicer, spawn_file_hasher, validate_file_name,
};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::transport::{ChunkUpload, RemoteStatus, UploadTransport};
use crate::types::{UploadEvent, UploadOutcome, UploaderConfig};

/// Fixed facts about the file being uploaded.
struct UploadPlan {
    fingerprint: Fingerprint,
    file_name: String,
    slicer: Slicer,
    /// Declared chunk count; 1 for an empty file.
    total: u32,
}

/// Drives resumable uploads through an [`UploadTransport`].
pub struct UploadOrchestrator<T> {
    transport: Arc<T>,
    config: UploaderConfig,
    cancel: CancellationToken,
}

impl<T: UploadTransport + 'static> UploadOrchestrator<T> {
    pub fn new(transport: Arc<T>, config: UploaderConfig, cancel: CancellationToken) -> Self {
        Self {
            transport,
            config,
            cancel,
        }
    }

    /// Uploads the file at `path` under `file_name`.
    ///
    /// Progress is reported on `events`; a full or closed channel never
    /// blocks the upload. The merge is only requested once `check` reports
    /// no missing chunks.
    pub async fn upload_file(
        &self,
        path: &Path,
        file_name: &str,
        events: &mpsc::Sender<UploadEvent>,
    ) -> Result<UploadOutcome, ClientError> {
        validate_file_name(file_name)?;
        self.check_cancelled()?;

        let mut reader = ChunkReader::open(path, self.config.chunk_size).await?;
        let slicer = *reader.slicer();
        let total = slicer.chunk_count().max(1);

        // Hashing runs on its own task; progress is forwarded as it arrives.
        let hasher = spawn_file_hasher(path.to_path_buf(), slicer.chunk_size());
        let fingerprint = hasher
            .wait(|percent| emit(events, UploadEvent::Hashing { percent }))
            .await?;
        self.check_cancelled()?;

        let plan = UploadPlan {
            fingerprint,
            file_name: file_name.to_string(),
            slicer,
            total,
        };

        let status = self.transport.check(&plan.fingerprint).await?;
        if status == RemoteStatus::Complete {
            info!(fingerprint = %plan.fingerprint, "already stored, nothing to upload");
            return Ok(UploadOutcome::AlreadyStored {
                fingerprint: plan.fingerprint,
            });
        }

        let mut missing = status.missing(total);
        emit(
            events,
            UploadEvent::Checked {
                fingerprint: plan.fingerprint.clone(),
                missing: missing.len() as u32,
                total,
            },
        );
        info!(
            fingerprint = %plan.fingerprint,
            file = file_name,
            total,
            missing = missing.len(),
            "starting upload"
        );

        let mut chunks_sent = 0u32;
        let mut rounds = 0u32;
        while !missing.is_empty() {
            if rounds > self.config.max_retries {
                return Err(ClientError::Incomplete { rounds, missing });
            }
            if rounds > 0 {
                debug!(round = rounds, missing = missing.len(), "re-sending missing chunks");
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(ClientError::Cancelled),
                    _ = tokio::time::sleep(self.config.retry_delay) => {}
                }
            }

            chunks_sent += self.upload_round(&mut reader, &plan, &missing, events).await?;
            rounds += 1;

            // The server's view decides what is still outstanding.
            match self.transport.check(&plan.fingerprint).await? {
                RemoteStatus::Complete => {
                    info!(fingerprint = %plan.fingerprint, "merged concurrently by another uploader");
                    return Ok(UploadOutcome::AlreadyStored {
                        fingerprint: plan.fingerprint,
                    });
                }
                status => missing = status.missing(total),
            }
        }

        self.check_cancelled()?;
        let merged = self
            .transport
            .merge(&plan.fingerprint, &plan.file_name, total)
            .await
            .map_err(|e| ClientError::Merge(Box::new(e)))?;
        emit(events, UploadEvent::Merged { size: merged.size });
        info!(fingerprint = %plan.fingerprint, size = merged.size, chunks_sent, "upload complete");

        Ok(UploadOutcome::Uploaded {
            fingerprint: plan.fingerprint,
            chunks_sent,
            chunk_count: total,
            size: merged.size,
        })
    }

    /// Sends each index in `indices` once (with per-chunk retries).
    ///
    /// Returns how many chunks were acknowledged. Chunks that exhaust
    /// their retries on a transient fault are left for the next round; a
    /// non-retryable fault aborts the round.
    async fn upload_round(
        &self,
        reader: &mut ChunkReader,
        plan: &UploadPlan,
        indices: &[u32],
        events: &mpsc::Sender<UploadEvent>,
    ) -> Result<u32, ClientError> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut pending = indices.iter().copied();
        let mut acked = 0u32;

        loop {
            tokio::select! {
                Some(joined) = tasks.join_next() => {
                    acked += self.on_chunk_done(joined, plan, events)?;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    let Ok(permit) = permit else { break };
                    let Some(index) = pending.next() else { break };
                    self.check_cancelled()?;

                    let upload = ChunkUpload {
                        fingerprint: plan.fingerprint.clone(),
                        file_name: plan.file_name.clone(),
                        total: plan.total,
                        index,
                        data: read_chunk(reader, &plan.slicer, index).await?,
                    };
                    let transport = Arc::clone(&self.transport);
                    let config = self.config.clone();
                    let cancel = self.cancel.clone();
                    tasks.spawn(async move {
                        let result = send_with_retry(transport.as_ref(), &upload, &config, &cancel).await;
                        drop(permit);
                        (upload.index, result)
                    });
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            acked += self.on_chunk_done(joined, plan, events)?;
        }
        Ok(acked)
    }

    fn on_chunk_done(
        &self,
        joined: Result<(u32, Result<u32, ClientError>), JoinError>,
        plan: &UploadPlan,
        events: &mpsc::Sender<UploadEvent>,
    ) -> Result<u32, ClientError> {
        let (index, result) = joined?;
        match result {
            Ok(uploaded) => {
                debug!(fingerprint = %plan.fingerprint, index, uploaded, "chunk acknowledged");
                emit(
                    events,
                    UploadEvent::ChunkUploaded {
                        index,
                        uploaded,
                        total: plan.total,
                        progress: f64::from(uploaded.min(plan.total)) / f64::from(plan.total),
                    },
                );
                Ok(1)
            }
            Err(e) if e.is_retryable() => {
                warn!(fingerprint = %plan.fingerprint, index, error = %e, "chunk upload failed");
                emit(
                    events,
                    UploadEvent::ChunkFailed {
                        index,
                        error: e.to_string(),
                    },
                );
                Ok(0)
            }
            Err(ClientError::Cancelled) => Err(ClientError::Cancelled),
            Err(e) => Err(ClientError::Chunk {
                index,
                source: Box::new(e),
            }),
        }
    }

    fn check_cancelled(&self) -> Result<(), ClientError> {
        if self.cancel.is_cancelled() {
            Err(ClientError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Uploads one chunk, retrying transient faults up to `max_retries` times.
async fn send_with_retry<T: UploadTransport + ?Sized>(
    transport: &T,
    upload: &ChunkUpload,
    config: &UploaderConfig,
    cancel: &CancellationToken,
) -> Result<u32, ClientError> {
    let mut attempt = 0u32;
    loop {
        match transport.upload_chunk(upload).await {
            Ok(count) => return Ok(count),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                debug!(index = upload.index, attempt, error = %e, "retrying chunk");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                    _ = tokio::time::sleep(config.retry_delay) => {}
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Reads chunk `index`. An empty file uploads as one empty chunk 0.
async fn read_chunk(
    reader: &mut ChunkReader,
    slicer: &Slicer,
    index: u32,
) -> Result<Vec<u8>, ClientError> {
    if slicer.file_size() == 0 && index == 0 {
        return Ok(Vec::new());
    }
    match reader.read_index(index).await? {
        Some(chunk) => Ok(chunk.data),
        None => Err(ClientError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("chunk {index} is past the end of the file"),
        ))),
    }
}

/// Non-blocking progress report.
fn emit(events: &mpsc::Sender<UploadEvent>, event: UploadEvent) {
    let _ = events.try_send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::time::Duration;

    use bigfile_protocol::MergeResponse;
    use bigfile_protocol::constants::{RESULT_FAILED, RESULT_INVALID_INPUT};
    use tempfile::TempDir;

    /// In-memory server that records what the orchestrator sends.
    #[derive(Default)]
    struct MockServer {
        complete: Mutex<bool>,
        stored: Mutex<BTreeMap<u32, Vec<u8>>>,
        /// Index -> (remaining failures, result code).
        failures: Mutex<HashMap<u32, (u32, i32)>>,
        uploads: Mutex<Vec<u32>>,
        merges: Mutex<Vec<(String, u32)>>,
        in_flight: Mutex<(usize, usize)>,
        checks: Mutex<u32>,
        /// On the n-th check: forget every stored chunk and cancel the token.
        cancel_on_check: Mutex<Option<(u32, CancellationToken)>>,
    }

    impl MockServer {
        fn fail(&self, index: u32, times: u32, code: i32) {
            self.failures.lock().unwrap().insert(index, (times, code));
        }

        fn merged_bytes(&self) -> Vec<u8> {
            self.stored.lock().unwrap().values().flatten().copied().collect()
        }
    }

    impl UploadTransport for MockServer {
        fn check<'a>(
            &'a self,
            _fp: &'a Fingerprint,
        ) -> Pin<Box<dyn Future<Output = Result<RemoteStatus, ClientError>> + Send + 'a>> {
            let checks = {
                let mut checks = self.checks.lock().unwrap();
                *checks += 1;
                *checks
            };
            if let Some((n, cancel)) = self.cancel_on_check.lock().unwrap().as_ref() {
                if *n == checks {
                    self.stored.lock().unwrap().clear();
                    cancel.cancel();
                }
            }

            let status = if *self.complete.lock().unwrap() {
                RemoteStatus::Complete
            } else {
                let stored = self.stored.lock().unwrap();
                if stored.is_empty() {
                    RemoteStatus::Absent
                } else {
                    RemoteStatus::PartiallyStored(stored.keys().copied().collect())
                }
            };
            Box::pin(async move { Ok(status) })
        }

        fn upload_chunk<'a>(
            &'a self,
            chunk: &'a ChunkUpload,
        ) -> Pin<Box<dyn Future<Output = Result<u32, ClientError>> + Send + 'a>> {
            Box::pin(async move {
                self.uploads.lock().unwrap().push(chunk.index);
                {
                    let mut f = self.in_flight.lock().unwrap();
                    f.0 += 1;
                    f.1 = f.1.max(f.0);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                self.in_flight.lock().unwrap().0 -= 1;

                if let Some((remaining, code)) = self.failures.lock().unwrap().get_mut(&chunk.index) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(ClientError::Server {
                            code: *code,
                            message: "injected".into(),
                        });
                    }
                }

                let mut stored = self.stored.lock().unwrap();
                stored.insert(chunk.index, chunk.data.clone());
                Ok(stored.len() as u32)
            })
        }

        fn merge<'a>(
            &'a self,
            _fp: &'a Fingerprint,
            file_name: &'a str,
            total: u32,
        ) -> Pin<Box<dyn Future<Output = Result<MergeResponse, ClientError>> + Send + 'a>> {
            self.merges.lock().unwrap().push((file_name.to_string(), total));
            let size = self.merged_bytes().len() as u64;
            Box::pin(async move {
                Ok(MergeResponse {
                    size,
                    chunk_count: total,
                })
            })
        }
    }

    fn config(chunk_size: u64) -> UploaderConfig {
        UploaderConfig {
            chunk_size,
            concurrency: 3,
            max_retries: 2,
            retry_delay: Duration::ZERO,
        }
    }

    fn write_file(dir: &TempDir, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("source.bin");
        std::fs::write(&path, data).unwrap();
        path
    }

    async fn run(
        server: &Arc<MockServer>,
        config: UploaderConfig,
        path: &Path,
    ) -> (Result<UploadOutcome, ClientError>, Vec<UploadEvent>) {
        let orchestrator =
            UploadOrchestrator::new(Arc::clone(server), config, CancellationToken::new());
        let (tx, mut rx) = mpsc::channel(1024);
        let result = orchestrator.upload_file(path, "source.bin", &tx).await;
        drop(tx);
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        (result, events)
    }

    #[tokio::test]
    async fn uploads_every_chunk_then_merges() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"0123456789");
        let server = Arc::new(MockServer::default());

        let (result, events) = run(&server, config(4), &path).await;
        match result.unwrap() {
            UploadOutcome::Uploaded {
                chunks_sent,
                chunk_count,
                size,
                ..
            } => {
                assert_eq!(chunks_sent, 3);
                assert_eq!(chunk_count, 3);
                assert_eq!(size, 10);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        assert_eq!(server.merged_bytes(), b"0123456789");
        assert_eq!(*server.merges.lock().unwrap(), vec![("source.bin".to_string(), 3)]);
        assert!(events.contains(&UploadEvent::Hashing { percent: 100 }));
        assert!(events.contains(&UploadEvent::Merged { size: 10 }));
    }

    #[tokio::test]
    async fn sends_only_missing_chunks() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"ABCDE");
        let server = Arc::new(MockServer::default());
        server.stored.lock().unwrap().insert(0, b"AB".to_vec());
        server.stored.lock().unwrap().insert(1, b"CD".to_vec());

        let (result, _) = run(&server, config(2), &path).await;
        assert!(matches!(
            result.unwrap(),
            UploadOutcome::Uploaded { chunks_sent: 1, .. }
        ));
        assert_eq!(*server.uploads.lock().unwrap(), vec![2]);
        assert_eq!(server.merged_bytes(), b"ABCDE");
    }

    #[tokio::test]
    async fn complete_file_is_not_resent() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"ABCDE");
        let server = Arc::new(MockServer::default());
        *server.complete.lock().unwrap() = true;

        let (result, _) = run(&server, config(2), &path).await;
        let outcome = result.unwrap();
        assert!(matches!(outcome, UploadOutcome::AlreadyStored { .. }));
        assert_eq!(outcome.fingerprint().as_str(), "2ecdde3959051d913f61b14579ea136d");
        assert!(server.uploads.lock().unwrap().is_empty());
        assert!(server.merges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"ABCDE");
        let server = Arc::new(MockServer::default());
        server.fail(1, 2, RESULT_FAILED);

        let (result, _) = run(&server, config(2), &path).await;
        assert!(result.is_ok());
        let attempts = server.uploads.lock().unwrap().iter().filter(|&&i| i == 1).count();
        assert_eq!(attempts, 3);
        assert_eq!(server.merged_bytes(), b"ABCDE");
    }

    #[tokio::test]
    async fn missing_chunks_are_resent_next_round() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"ABCDE");
        let server = Arc::new(MockServer::default());
        // Exhausts the per-chunk retries of the first round only.
        server.fail(2, 3, RESULT_FAILED);

        let (result, events) = run(&server, config(2), &path).await;
        assert!(result.is_ok());
        assert!(events.contains(&UploadEvent::ChunkFailed {
            index: 2,
            error: "server error -1: injected".into(),
        }));
        assert_eq!(server.merges.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn gives_up_without_merging() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"ABCDE");
        let server = Arc::new(MockServer::default());
        server.fail(1, u32::MAX, RESULT_FAILED);

        let (result, _) = run(&server, config(2), &path).await;
        match result {
            Err(ClientError::Incomplete { missing, .. }) => assert_eq!(missing, vec![1]),
            other => panic!("expected Incomplete, got {other:?}"),
        }
        assert!(server.merges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn input_fault_aborts_immediately() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"ABCDE");
        let server = Arc::new(MockServer::default());
        server.fail(0, 1, RESULT_INVALID_INPUT);

        let (result, _) = run(&server, config(2), &path).await;
        assert!(matches!(result, Err(ClientError::Chunk { index: 0, .. })));
        assert!(server.merges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn parallelism_is_bounded() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, &[7u8; 40]);
        let server = Arc::new(MockServer::default());

        let (result, _) = run(&server, config(2), &path).await;
        assert!(result.is_ok());
        let max_in_flight = server.in_flight.lock().unwrap().1;
        assert!(max_in_flight <= 3, "max in flight {max_in_flight}");
        assert_eq!(server.stored.lock().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn empty_file_sends_one_empty_chunk() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"");
        let server = Arc::new(MockServer::default());

        let (result, _) = run(&server, config(4), &path).await;
        match result.unwrap() {
            UploadOutcome::Uploaded {
                fingerprint,
                chunk_count,
                size,
                ..
            } => {
                assert_eq!(fingerprint.as_str(), "d41d8cd98f00b204e9800998ecf8427e");
                assert_eq!(chunk_count, 1);
                assert_eq!(size, 0);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(*server.uploads.lock().unwrap(), vec![0]);
        assert_eq!(*server.merges.lock().unwrap(), vec![("source.bin".to_string(), 1)]);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"ABCDE");
        let server = Arc::new(MockServer::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let orchestrator = UploadOrchestrator::new(Arc::clone(&server), config(2), cancel);
        let (tx, _rx) = mpsc::channel(16);
        let result = orchestrator.upload_file(&path, "source.bin", &tx).await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
        assert!(server.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_bad_file_name() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"ABCDE");
        let server = Arc::new(MockServer::default());
        let orchestrator =
            UploadOrchestrator::new(Arc::clone(&server), config(2), CancellationToken::new());
        let (tx, _rx) = mpsc::channel(16);

        let result = orchestrator.upload_file(&path, "../escape", &tx).await;
        assert!(matches!(result, Err(ClientError::Transfer(_))));
    }

    #[tokio::test]
    async fn cancel_interrupts_retry_pause() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"ABCDE");
        let server = Arc::new(MockServer::default());
        for index in 0..3 {
            server.fail(index, u32::MAX, RESULT_FAILED);
        }
        let cancel = CancellationToken::new();
        let config = UploaderConfig {
            retry_delay: Duration::from_secs(30),
            ..config(2)
        };

        let orchestrator = UploadOrchestrator::new(Arc::clone(&server), config, cancel.clone());
        let (tx, _rx) = mpsc::channel(16);
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.upload_file(&path, "source.bin", &tx),
        )
        .await
        .expect("cancellation should end the retry pause");
        canceller.await.unwrap();

        assert!(matches!(result, Err(ClientError::Cancelled)), "got {result:?}");
        assert!(server.merges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_interrupts_round_pause() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"ABCDE");
        let server = Arc::new(MockServer::default());
        let cancel = CancellationToken::new();
        // The re-check after the first round finds nothing and cancels.
        *server.cancel_on_check.lock().unwrap() = Some((2, cancel.clone()));
        let config = UploaderConfig {
            retry_delay: Duration::from_secs(30),
            ..config(2)
        };

        let orchestrator = UploadOrchestrator::new(Arc::clone(&server), config, cancel);
        let (tx, _rx) = mpsc::channel(16);
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.upload_file(&path, "source.bin", &tx),
        )
        .await
        .expect("cancellation should end the round pause");

        assert!(matches!(result, Err(ClientError::Cancelled)), "got {result:?}");
        assert_eq!(server.uploads.lock().unwrap().len(), 3);
        assert!(server.merges.lock().unwrap().is_empty());
    }
}
