//! Forwarding worker task and handle

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::WorkerConfig;
use crate::error::{Error, Result};
use crate::media::{FrameKind, MediaFrame};
use crate::sink::{MediaSink, SinkConnector};
use crate::stats::WorkerCounters;

/// Sent when a worker terminates on its own because its push failed
#[derive(Debug, Clone)]
pub struct WorkerFailure {
    pub url: String,
    pub worker_id: u64,
    pub error: String,
}

/// Handle to a running forwarding worker
///
/// Dropping the handle cancels the worker without waiting for it; use
/// [`stop`](Self::stop) to flush and join.
#[derive(Debug)]
pub struct ForwardingWorker {
    id: u64,
    url: Arc<str>,
    tx: mpsc::Sender<MediaFrame>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    counters: Arc<WorkerCounters>,
    stop_timeout: Duration,
}

impl ForwardingWorker {
    /// Connect to `url` and spawn the worker task
    ///
    /// `priming` frames (decoder configuration) are queued ahead of live
    /// frames. Fails without spawning anything if the connection cannot be
    /// established within `connect_timeout`.
    pub async fn start<C: SinkConnector>(
        id: u64,
        url: &str,
        connector: &C,
        config: &WorkerConfig,
        priming: Vec<MediaFrame>,
        failures: mpsc::UnboundedSender<WorkerFailure>,
    ) -> Result<Self> {
        let sink = tokio::time::timeout(config.connect_timeout, connector.connect(url))
            .await
            .map_err(|_| Error::ConnectTimeout(config.connect_timeout))??;

        let (tx, rx) = mpsc::channel(config.frame_buffer.max(priming.len() + 1));
        for frame in priming {
            let _ = tx.try_send(frame);
        }

        let cancel = CancellationToken::new();
        let counters = Arc::new(WorkerCounters::new());

        let task = tokio::spawn(run(
            WorkerTask {
                id,
                url: url.to_string(),
                rx,
                cancel: cancel.clone(),
                counters: Arc::clone(&counters),
                failures,
            },
            sink,
        ));

        tracing::debug!(url = %url, worker_id = id, "Forwarding worker started");

        Ok(Self {
            id,
            url: Arc::from(url),
            tx,
            cancel,
            task: Some(task),
            counters,
            stop_timeout: config.stop_timeout,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Push side of the queue, held by fan-out snapshots
    pub(crate) fn sender(&self) -> FrameTap {
        FrameTap {
            url: Arc::clone(&self.url),
            tx: self.tx.clone(),
            counters: Arc::clone(&self.counters),
        }
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    #[cfg(test)]
    fn stats(&self) -> crate::stats::WorkerStats {
        self.counters.snapshot()
    }

    pub(crate) fn counters(&self) -> Arc<WorkerCounters> {
        Arc::clone(&self.counters)
    }

    /// Stop the worker: flush queued frames, close the sink, join the task
    ///
    /// Idempotent. If teardown does not finish within `stop_timeout` (for
    /// example a push is blocked on a stalled socket) the task is aborted,
    /// which drops the sink and its connection.
    pub async fn stop(&mut self) {
        self.cancel.cancel();

        let Some(mut task) = self.task.take() else {
            return;
        };

        match tokio::time::timeout(self.stop_timeout, &mut task).await {
            Ok(_) => {
                tracing::debug!(url = %self.url, worker_id = self.id, "Forwarding worker stopped");
            }
            Err(_) => {
                tracing::warn!(
                    url = %self.url,
                    worker_id = self.id,
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "Forwarding worker did not stop in time, aborting"
                );
                task.abort();
                let _ = task.await;
            }
        }
    }
}

impl Drop for ForwardingWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Cloneable push side of a worker, used on the fan-out path
#[derive(Debug, Clone)]
pub(crate) struct FrameTap {
    url: Arc<str>,
    tx: mpsc::Sender<MediaFrame>,
    counters: Arc<WorkerCounters>,
}

impl FrameTap {
    /// Queue a frame without waiting
    ///
    /// Returns `false` if the frame was dropped (queue full or worker gone).
    pub(crate) fn push(&self, frame: MediaFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let dropped = self.counters.record_dropped();
                if dropped.is_power_of_two() {
                    tracing::debug!(url = %self.url, dropped = dropped, "Destination falling behind, dropping frames");
                }
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

struct WorkerTask {
    id: u64,
    url: String,
    rx: mpsc::Receiver<MediaFrame>,
    cancel: CancellationToken,
    counters: Arc<WorkerCounters>,
    failures: mpsc::UnboundedSender<WorkerFailure>,
}

async fn run<S: MediaSink>(mut task: WorkerTask, mut sink: S) {
    let mut clock = TimestampRebase::default();

    let result = match forward(&mut task, &mut sink, &mut clock).await {
        Ok(()) => drain(&mut task, &mut sink, &mut clock).await,
        Err(e) => Err(e),
    };
    let result = result.and(sink.close().await);

    match result {
        Ok(()) => {}
        Err(e) if task.cancel.is_cancelled() => {
            tracing::debug!(url = %task.url, error = %e, "Error while stopping forwarding worker");
        }
        Err(e) => {
            tracing::warn!(url = %task.url, worker_id = task.id, error = %e, "Forwarding worker failed");
            let _ = task.failures.send(WorkerFailure {
                url: task.url.clone(),
                worker_id: task.id,
                error: e.to_string(),
            });
        }
    }
}

async fn forward<S: MediaSink>(
    task: &mut WorkerTask,
    sink: &mut S,
    clock: &mut TimestampRebase,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = task.cancel.cancelled() => return Ok(()),
            frame = task.rx.recv() => match frame {
                Some(frame) => write(task, sink, clock, &frame).await?,
                None => return Ok(()),
            },
        }
    }
}

/// Flush whatever was queued before the stop request
async fn drain<S: MediaSink>(
    task: &mut WorkerTask,
    sink: &mut S,
    clock: &mut TimestampRebase,
) -> Result<()> {
    task.rx.close();
    while let Ok(frame) = task.rx.try_recv() {
        write(task, sink, clock, &frame).await?;
    }
    Ok(())
}

async fn write<S: MediaSink>(
    task: &WorkerTask,
    sink: &mut S,
    clock: &mut TimestampRebase,
    frame: &MediaFrame,
) -> Result<()> {
    let timestamp = clock.rebase(frame);
    sink.write_frame(frame, timestamp).await?;
    task.counters.record_sent(frame.size());
    Ok(())
}

/// Shifts timestamps so each destination starts at zero
#[derive(Debug, Default)]
struct TimestampRebase {
    base: Option<u32>,
}

impl TimestampRebase {
    fn rebase(&mut self, frame: &MediaFrame) -> u32 {
        let is_config = frame.is_header || frame.kind == FrameKind::Metadata;
        match self.base {
            Some(base) => frame.timestamp.saturating_sub(base),
            None if is_config => 0,
            None => {
                self.base = Some(frame.timestamp);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::test_util::{video, MockConnector};

    fn config() -> WorkerConfig {
        WorkerConfig {
            frame_buffer: 16,
            connect_timeout: Duration::from_millis(200),
            stop_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_frames_delivered_in_order() {
        let connector = MockConnector::new();
        let (failures, _rx) = mpsc::unbounded_channel();
        let mut worker = ForwardingWorker::start(1, "mock://a", &connector, &config(), Vec::new(), failures)
            .await
            .unwrap();

        for ts in [1000, 1040, 1080] {
            assert!(worker.sender().push(video(ts)));
        }
        worker.stop().await;

        let recorded = connector.timestamps("mock://a");
        assert_eq!(recorded, vec![0, 40, 80]);
        assert!(connector.is_closed("mock://a"));
        assert_eq!(worker.stats().frames_sent, 3);
        assert!(worker.is_finished());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let connector = MockConnector::new();
        let (failures, _rx) = mpsc::unbounded_channel();
        let mut worker = ForwardingWorker::start(1, "mock://a", &connector, &config(), Vec::new(), failures)
            .await
            .unwrap();

        worker.stop().await;
        worker.stop().await;
        assert!(!worker.sender().push(video(0)));
        assert_eq!(connector.close_count("mock://a"), 1);
    }

    #[tokio::test]
    async fn test_priming_frames_come_first() {
        let connector = MockConnector::new();
        let (failures, _rx) = mpsc::unbounded_channel();
        let header = MediaFrame::video(0, Bytes::from_static(&[0x17, 0x00]), true, true);
        let mut worker = ForwardingWorker::start(1, "mock://a", &connector, &config(), vec![header], failures)
            .await
            .unwrap();

        worker.sender().push(video(5000));
        worker.stop().await;

        let frames = connector.frames("mock://a");
        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_header);
        assert_eq!(frames[1].timestamp, 0);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let connector = MockConnector::new();
        connector.fail_connect("mock://bad");
        let (failures, _rx) = mpsc::unbounded_channel();

        let result = ForwardingWorker::start(1, "mock://bad", &connector, &config(), Vec::new(), failures).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let connector = MockConnector::new();
        connector.hang_connect("mock://slow");
        let (failures, _rx) = mpsc::unbounded_channel();

        let result = ForwardingWorker::start(1, "mock://slow", &connector, &config(), Vec::new(), failures).await;
        assert!(matches!(result, Err(Error::ConnectTimeout(_))));
    }

    #[tokio::test]
    async fn test_push_failure_is_reported() {
        let connector = MockConnector::new();
        connector.fail_after("mock://flaky", 2);
        let (failures, mut failure_rx) = mpsc::unbounded_channel();
        let mut worker = ForwardingWorker::start(7, "mock://flaky", &connector, &config(), Vec::new(), failures)
            .await
            .unwrap();

        for ts in 0..5 {
            worker.sender().push(video(ts * 40));
        }

        let failure = tokio::time::timeout(Duration::from_secs(1), failure_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failure.url, "mock://flaky");
        assert_eq!(failure.worker_id, 7);
        assert!(!failure.error.is_empty());

        // Stopping a failed worker is fine
        worker.stop().await;
        assert_eq!(connector.timestamps("mock://flaky").len(), 2);
    }

    #[tokio::test]
    async fn test_stalled_sink_is_aborted() {
        let connector = MockConnector::new();
        connector.stall("mock://stuck");
        let (failures, _rx) = mpsc::unbounded_channel();
        let mut worker = ForwardingWorker::start(1, "mock://stuck", &connector, &config(), Vec::new(), failures)
            .await
            .unwrap();

        worker.sender().push(video(0));
        tokio::task::yield_now().await;

        let started = std::time::Instant::now();
        worker.stop().await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(worker.is_finished());
        assert!(connector.is_dropped("mock://stuck"));
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let connector = MockConnector::new();
        connector.stall("mock://stuck");
        let (failures, _rx) = mpsc::unbounded_channel();
        let mut worker = ForwardingWorker::start(1, "mock://stuck", &connector, &config(), Vec::new(), failures)
            .await
            .unwrap();

        // One frame is taken by the stalled write, 16 fill the queue
        worker.sender().push(video(0));
        tokio::time::sleep(Duration::from_millis(20)).await;
        for ts in 1..=20 {
            worker.sender().push(video(ts));
        }
        assert_eq!(worker.stats().frames_dropped, 4);
        worker.stop().await;
    }

    #[test]
    fn test_timestamp_rebase() {
        let mut clock = TimestampRebase::default();
        let header = MediaFrame::video(0, Bytes::new(), true, true);

        assert_eq!(clock.rebase(&header), 0);
        assert_eq!(clock.rebase(&video(9000)), 0);
        assert_eq!(clock.rebase(&video(9040)), 40);
        // Audio slightly behind the first video frame clamps to zero
        assert_eq!(clock.rebase(&MediaFrame::audio(8990, Bytes::new(), false)), 0);
    }
}
