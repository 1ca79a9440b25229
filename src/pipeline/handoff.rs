//! Single-slot frame handoff between the producer and the worker thread

use std::time::{Duration, Instant};

use flume::{RecvTimeoutError, SendTimeoutError};
use tracing::{trace, warn};

use crate::capture::Frame;
use crate::error::{PipelineError, PipelineResult, TerminationReason};
use crate::sink::PoseResult;

/// A processed frame handed back to the producer
#[derive(Debug)]
pub struct Completed {
    /// The submitted frame, annotated in place
    pub frame: Frame,
    pub result: PoseResult,
}

struct Job {
    frame: Frame,
    reply: flume::Sender<Completed>,
}

/// Create a connected producer/consumer pair.
///
/// The slot is a rendezvous channel: a send only succeeds once the worker is
/// idle in [`HandoffReceiver::take`], and the worker only returns to `take`
/// after completing its current frame. At most one frame is ever in flight,
/// even with several producer threads.
pub fn frame_handoff(submit_timeout: Option<Duration>) -> (FrameHandoff, HandoffReceiver) {
    let (tx, rx) = flume::bounded(0);
    (
        FrameHandoff { tx, submit_timeout },
        HandoffReceiver { rx },
    )
}

/// Producer side
pub struct FrameHandoff {
    tx: flume::Sender<Job>,
    submit_timeout: Option<Duration>,
}

impl FrameHandoff {
    /// Publish `frame` and block until the worker has completed it.
    ///
    /// Fails with [`PipelineError::PipelineTerminated`] when the worker is
    /// gone, or when the frame is not completed within the submit timeout.
    /// The timeout covers the whole call, including time spent waiting for
    /// other producers' frames to clear the slot. The frame is lost on failure.
    pub fn submit(&self, frame: Frame) -> PipelineResult<Completed> {
        let sequence = frame.sequence();
        let (reply, done) = flume::bounded(1);
        let job = Job { frame, reply };

        let deadline = self.submit_timeout.map(|timeout| (Instant::now() + timeout, timeout));

        match deadline {
            None => self
                .tx
                .send(job)
                .map_err(|_| terminated(TerminationReason::WorkerGone))?,
            Some((at, timeout)) => self.tx.send_deadline(job, at).map_err(|e| match e {
                SendTimeoutError::Timeout(_) => terminated(TerminationReason::Stalled(timeout)),
                SendTimeoutError::Disconnected(_) => terminated(TerminationReason::WorkerGone),
            })?,
        }
        trace!(sequence, "Frame published");

        let completed = match deadline {
            None => done
                .recv()
                .map_err(|_| terminated(TerminationReason::WorkerGone))?,
            Some((at, timeout)) => done.recv_deadline(at).map_err(|e| match e {
                RecvTimeoutError::Timeout => terminated(TerminationReason::Stalled(timeout)),
                RecvTimeoutError::Disconnected => terminated(TerminationReason::WorkerGone),
            })?,
        };
        trace!(sequence, "Frame completed");

        Ok(completed)
    }

    /// Whether the worker side has gone away.
    pub fn is_disconnected(&self) -> bool {
        self.tx.is_disconnected()
    }
}

fn terminated(reason: TerminationReason) -> PipelineError {
    warn!("Frame handoff failed: {}", reason);
    PipelineError::PipelineTerminated(reason)
}

/// Consumer side; owned by the single worker.
pub struct HandoffReceiver {
    rx: flume::Receiver<Job>,
}

impl HandoffReceiver {
    /// Block until a frame is published. `None` once every producer is gone.
    pub fn take(&self) -> Option<(Frame, Completion)> {
        let Job { frame, reply } = self.rx.recv().ok()?;
        Some((frame, Completion { reply }))
    }
}

/// Completion token for the frame returned by [`HandoffReceiver::take`].
///
/// Consumed by [`Completion::complete`]; dropping it without completing
/// (e.g. while unwinding) tells the waiting producer the worker is gone.
pub struct Completion {
    reply: flume::Sender<Completed>,
}

impl Completion {
    /// Hand the frame and its result back and wake the producer.
    pub fn complete(self, frame: Frame, result: PoseResult) {
        let sequence = result.sequence;
        if self.reply.send(Completed { frame, result }).is_err() {
            // the producer timed out and stopped waiting
            warn!(sequence, "Producer no longer waiting for completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn frame(sequence: u64) -> Frame {
        Frame::from_rgba(vec![0; 4 * 4 * 4], 4, 4, sequence).unwrap()
    }

    fn result_for(frame: &Frame) -> PoseResult {
        PoseResult {
            sequence: frame.sequence(),
            keypoints: Vec::new(),
            fps: None,
            failure: None,
            frame_width: frame.width(),
            frame_height: frame.height(),
        }
    }

    #[test]
    fn test_submit_returns_completed_frame() {
        let (handoff, receiver) = frame_handoff(None);
        let worker = thread::spawn(move || {
            while let Some((frame, completion)) = receiver.take() {
                let result = result_for(&frame);
                completion.complete(frame, result);
            }
        });

        for seq in 1..=3 {
            let completed = handoff.submit(frame(seq)).unwrap();
            assert_eq!(completed.frame.sequence(), seq);
            assert_eq!(completed.result.sequence, seq);
        }

        drop(handoff);
        worker.join().unwrap();
    }

    #[test]
    fn test_submit_fails_when_receiver_dropped() {
        let (handoff, receiver) = frame_handoff(None);
        drop(receiver);
        assert!(handoff.is_disconnected());
        assert_eq!(
            handoff.submit(frame(1)).unwrap_err(),
            PipelineError::PipelineTerminated(TerminationReason::WorkerGone)
        );
    }

    #[test]
    fn test_dropped_completion_reports_worker_gone() {
        let (handoff, receiver) = frame_handoff(None);
        let worker = thread::spawn(move || {
            let (_frame, completion) = receiver.take().unwrap();
            drop(completion);
        });

        assert_eq!(
            handoff.submit(frame(1)).unwrap_err(),
            PipelineError::PipelineTerminated(TerminationReason::WorkerGone)
        );
        worker.join().unwrap();
    }

    #[test]
    fn test_timeout_when_nobody_takes() {
        let timeout = Duration::from_millis(30);
        let (handoff, _receiver) = frame_handoff(Some(timeout));
        assert_eq!(
            handoff.submit(frame(1)).unwrap_err(),
            PipelineError::PipelineTerminated(TerminationReason::Stalled(timeout))
        );
    }

    #[test]
    fn test_timeout_bounds_whole_submit() {
        let timeout = Duration::from_millis(80);
        let (handoff, receiver) = frame_handoff(Some(timeout));
        let worker = thread::spawn(move || {
            while let Some((frame, completion)) = receiver.take() {
                thread::sleep(Duration::from_millis(200));
                let result = result_for(&frame);
                completion.complete(frame, result);
            }
        });

        // first frame keeps the worker busy until ~200ms
        let start = Instant::now();
        assert!(handoff.submit(frame(1)).is_err());
        thread::sleep(Duration::from_millis(130).saturating_sub(start.elapsed()));

        // the slot frees up late in this call's budget; the wait for the
        // result must not get a fresh timeout
        let second = Instant::now();
        assert_eq!(
            handoff.submit(frame(2)).unwrap_err(),
            PipelineError::PipelineTerminated(TerminationReason::Stalled(timeout))
        );
        assert!(
            second.elapsed() < Duration::from_millis(120),
            "submit blocked for {:?}",
            second.elapsed()
        );

        drop(handoff);
        worker.join().unwrap();
    }

    #[test]
    fn test_take_returns_none_after_producer_dropped() {
        let (handoff, receiver) = frame_handoff(None);
        drop(handoff);
        assert!(receiver.take().is_none());
    }
}
