use std::{sync::Arc, time::Duration};

use {
    rand::rngs::StdRng,
    relay_channels::{ChannelAdapter, ChannelError, ChannelSlot, SendResult},
    relay_metrics::{counter, dispatch as dispatch_metrics, gauge, histogram, labels},
    tokio::time::Instant,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    pacing::PacingPolicy,
    queue::{DispatchQueue, QueueItem},
    registry::TaskRegistry,
    session::SessionHandle,
    types::{Task, TaskPayload, TaskStatus},
};

pub(crate) const NOT_READY_REASON: &str = "channel not ready";

/// The single consumer of the dispatch queue and the only caller of the
/// channel's send operations.
pub struct Worker {
    queue: Arc<DispatchQueue>,
    registry: Arc<TaskRegistry>,
    session: SessionHandle,
    slot: ChannelSlot,
    pacing: PacingPolicy,
    send_timeout: Duration,
    rng: StdRng,
}

impl Worker {
    pub fn new(
        queue: Arc<DispatchQueue>,
        registry: Arc<TaskRegistry>,
        session: SessionHandle,
        slot: ChannelSlot,
        pacing: PacingPolicy,
        send_timeout: Duration,
        rng: StdRng,
    ) -> Self {
        Self {
            queue,
            registry,
            session,
            slot,
            pacing,
            send_timeout,
            rng,
        }
    }

    /// Serve tasks until the shutdown sentinel is dequeued or `cancel` fires.
    ///
    /// Cancellation never interrupts a send in progress; it is observed while
    /// waiting for work and during the pacing sleep.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("dispatch worker started");
        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                item = self.queue.next() => item,
            };
            let id = match item {
                QueueItem::Task(id) => id,
                QueueItem::Shutdown => {
                    debug!("shutdown sentinel dequeued");
                    break;
                },
            };
            gauge!(dispatch_metrics::QUEUE_DEPTH).set(self.queue.len() as f64);

            let paced = self.process(id.as_str()).await;

            if !paced {
                continue;
            }
            let delay = self
                .pacing
                .delay_after(self.queue.is_empty(), &mut self.rng);
            if delay.is_zero() {
                continue;
            }
            histogram!(dispatch_metrics::PACING_DELAY_SECONDS).record(delay.as_secs_f64());
            debug!(delay_ms = delay.as_millis() as u64, "pacing before next send");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {},
            }
        }
        info!("dispatch worker stopped");
    }

    /// Run one task to a terminal status. Returns whether the channel was
    /// used, i.e. whether pacing applies before the next task.
    async fn process(&self, id: &str) -> bool {
        let task = match self.registry.update(id, Task::mark_processing) {
            Ok(task) => task,
            Err(e) => {
                warn!(task_id = id, error = %e, "skipping task");
                return false;
            },
        };

        let channel = match self.slot.get() {
            Some(channel) if self.session.is_ready() => channel,
            _ => {
                debug!(task_id = id, state = %self.session.state(), "session not ready");
                self.fail(id, NOT_READY_REASON, "not_ready");
                return false;
            },
        };

        debug!(task_id = id, kind = task.kind.as_str(), to = %task.to, "sending");
        let started = Instant::now();
        let outcome = {
            let mut adapter = channel.lock().await;
            let operation = match task.payload {
                TaskPayload::Text { .. } => "send_text",
                TaskPayload::Image { .. } => "send_image",
            };
            match tokio::time::timeout(self.send_timeout, deliver(&mut **adapter, &task)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(ChannelError::timeout(operation)),
            }
        };
        histogram!(dispatch_metrics::SEND_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        self.finish(id, outcome);
        true
    }

    fn finish(&self, id: &str, outcome: SendResult) {
        match outcome {
            Ok(receipt) => match self.registry.update(id, |t| t.mark_sent(&receipt)) {
                Ok(task) => {
                    counter!(
                        dispatch_metrics::TASKS_COMPLETED_TOTAL,
                        labels::STATUS => TaskStatus::Sent.as_str()
                    )
                    .increment(1);
                    info!(task_id = id, to = %task.to, "task sent");
                },
                Err(e) => warn!(task_id = id, error = %e, "could not record task outcome"),
            },
            Err(e) => self.fail(id, &e.to_string(), e.kind()),
        }
    }

    fn fail(&self, id: &str, reason: &str, error_type: &'static str) {
        match self.registry.update(id, |t| t.mark_error(reason)) {
            Ok(task) => {
                counter!(
                    dispatch_metrics::TASKS_COMPLETED_TOTAL,
                    labels::STATUS => TaskStatus::Error.as_str(),
                    labels::ERROR_TYPE => error_type
                )
                .increment(1);
                warn!(task_id = id, to = %task.to, error = reason, "task failed");
            },
            Err(e) => warn!(task_id = id, error = %e, "could not record task outcome"),
        }
    }
}

async fn deliver(adapter: &mut dyn ChannelAdapter, task: &Task) -> SendResult {
    match &task.payload {
        TaskPayload::Text { text } => adapter.send_text(&task.to, text).await,
        TaskPayload::Image { image_url, caption } => {
            adapter
                .send_image(&task.to, image_url, caption.as_deref())
                .await
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::session::{PollPolicy, SessionController, SessionState},
        rand::SeedableRng,
        relay_channels::{MemoryChannel, MemoryConnector},
    };

    fn admit(queue: &DispatchQueue, registry: &TaskRegistry, task: Task) -> String {
        let id = task.id.to_string();
        queue
            .enqueue_with(|position| {
                let mut task = task;
                task.position = position;
                let id = task.id.clone();
                registry.register(task)?;
                Ok(id)
            })
            .unwrap();
        id
    }

    #[tokio::test(start_paused = true)]
    async fn tasks_dequeued_before_login_fail_without_pacing() {
        let channel = MemoryChannel::new().never_authenticate();
        let probe = channel.probe();
        let slot = ChannelSlot::new();
        let controller = SessionController::new(
            Arc::new(MemoryConnector::new(channel)),
            slot.clone(),
            PollPolicy::default(),
        );
        controller.bootstrap().await.unwrap();
        let session = controller.handle();
        assert_eq!(session.state(), SessionState::AwaitingAuthentication);

        let queue = Arc::new(DispatchQueue::new());
        let registry = Arc::new(TaskRegistry::new());
        let first = admit(&queue, &registry, Task::text("5511999999999", "one"));
        let second = admit(
            &queue,
            &registry,
            Task::image("5511999999999", "https://example.com/a.png", None),
        );
        queue.close();

        let worker = Worker::new(
            queue.clone(),
            registry.clone(),
            session,
            slot,
            PacingPolicy::default(),
            Duration::from_secs(300),
            StdRng::seed_from_u64(11),
        );
        let started = Instant::now();
        worker.run(CancellationToken::new()).await;
        assert_eq!(started.elapsed(), Duration::ZERO);

        for id in [&first, &second] {
            let task = registry.get(id).unwrap();
            assert_eq!(task.status, TaskStatus::Error);
            assert_eq!(task.error.as_deref(), Some(NOT_READY_REASON));
            assert!(task.started_at.is_some());
            assert!(task.completed_at.is_some());
        }
        assert!(probe.sent_to().is_empty());
        assert!(queue.is_empty());
    }
}
