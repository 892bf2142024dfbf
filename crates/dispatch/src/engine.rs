//! Application context: owns the registry, the queue, the session and the
//! two background tasks, and defines their lifecycle.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    rand::{SeedableRng, rngs::StdRng},
    relay_channels::{ChannelConnector, ChannelSlot},
    relay_config::RelayConfig,
    relay_metrics::{counter, dispatch as dispatch_metrics, gauge, labels},
    serde::Serialize,
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::{
    error::{DispatchError, Result},
    pacing::PacingPolicy,
    queue::DispatchQueue,
    registry::{StatusCounts, TaskRegistry},
    session::{PollPolicy, Session, SessionController, SessionHandle, SessionState},
    types::{Task, TaskId},
    worker::Worker,
};

const ABANDONED_REASON: &str = "dispatcher shut down before send";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub pacing: PacingPolicy,
    pub poll: PollPolicy,
    /// Upper bound on a single adapter call.
    pub send_timeout: Duration,
    /// Fixed seed for the pacing RNG; entropy when `None`.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pacing: PacingPolicy::default(),
            poll: PollPolicy::default(),
            send_timeout: Duration::from_secs(300),
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Ok(Self {
            pacing: PacingPolicy::new(config.dispatch.pacing_min(), config.dispatch.pacing_max())?,
            poll: PollPolicy {
                interval: config.session.poll_interval(),
                max_attempts: config.session.max_attempts,
            },
            send_timeout: config.dispatch.send_timeout(),
            rng_seed: None,
        })
    }
}

/// Returned to the caller when a task is accepted.
#[derive(Debug, Clone, Serialize)]
pub struct Admission {
    pub task_id: TaskId,
    /// Advisory: depth at admission, this task included.
    pub queue_position: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    /// Tasks waiting to be served.
    pub queue_size: usize,
    pub total_tasks: usize,
    pub counts: StatusCounts,
    /// Every task ever admitted, in admission order.
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Serve everything already queued, then stop.
    Drain,
    /// Stop after the send in progress; queued tasks end in `error`.
    Abandon,
}

struct Background {
    controller: JoinHandle<SessionState>,
    worker: JoinHandle<()>,
}

pub struct DispatchEngine {
    registry: Arc<TaskRegistry>,
    queue: Arc<DispatchQueue>,
    slot: ChannelSlot,
    session: SessionHandle,
    session_cancel: CancellationToken,
    worker_cancel: CancellationToken,
    background: Mutex<Option<Background>>,
}

impl DispatchEngine {
    /// Spawn the session controller and the worker. Must be called inside a
    /// tokio runtime.
    pub fn start(config: EngineConfig, connector: Arc<dyn ChannelConnector>) -> Self {
        let registry = Arc::new(TaskRegistry::new());
        let queue = Arc::new(DispatchQueue::new());
        let slot = ChannelSlot::new();
        let session_cancel = CancellationToken::new();
        let worker_cancel = CancellationToken::new();

        let controller = SessionController::new(connector, slot.clone(), config.poll);
        let session = controller.handle();

        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let worker = Worker::new(
            queue.clone(),
            registry.clone(),
            session.clone(),
            slot.clone(),
            config.pacing,
            config.send_timeout,
            rng,
        );

        info!(
            pacing_min_secs = config.pacing.min().as_secs(),
            pacing_max_secs = config.pacing.max().as_secs(),
            send_timeout_secs = config.send_timeout.as_secs(),
            "starting dispatch engine"
        );
        let background = Background {
            controller: tokio::spawn(controller.run(session_cancel.clone())),
            worker: tokio::spawn(worker.run(worker_cancel.clone())),
        };

        Self {
            registry,
            queue,
            slot,
            session,
            session_cancel,
            worker_cancel,
            background: Mutex::new(Some(background)),
        }
    }

    pub fn submit_text(&self, to: &str, text: &str) -> Result<Admission> {
        self.submit(Task::text(to, text))
    }

    pub fn submit_image(
        &self,
        to: &str,
        image_url: &str,
        caption: Option<&str>,
    ) -> Result<Admission> {
        self.submit(Task::image(to, image_url, caption.map(String::from)))
    }

    /// Readiness check, then register and enqueue as one step.
    fn submit(&self, task: Task) -> Result<Admission> {
        let state = self.session.state();
        if state != SessionState::Ready {
            counter!(dispatch_metrics::ADMISSIONS_REJECTED_TOTAL, labels::REASON => "not_ready")
                .increment(1);
            return Err(DispatchError::NotReady { state });
        }

        let task_id = task.id.clone();
        let kind = task.kind;
        let to = task.to.clone();
        let registry = &self.registry;
        let queue_position = self.queue.enqueue_with(|position| {
            let mut task = task;
            task.position = position;
            let id = task.id.clone();
            registry.register(task)?;
            Ok(id)
        })?;

        counter!(dispatch_metrics::TASKS_ENQUEUED_TOTAL, labels::KIND => kind.as_str()).increment(1);
        gauge!(dispatch_metrics::QUEUE_DEPTH).set(self.queue.len() as f64);
        info!(task_id = %task_id, kind = kind.as_str(), to = %to, queue_position, "task queued");

        Ok(Admission {
            task_id,
            queue_position,
        })
    }

    pub fn task(&self, id: &str) -> Result<Task> {
        self.registry
            .get(id)
            .ok_or_else(|| DispatchError::task_not_found(id))
    }

    pub fn queue_status(&self) -> QueueStatus {
        QueueStatus {
            queue_size: self.queue.len(),
            total_tasks: self.registry.len(),
            counts: self.registry.count_by_status(),
            tasks: self.registry.snapshot(),
        }
    }

    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    pub fn total_tasks(&self) -> usize {
        self.registry.len()
    }

    pub fn session(&self) -> Session {
        self.session.snapshot()
    }

    pub fn session_handle(&self) -> SessionHandle {
        self.session.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// Whether the adapter has been constructed.
    pub fn has_channel(&self) -> bool {
        self.slot.is_installed()
    }

    /// Screenshot of the channel, e.g. to show the login QR code.
    ///
    /// Waits for any send in progress to finish first.
    pub async fn capture_screen(&self) -> Result<Vec<u8>> {
        let channel = self.slot.get().ok_or(DispatchError::ChannelUnavailable)?;
        let mut adapter = channel.lock().await;
        Ok(adapter.capture_screen().await?)
    }

    /// Stop admissions, stop the background tasks and wait for them.
    ///
    /// Safe to call more than once; later calls return immediately.
    pub async fn shutdown(&self, mode: ShutdownMode) {
        let background = self
            .background
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(background) = background else {
            return;
        };
        info!(?mode, queued = self.queue.len(), "shutting down dispatch engine");

        self.queue.close();
        self.session_cancel.cancel();
        if mode == ShutdownMode::Abandon {
            self.worker_cancel.cancel();
        }

        if let Err(e) = background.worker.await {
            warn!(error = %e, "dispatch worker ended abnormally");
        }
        for id in self.queue.drain_pending() {
            let abandoned = self.registry.update(id.as_str(), |t| {
                t.mark_processing()?;
                t.mark_error(ABANDONED_REASON)
            });
            if let Err(e) = abandoned {
                warn!(task_id = %id, error = %e, "could not abandon task");
            }
        }
        if let Err(e) = background.controller.await {
            warn!(error = %e, "session controller ended abnormally");
        }

        if let Some(channel) = self.slot.get()
            && let Err(e) = channel.lock().await.close().await
        {
            warn!(error = %e, "failed to close channel");
        }
        info!("dispatch engine stopped");
    }
}
