//! Execution coordinator: the single owner of the active-run set.
//!
//! Admission requests, completion reports and the shutdown request all go
//! through one unbounded channel and are handled in order by [`Coordinator::run`],
//! so a check-and-insert for a job name is atomic for every caller.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Why a run was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// An earlier run of the same job has not completed yet.
    AlreadyRunning,
    /// Shutdown has begun (or finished); no new runs are accepted.
    ShuttingDown,
}

/// Answer to an admission request.
#[derive(Debug)]
pub enum Admission {
    Granted(RunSlot),
    Denied(DenyReason),
}

/// Proof of admission. Dropping it reports completion, so the active record
/// is released on every exit path including unwinding.
#[derive(Debug)]
pub struct RunSlot {
    name: String,
    run_id: Uuid,
    tx: mpsc::UnboundedSender<Command>,
}

impl RunSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        // Err only once the coordinator has exited, i.e. nothing left to release.
        let _ = self.tx.send(Command::Complete {
            name: std::mem::take(&mut self.name),
            run_id: self.run_id,
        });
    }
}

#[derive(Debug)]
pub(crate) enum Command {
    Admit {
        name: String,
        cancel: CancellationToken,
        reply: oneshot::Sender<Admission>,
    },
    Complete {
        name: String,
        run_id: Uuid,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
    Active {
        reply: oneshot::Sender<Vec<String>>,
    },
}

#[derive(Debug)]
struct ActiveRun {
    run_id: Uuid,
    cancel: CancellationToken,
}

/// Cheap, cloneable sender side of the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl CoordinatorHandle {
    /// Ask to start `name`. `cancel` is triggered if shutdown begins while
    /// the run is active.
    pub async fn request_admission(&self, name: &str, cancel: CancellationToken) -> Admission {
        let (reply, rx) = oneshot::channel();
        let sent = self.tx.send(Command::Admit {
            name: name.to_string(),
            cancel,
            reply,
        });
        if sent.is_err() {
            return Admission::Denied(DenyReason::ShuttingDown);
        }
        rx.await
            .unwrap_or(Admission::Denied(DenyReason::ShuttingDown))
    }

    /// Begin shutdown and wait until every active run has completed.
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { done }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Names of the currently active runs, sorted.
    pub async fn active(&self) -> Vec<String> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Active { reply }).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

/// The serialized state owner. Spawn [`Coordinator::run`] once per scheduler
/// instance.
pub struct Coordinator {
    rx: mpsc::UnboundedReceiver<Command>,
    tx: mpsc::UnboundedSender<Command>,
    runs: HashMap<String, ActiveRun>,
    stopping: bool,
    waiters: Vec<oneshot::Sender<()>>,
    triggers: CancellationToken,
}

impl Coordinator {
    /// `triggers` is cancelled when shutdown begins, silencing the schedule
    /// triggers before any active run is cancelled.
    pub fn new(triggers: CancellationToken) -> (Self, CoordinatorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            rx,
            tx: tx.clone(),
            runs: HashMap::new(),
            stopping: false,
            waiters: Vec::new(),
            triggers,
        };
        (coordinator, CoordinatorHandle { tx })
    }

    /// Process commands until shutdown has drained, then exit.
    pub async fn run(mut self) {
        debug!("coordinator started");
        while let Some(command) = self.rx.recv().await {
            self.handle(command);
            if self.stopping && self.runs.is_empty() {
                break;
            }
        }
        // Anyone still waiting on a reply gets a closed channel.
        self.rx.close();
        debug!("coordinator exited");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Admit {
                name,
                cancel,
                reply,
            } => self.admit(name, cancel, reply),
            Command::Complete { name, run_id } => self.complete(&name, run_id),
            Command::Shutdown { done } => self.begin_shutdown(done),
            Command::Active { reply } => {
                let mut names: Vec<String> = self.runs.keys().cloned().collect();
                names.sort();
                let _ = reply.send(names);
            }
        }
    }

    fn admit(&mut self, name: String, cancel: CancellationToken, reply: oneshot::Sender<Admission>) {
        if self.stopping {
            let _ = reply.send(Admission::Denied(DenyReason::ShuttingDown));
            return;
        }
        if self.runs.contains_key(&name) {
            let _ = reply.send(Admission::Denied(DenyReason::AlreadyRunning));
            return;
        }

        let run_id = Uuid::now_v7();
        self.runs.insert(name.clone(), ActiveRun { run_id, cancel });
        debug!(job = %name, %run_id, active = self.runs.len(), "run admitted");

        // A refused reply hands the slot back and its drop queues the Complete.
        let _ = reply.send(Admission::Granted(RunSlot {
            name,
            run_id,
            tx: self.tx.clone(),
        }));
    }

    fn complete(&mut self, name: &str, run_id: Uuid) {
        match self.runs.get(name) {
            Some(run) if run.run_id == run_id => {
                self.runs.remove(name);
                debug!(job = %name, %run_id, active = self.runs.len(), "run completed");
            }
            _ => warn!(job = %name, %run_id, "completion for unknown run"),
        }

        if self.stopping && self.runs.is_empty() {
            self.notify_drained();
        }
    }

    fn begin_shutdown(&mut self, done: oneshot::Sender<()>) {
        self.waiters.push(done);
        if !self.stopping {
            self.stopping = true;
            self.triggers.cancel();
            info!(active = self.runs.len(), "shutdown requested, cancelling active runs");
            for (name, run) in &self.runs {
                debug!(job = %name, run_id = %run.run_id, "cancelling");
                run.cancel.cancel();
            }
        }
        if self.runs.is_empty() {
            self.notify_drained();
        }
    }

    fn notify_drained(&mut self) {
        info!("all runs drained");
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}
