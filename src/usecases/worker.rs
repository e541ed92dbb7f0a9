use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::Result;

use crate::{
    domain::open_chat_state::HistoryRequest,
    usecases::{
        chat_session::PendingSend,
        contracts::{Dispatcher, SessionEvent, SessionEventSource},
        load_messages::{load_messages, MessagesSource},
        send_message::{send_message, MessageSender},
    },
};

const WORKER_SHUTDOWN_FAILED: &str = "SESSION_WORKER_SHUTDOWN_FAILED";
const WORKER_QUEUE_CLOSED: &str = "SESSION_WORKER_QUEUE_CLOSED";

enum Job {
    History(HistoryRequest),
    Send(PendingSend),
    Stop,
}

/// Executes history fetches and sends on a background thread, one at a time,
/// and posts the outcomes back to the driver's event queue.
#[derive(Debug)]
pub struct WorkerDispatcher {
    jobs: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl WorkerDispatcher {
    pub fn start(
        messages: Box<dyn MessagesSource + Send>,
        sender: Box<dyn MessageSender + Send>,
        events: Sender<SessionEvent>,
    ) -> Result<Self, std::io::Error> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name("chatsync-session-worker".to_owned())
            .spawn(move || run_worker(messages, sender, jobs_rx, events))?;

        Ok(Self {
            jobs: Some(jobs_tx),
            worker: Some(worker),
        })
    }

    fn submit(&self, job: Job) {
        let delivered = self
            .jobs
            .as_ref()
            .is_some_and(|jobs| jobs.send(job).is_ok());
        if !delivered {
            tracing::warn!(code = WORKER_QUEUE_CLOSED, "session worker is gone, job dropped");
        }
    }
}

impl Dispatcher for WorkerDispatcher {
    fn dispatch_history(&mut self, request: HistoryRequest) {
        self.submit(Job::History(request));
    }

    fn dispatch_send(&mut self, pending: PendingSend) {
        self.submit(Job::Send(pending));
    }
}

impl Drop for WorkerDispatcher {
    fn drop(&mut self) {
        if let Some(jobs) = self.jobs.take() {
            let _ = jobs.send(Job::Stop);
        }

        if let Some(worker) = self.worker.take() {
            if let Err(error) = worker.join() {
                tracing::warn!(
                    code = WORKER_SHUTDOWN_FAILED,
                    error = ?error,
                    "session worker panicked on shutdown"
                );
            }
        }
    }
}

fn run_worker(
    messages: Box<dyn MessagesSource + Send>,
    sender: Box<dyn MessageSender + Send>,
    jobs: Receiver<Job>,
    events: Sender<SessionEvent>,
) {
    while let Ok(job) = jobs.recv() {
        let event = match job {
            Job::History(request) => {
                let result = load_messages(messages.as_ref(), &request);
                SessionEvent::HistoryLoaded { request, result }
            }
            Job::Send(pending) => {
                let result = send_message(sender.as_ref(), pending.command.clone());
                SessionEvent::SendCompleted { pending, result }
            }
            Job::Stop => break,
        };

        if events.send(event).is_err() {
            break;
        }
    }
}

/// Reads driver events from a queue, yielding [`SessionEvent::Tick`] when the
/// queue stays quiet for `tick`.
#[derive(Debug)]
pub struct QueuedEventSource {
    rx: Receiver<SessionEvent>,
    tick: Duration,
}

impl QueuedEventSource {
    pub fn new(rx: Receiver<SessionEvent>, tick: Duration) -> Self {
        Self { rx, tick }
    }
}

impl SessionEventSource for QueuedEventSource {
    fn next_event(&mut self) -> Result<Option<SessionEvent>> {
        match self.rx.recv_timeout(self.tick) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(Some(SessionEvent::Tick)),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}
