//! Store runtime - a single event loop that owns the dispatcher.
//!
//! User commands and network completions travel through the same queue, so
//! store mutations are applied strictly one after another. Requests run on
//! their own tasks and post their outcome back to the queue when done; the
//! loop keeps taking commands in the meantime.
//!
//! Completions are applied in arrival order. Two in-flight requests for the
//! same record can therefore finish out of order, in which case the later
//! arrival wins.

use std::sync::{Arc, RwLock};

use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::oneshot;

use crate::collection::EntityCollection;
use crate::dispatcher::{Command, Dispatcher, Submission};
use crate::error::{StoreError, SyncError};
use crate::record::Record;
use crate::summary::Summary;
use crate::sync::{SyncAdapter, SyncRequest, SyncResponse};

/// Counters reported when the runtime shuts down.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuntimeStats {
    pub commands: usize,
    pub dispatched: usize,
    pub dropped: usize,
    pub completed: usize,
    pub failed: usize,
}

type Inspect<R> = Box<dyn FnOnce(&Dispatcher<R>) + Send>;

enum Message<R: Record> {
    Command(Command<R>),
    Completed {
        request: SyncRequest<R>,
        outcome: Result<SyncResponse<R>, SyncError>,
    },
    Inspect(Inspect<R>),
    Settle(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<RuntimeStats>),
}

/// The event loop. Create it with [`StoreRuntime::spawn`] and talk to it
/// through the returned [`StoreHandle`].
pub struct StoreRuntime<R: Record, A> {
    dispatcher: Dispatcher<R>,
    adapter: Arc<A>,
    rx: UnboundedReceiver<Message<R>>,
    completions: WeakUnboundedSender<Message<R>>,
    in_flight: usize,
    settle_waiters: Vec<oneshot::Sender<()>>,
    stopping: Vec<oneshot::Sender<RuntimeStats>>,
    stats: RuntimeStats,
}

impl<R, A> StoreRuntime<R, A>
where
    R: Record,
    A: SyncAdapter<R> + 'static,
{
    /// Start the loop on the current tokio runtime.
    ///
    /// The loop ends on [`StoreHandle::shutdown`], or once every handle is
    /// dropped and no request is in flight.
    pub fn spawn(dispatcher: Dispatcher<R>, adapter: A) -> StoreHandle<R> {
        let (tx, rx) = mpsc::unbounded_channel();
        let runtime = StoreRuntime {
            dispatcher,
            adapter: Arc::new(adapter),
            rx,
            completions: tx.downgrade(),
            in_flight: 0,
            settle_waiters: Vec::new(),
            stopping: Vec::new(),
            stats: RuntimeStats::default(),
        };
        tokio::spawn(runtime.run());
        StoreHandle {
            tx,
            closed: Arc::new(RwLock::new(false)),
        }
    }

    async fn run(mut self) {
        debug!("{}: store runtime started", R::COLLECTION);

        while let Some(message) = self.rx.recv().await {
            match message {
                Message::Command(command) => self.on_command(command).await,
                Message::Completed { request, outcome } => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    self.stats.completed += 1;
                    if outcome.is_err() {
                        self.stats.failed += 1;
                    }
                    self.dispatcher.complete(request, outcome);
                }
                Message::Inspect(inspect) => inspect(&self.dispatcher),
                Message::Settle(waiter) => self.settle_waiters.push(waiter),
                Message::Shutdown(reply) => self.stopping.push(reply),
            }

            if self.in_flight == 0 {
                for waiter in self.settle_waiters.drain(..) {
                    let _ = waiter.send(());
                }
                if !self.stopping.is_empty() {
                    self.dispatcher.flush();
                    info!("{}: store runtime stopped", R::COLLECTION);
                    for reply in self.stopping.drain(..) {
                        let _ = reply.send(self.stats.clone());
                    }
                    return;
                }
            }
        }

        self.dispatcher.flush();
        debug!("{}: all handles dropped, store runtime stopped", R::COLLECTION);
    }

    async fn on_command(&mut self, command: Command<R>) {
        self.stats.commands += 1;

        match self.dispatcher.submit(command) {
            Submission::Dispatched(request) => {
                self.stats.dispatched += 1;
                self.execute(request).await;
            }
            Submission::Dropped(_) => self.stats.dropped += 1,
            Submission::Local => {}
        }
    }

    async fn execute(&mut self, request: SyncRequest<R>) {
        match self.completions.upgrade() {
            Some(tx) => {
                self.in_flight += 1;
                let adapter = Arc::clone(&self.adapter);
                tokio::spawn(async move {
                    let sent = request.clone();
                    let task = tokio::spawn(async move { adapter.execute(&sent).await });
                    // A panicking adapter still has to settle its request.
                    let outcome = match task.await {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            warn!("{}: ticket {} aborted: {}", R::COLLECTION, request.ticket, err);
                            Err(SyncError::server(format!("request aborted: {}", err)))
                        }
                    };
                    let _ = tx.send(Message::Completed { request, outcome });
                });
            }
            // No handle is left to post from; finish the request in place.
            None => {
                let outcome = self.adapter.execute(&request).await;
                self.stats.completed += 1;
                if outcome.is_err() {
                    self.stats.failed += 1;
                }
                self.dispatcher.complete(request, outcome);
            }
        }
    }
}

/// Cloneable handle to a running store.
///
/// Once any clone has asked for shutdown, every clone refuses new commands.
pub struct StoreHandle<R: Record> {
    tx: UnboundedSender<Message<R>>,
    closed: Arc<RwLock<bool>>,
}

impl<R: Record> Clone for StoreHandle<R> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<R: Record> StoreHandle<R> {
    /// Queue a command. Returns as soon as it is queued.
    ///
    /// Fails with [`StoreError::Stopped`] once shutdown has been requested.
    pub fn send(&self, command: Command<R>) -> Result<(), StoreError> {
        let closed = self
            .closed
            .read()
            .map_err(|_| StoreError::LockPoisoned("store handle"))?;
        if *closed {
            return Err(StoreError::Stopped);
        }
        self.tx
            .send(Message::Command(command))
            .map_err(|_| StoreError::Stopped)
    }

    /// Run `f` against the dispatcher on the loop and return its result.
    pub async fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Dispatcher<R>) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let inspect: Inspect<R> = Box::new(move |dispatcher| {
            let _ = reply.send(f(dispatcher));
        });
        self.tx
            .send(Message::Inspect(inspect))
            .map_err(|_| StoreError::Stopped)?;
        response.await.map_err(|_| StoreError::Stopped)
    }

    /// Copy of the collection after every command queued so far.
    pub async fn snapshot(&self) -> Result<EntityCollection<R>, StoreError> {
        self.read(|dispatcher| dispatcher.collection().clone()).await
    }

    pub async fn summary<S: Summary<R>>(&self) -> Result<S, StoreError> {
        self.read(|dispatcher| dispatcher.summary::<S>()).await
    }

    /// Wait until no request is in flight.
    pub async fn settled(&self) -> Result<(), StoreError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Message::Settle(reply))
            .map_err(|_| StoreError::Stopped)?;
        response.await.map_err(|_| StoreError::Stopped)
    }

    /// Stop taking commands, wait for in-flight requests, flush persistence.
    pub async fn shutdown(&self) -> Result<RuntimeStats, StoreError> {
        let (reply, response) = oneshot::channel();
        {
            // Commands accepted before this point are queued ahead of the shutdown.
            let mut closed = self
                .closed
                .write()
                .map_err(|_| StoreError::LockPoisoned("store handle"))?;
            *closed = true;
            self.tx
                .send(Message::Shutdown(reply))
                .map_err(|_| StoreError::Stopped)?;
        }
        response.await.map_err(|_| StoreError::Stopped)
    }
}
