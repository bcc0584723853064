//! SyncEngine - a dispatcher wired to an adapter, run one command at a time.

use log::trace;

use crate::dispatcher::{Command, Dispatcher, Submission};
use crate::record::Record;
use crate::sync::SyncAdapter;

/// Runs submit, execute and complete back to back for each command.
///
/// Nothing overlaps, so responses can never arrive out of order. Use the
/// runtime when requests should run concurrently with new commands.
pub struct SyncEngine<R: Record, A> {
    dispatcher: Dispatcher<R>,
    adapter: A,
}

impl<R, A> SyncEngine<R, A>
where
    R: Record,
    A: SyncAdapter<R>,
{
    pub fn new(dispatcher: Dispatcher<R>, adapter: A) -> Self {
        Self {
            dispatcher,
            adapter,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<R> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<R> {
        &mut self.dispatcher
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn into_parts(self) -> (Dispatcher<R>, A) {
        (self.dispatcher, self.adapter)
    }

    /// Handle one command to completion. Returns what the dispatcher decided.
    pub async fn handle(&mut self, command: Command<R>) -> Submission<R> {
        let submission = self.dispatcher.submit(command);
        if let Submission::Dispatched(request) = &submission {
            trace!("{}: executing ticket {}", R::COLLECTION, request.ticket);
            let outcome = self.adapter.execute(request).await;
            self.dispatcher.complete(request.clone(), outcome);
        }
        submission
    }
}
