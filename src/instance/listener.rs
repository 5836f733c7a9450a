use crate::net::Transport;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Lifecycle of one listener. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unstarted,
    Listening,
    Stopped,
}

pub struct Listener {
    transport: Transport,
    state: State,
    handle: Option<JoinHandle<Result<(), anyhow::Error>>>,
    shutdown: Option<watch::Sender<bool>>,
}

impl Listener {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            state: State::Unstarted,
            handle: None,
            shutdown: None,
        }
    }

    /// Current state. A listener whose task ended by itself reads as `Stopped`.
    pub fn state(&self) -> State {
        match (&self.state, &self.handle) {
            (State::Listening, Some(handle)) if handle.is_finished() => State::Stopped,
            (state, _) => *state,
        }
    }

    pub(crate) fn listening(
        &mut self,
        handle: JoinHandle<Result<(), anyhow::Error>>,
        shutdown: Option<watch::Sender<bool>>,
    ) {
        self.state = State::Listening;
        self.handle = Some(handle);
        self.shutdown = shutdown;
    }

    pub(crate) fn failed(&mut self) {
        self.state = State::Stopped;
    }

    /// Abort the serve task and wait for it to go away.
    pub(crate) async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        let handle = self.handle.take();
        self.state = match self.state {
            State::Unstarted => State::Unstarted,
            _ => State::Stopped,
        };

        let Some(handle) = handle else {
            return;
        };

        let res = if handle.is_finished() {
            handle.await
        } else {
            handle.abort();
            handle.await
        };

        match res {
            Ok(Ok(_)) => tracing::info!("{} listener stopped", self.transport),
            Ok(Err(e)) => tracing::debug!("{} listener had already failed. [{}]", self.transport, e),
            Err(e) if e.is_cancelled() => tracing::info!("{} listener stopped", self.transport),
            Err(e) => tracing::error!("{} listener panicked. [{}]", self.transport, e),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
