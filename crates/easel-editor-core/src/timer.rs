//! Periodic and debounced timer lines.
//!
//! Each line runs as its own task and stops when its cancellation token is
//! cancelled. Neither line ever runs its action after cancellation. Action
//! errors are logged and the line keeps going.

use std::fmt::Display;
use std::time::Duration;

use n0_future::task;
use n0_future::time;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Fires an action every `interval` until cancelled.
///
/// The first firing happens one full interval after spawning. Dropping the
/// line cancels it.
#[derive(Debug)]
pub struct PeriodicLine {
    token: CancellationToken,
}

impl PeriodicLine {
    pub fn spawn<F, R, E>(
        name: &'static str,
        interval: Duration,
        token: CancellationToken,
        mut action: F,
    ) -> Self
    where
        F: FnMut() -> Result<R, E> + Send + 'static,
        E: Display,
    {
        let loop_token = token.clone();
        task::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => break,
                    _ = time::sleep(interval) => {}
                }
                if loop_token.is_cancelled() {
                    break;
                }
                if let Err(e) = action() {
                    tracing::warn!(line = name, error = %e, "periodic action failed");
                }
            }
            tracing::trace!(line = name, "periodic line stopped");
        });
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for PeriodicLine {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Cloneable handle for feeding values into a [`DebouncedLine`].
#[derive(Debug)]
pub struct DebounceTrigger<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for DebounceTrigger<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> DebounceTrigger<T> {
    /// Restart the quiet period. Returns false once the line has stopped.
    pub fn trigger(&self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}

/// Runs an action once triggers have been quiet for `quiet`.
///
/// A trigger arriving inside the quiet period restarts it and replaces the
/// pending value. Cancelling discards a pending firing.
#[derive(Debug)]
pub struct DebouncedLine<T> {
    trigger: DebounceTrigger<T>,
    token: CancellationToken,
}

impl<T: Send + 'static> DebouncedLine<T> {
    pub fn spawn<F, R, E>(
        name: &'static str,
        quiet: Duration,
        token: CancellationToken,
        action: F,
    ) -> Self
    where
        F: FnMut(T) -> Result<R, E> + Send + 'static,
        R: 'static,
        E: Display + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        task::spawn(run_debounced(name, quiet, token.clone(), rx, action));
        Self {
            trigger: DebounceTrigger { tx },
            token,
        }
    }

    pub fn trigger(&self, value: T) -> bool {
        self.trigger.trigger(value)
    }

    pub fn trigger_handle(&self) -> DebounceTrigger<T> {
        self.trigger.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl<T> Drop for DebouncedLine<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_debounced<T, F, R, E>(
    name: &'static str,
    quiet: Duration,
    token: CancellationToken,
    mut rx: mpsc::UnboundedReceiver<T>,
    mut action: F,
) where
    F: FnMut(T) -> Result<R, E>,
    E: Display,
{
    loop {
        let mut pending = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = rx.recv() => match next {
                Some(value) => value,
                None => break,
            },
        };

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::trace!(line = name, "debounced line stopped with a pending firing");
                    return;
                }
                next = rx.recv() => match next {
                    Some(value) => pending = value,
                    None => return,
                },
                _ = time::sleep(quiet) => break,
            }
        }

        if token.is_cancelled() {
            return;
        }
        if let Err(e) = action(pending) {
            tracing::warn!(line = name, error = %e, "debounced action failed");
        }
    }
    tracing::trace!(line = name, "debounced line stopped");
}

/// A periodic line and a debounced line sharing one cancellation scope.
#[derive(Debug)]
pub struct TimerMultiplexer<T> {
    periodic: PeriodicLine,
    debounced: DebouncedLine<T>,
    token: CancellationToken,
}

impl<T: Send + 'static> TimerMultiplexer<T> {
    /// Start both lines under a child of `parent`.
    pub fn start<P, PR, PE, D, DR, DE>(
        parent: &CancellationToken,
        interval: Duration,
        quiet: Duration,
        periodic: P,
        debounced: D,
    ) -> Self
    where
        P: FnMut() -> Result<PR, PE> + Send + 'static,
        PE: Display,
        D: FnMut(T) -> Result<DR, DE> + Send + 'static,
        DR: 'static,
        DE: Display + 'static,
    {
        let token = parent.child_token();
        Self {
            periodic: PeriodicLine::spawn("periodic", interval, token.child_token(), periodic),
            debounced: DebouncedLine::spawn("debounced", quiet, token.child_token(), debounced),
            token,
        }
    }

    pub fn trigger_handle(&self) -> DebounceTrigger<T> {
        self.debounced.trigger_handle()
    }

    /// Cancel both lines, including any pending debounced firing.
    pub fn cancel_all(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.periodic.is_cancelled()
    }
}

impl<T> Drop for TimerMultiplexer<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
