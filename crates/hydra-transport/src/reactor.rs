//! The reactor: one background thread running the I/O event loop.
//!
//! Every socket operation, every parser call, and every session state
//! change runs on this thread. It is a Tokio *current-thread* runtime,
//! so tasks spawned on it never run in parallel with each other and
//! session state needs no locking.
//!
//! The owner thread (game loop, `main`) hands work to the reactor with
//! [`Reactor::post`] or [`Reactor::spawn`]; it never touches session
//! state directly.

use std::future::Future;
use std::thread::JoinHandle;

use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;

use crate::TransportError;

/// A running reactor thread.
///
/// Dropping the reactor stops its event loop, cancels every task still
/// on it (closing their sockets), and joins the thread.
pub struct Reactor {
    name: String,
    handle: Handle,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Reactor {
    /// Starts a reactor on a new OS thread named `name`.
    ///
    /// # Errors
    /// Returns [`TransportError::Reactor`] if the runtime or the thread
    /// can't be created.
    pub fn start(name: &str) -> Result<Self, TransportError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(TransportError::Reactor)?;
        let handle = runtime.handle().clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread_name = name.to_string();
        let thread = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                tracing::debug!(reactor = %thread_name, "reactor running");
                // Spawned tasks only make progress while `block_on` drives
                // the runtime, so park here until shutdown.
                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
                drop(runtime);
                tracing::debug!(reactor = %thread_name, "reactor stopped");
            })
            .map_err(TransportError::Reactor)?;

        Ok(Self {
            name: name.to_string(),
            handle,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Schedules `callback` to run on the reactor thread.
    pub fn post<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.spawn(async move { callback() });
    }

    /// Spawns a task on the reactor.
    pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// A handle to the reactor's runtime.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The reactor thread's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` while the event loop thread is alive.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the event loop and waits for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            // Joining from the reactor thread itself would deadlock.
            if thread.thread().id() == std::thread::current().id() {
                tracing::warn!(reactor = %self.name, "reactor dropped on its own thread");
                return;
            }
            if thread.join().is_err() {
                tracing::error!(reactor = %self.name, "reactor thread panicked");
            }
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_post_runs_on_reactor_thread() {
        let reactor = Reactor::start("test-reactor").expect("start");
        let (tx, rx) = mpsc::channel();

        reactor.post(move || {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        });

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("test-reactor"));
    }

    #[test]
    fn test_post_preserves_order() {
        let reactor = Reactor::start("order-reactor").expect("start");
        let (tx, rx) = mpsc::channel();

        for i in 0..100 {
            let tx = tx.clone();
            reactor.post(move || tx.send(i).unwrap());
        }

        let got: Vec<i32> = (0..100)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(got, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_spawn_drives_async_tasks() {
        let reactor = Reactor::start("spawn-reactor").expect("start");
        let (tx, rx) = mpsc::channel();

        reactor.spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            tx.send("done").unwrap();
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "done");
    }

    #[test]
    fn test_shutdown_joins_thread() {
        let reactor = Reactor::start("shutdown-reactor").expect("start");
        assert!(reactor.is_running());
        assert_eq!(reactor.name(), "shutdown-reactor");
        reactor.shutdown();
    }

    #[test]
    fn test_drop_cancels_pending_tasks() {
        let reactor = Reactor::start("drop-reactor").expect("start");
        let (tx, rx) = mpsc::channel::<()>();

        reactor.spawn(async move {
            // Never completes on its own; holds `tx` until cancelled.
            std::future::pending::<()>().await;
            drop(tx);
        });
        drop(reactor);

        // The task was dropped with the runtime, so the sender is gone.
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_err());
    }
}
