//! Shutdown Coordinator - Signal to Cooperative Stop
//!
//! Converts SIGINT/SIGTERM into a one-way "stopping" flag. The flag is
//! an owned context object cloned into the signal task, the main loop
//! and the session, so there is no global state.
//!
//! Shutdown is cooperative: the session observes the flag between
//! frames, never in the middle of a dispatch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Default)]
struct FlagInner {
  stopping: AtomicBool,
  notify: Notify,
}

/// Monotonic running → stopping flag.
///
/// Single logical writer (signal handling), many readers. Once set it
/// is never reset.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
  inner: Arc<FlagInner>,
}

impl ShutdownFlag {
  pub fn new() -> Self {
    Self::default()
  }

  /// Move to "stopping". Returns `true` only for the call that made
  /// the transition; repeated calls are no-ops.
  pub fn request_stop(&self) -> bool {
    let first = !self.inner.stopping.swap(true, Ordering::SeqCst);
    if first {
      self.inner.notify.notify_waiters();
    }
    first
  }

  pub fn is_stopping(&self) -> bool {
    self.inner.stopping.load(Ordering::SeqCst)
  }

  /// Resolves once the flag is set. Cancel-safe.
  pub async fn stopped(&self) {
    let notified = self.inner.notify.notified();
    tokio::pin!(notified);
    // Register before checking so a concurrent request_stop is not missed.
    notified.as_mut().enable();
    if self.is_stopping() {
      return;
    }
    notified.await;
  }
}

/// Installs signal handling and supervises the session task.
pub struct ShutdownCoordinator {
  flag: ShutdownFlag,
  /// Main-loop polling cadence.
  poll_interval: Duration,
}

impl ShutdownCoordinator {
  pub fn new(poll_interval: Duration) -> Self {
    Self {
      flag: ShutdownFlag::new(),
      poll_interval,
    }
  }

  /// The flag shared with the session and any other observers.
  pub fn flag(&self) -> ShutdownFlag {
    self.flag.clone()
  }

  /// Spawn the signal listener.
  ///
  /// Every delivered SIGINT (and SIGTERM on unix) requests a stop;
  /// only the first one has an effect.
  pub fn install(&self) -> JoinHandle<()> {
    let flag = self.flag.clone();
    tokio::spawn(async move { listen_for_signals(flag).await })
  }

  /// Poll the flag at the configured cadence while `session` runs.
  ///
  /// Returns the session's output. If the flag is observed first, the
  /// session is left to close itself (it watches the same flag) and
  /// is awaited to completion.
  #[instrument(skip_all)]
  pub async fn supervise<T>(
    &self,
    mut session: JoinHandle<T>,
  ) -> Result<T, tokio::task::JoinError> {
    let mut ticker = tokio::time::interval(self.poll_interval);

    loop {
      tokio::select! {
        biased;
        result = &mut session => return result,
        _ = ticker.tick() => {
          if self.flag.is_stopping() {
            info!("Stop observed by main loop, waiting for session to close");
            break;
          }
        }
      }
    }

    session.await
  }
}

#[cfg(unix)]
async fn listen_for_signals(flag: ShutdownFlag) {
  use tokio::signal::unix::{SignalKind, signal};

  let mut terminate = match signal(SignalKind::terminate()) {
    Ok(stream) => Some(stream),
    Err(e) => {
      warn!(error = %e, "Failed to install SIGTERM handler, SIGINT only");
      None
    }
  };

  loop {
    let name = tokio::select! {
      result = tokio::signal::ctrl_c() => {
        if let Err(e) = result {
          warn!(error = %e, "SIGINT listener failed");
          return;
        }
        "SIGINT"
      }
      Some(()) = async {
        match terminate.as_mut() {
          Some(stream) => stream.recv().await,
          None => std::future::pending().await,
        }
      } => "SIGTERM",
    };
    record_signal(&flag, name);
  }
}

#[cfg(not(unix))]
async fn listen_for_signals(flag: ShutdownFlag) {
  loop {
    if let Err(e) = tokio::signal::ctrl_c().await {
      warn!(error = %e, "SIGINT listener failed");
      return;
    }
    record_signal(&flag, "SIGINT");
  }
}

fn record_signal(flag: &ShutdownFlag, name: &str) {
  if flag.request_stop() {
    info!(signal = name, "Terminate signal received, shutting down");
  } else {
    debug!(signal = name, "Shutdown already in progress");
  }
}
