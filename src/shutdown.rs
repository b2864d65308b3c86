//! Shutdown Module
//!
//! Turns termination signals and fatal runtime conditions into a single
//! graceful-shutdown trigger.

use std::fmt;

use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, warn};

// == Shutdown Reason ==
/// What initiated the shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// A fatal condition reported through [`FatalReporter`]
    Fatal(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "SIGINT"),
            ShutdownReason::Terminate => write!(f, "SIGTERM"),
            ShutdownReason::Fatal(reason) => write!(f, "fatal error ({})", reason),
        }
    }
}

// == Fatal Reporter ==
/// Handle for reporting conditions that must bring the process down.
#[derive(Debug, Clone)]
pub struct FatalReporter {
    tx: mpsc::UnboundedSender<String>,
}

impl FatalReporter {
    /// Reports a fatal condition. Later reports after the first are ignored.
    pub fn report(&self, reason: impl Into<String>) {
        // Receiver gone means shutdown is already under way
        let _ = self.tx.send(reason.into());
    }
}

/// Creates a reporter and the receiver consumed by [`wait_for_shutdown`].
pub fn fatal_channel() -> (FatalReporter, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FatalReporter { tx }, rx)
}

/// Routes every panic, including panics inside spawned tasks, to `reporter`.
///
/// The previous hook still runs so the panic message keeps its usual output.
pub fn install_panic_hook(reporter: FatalReporter) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        previous(info);
        let reason = info.to_string();
        warn!("Unhandled panic: {}", reason);
        reporter.report(reason);
    }));
}

// == Wait For Shutdown ==
/// Waits for SIGINT, SIGTERM or a fatal report, whichever comes first.
pub async fn wait_for_shutdown(mut fatal: mpsc::UnboundedReceiver<String>) -> ShutdownReason {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let fatal = async {
        match fatal.recv().await {
            Some(reason) => reason,
            // All reporters dropped: nothing can be reported any more
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = ctrl_c => ShutdownReason::Interrupt,
        _ = terminate => ShutdownReason::Terminate,
        reason = fatal => ShutdownReason::Fatal(reason),
    }
}
