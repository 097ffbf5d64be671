//! Progress animation around slow network calls.

use std::future::Future;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

const FRAMES: [char; 4] = ['\\', '|', '/', '—'];
const TICK: Duration = Duration::from_millis(100);

/// A ticking `message x` line, redrawn in place until stopped.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Spinner {
    pub fn start<W: Write + Send + 'static>(message: impl Into<String>, mut out: W) -> Self {
        let message = message.into();
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = tokio::spawn(async move {
            let mut frames = FRAMES.iter().cycle();
            while flag.load(Ordering::SeqCst) {
                if let Some(frame) = frames.next() {
                    let _ = write!(out, "\r{message} {frame}");
                    let _ = out.flush();
                }
                tokio::time::sleep(TICK).await;
            }
            let _ = writeln!(out);
        });

        Self { running, handle }
    }

    /// Stop ticking and wait for the line to be terminated.
    pub async fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.handle.await;
    }
}

/// Await `future` while a spinner runs on stderr.
///
/// Without a terminal the future is awaited as is.
pub async fn with_spinner<F: Future>(message: &str, future: F) -> F::Output {
    if !io::stderr().is_terminal() {
        return future.await;
    }

    let spinner = Spinner::start(message, io::stderr());
    let output = future.await;
    spinner.stop().await;
    output
}
