//! Process-wide exit request.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Cloneable flag that ends the main loop once set.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown. Idempotent.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true once any clone has been triggered.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Triggers on SIGINT/SIGTERM. Can only be installed once per process.
    pub fn install_ctrlc(&self) -> Result<(), ctrlc::Error> {
        let signal = self.clone();
        ctrlc::set_handler(move || {
            tracing::info!("Interrupt received");
            signal.trigger();
        })
    }

    /// Triggers when a line consisting of `key` is read from stdin.
    pub fn watch_stdin(&self, key: char) -> io::Result<JoinHandle<()>> {
        self.watch_reader(io::BufReader::new(io::stdin()), key)
    }

    /// Triggers when a line consisting of `key` is read from `reader`.
    ///
    /// The watcher ends quietly at end of input without triggering.
    pub fn watch_reader<R>(&self, reader: R, key: char) -> io::Result<JoinHandle<()>>
    where
        R: BufRead + Send + 'static,
    {
        let signal = self.clone();
        thread::Builder::new()
            .name("exit-key".into())
            .spawn(move || {
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    let mut chars = line.trim().chars();
                    if chars.next().is_some_and(|c| c.eq_ignore_ascii_case(&key))
                        && chars.next().is_none()
                    {
                        tracing::info!(%key, "Exit key pressed");
                        signal.trigger();
                        break;
                    }
                }
            })
    }
}
