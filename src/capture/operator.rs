use crate::error::Result;
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Discrete operator commands during a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorSignal {
    CaptureNow,
    Cancel,
}

/// Source of operator commands.
pub trait OperatorInput {
    /// Wait at most `wait` for the next command.
    fn poll(&mut self, wait: Duration) -> Result<Option<OperatorSignal>>;
}

/// Line-based operator input on stdin.
///
/// A single reader thread forwards lines so that polls can time out. `c` or
/// an empty line captures, `q` cancels; anything else is ignored.
pub struct TerminalInput {
    lines: Receiver<String>,
}

impl TerminalInput {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self { lines: rx }
    }

    /// Block for the next full line; `None` once stdin is closed.
    pub fn read_line(&self) -> Option<String> {
        self.lines.recv().ok()
    }

    pub fn parse(line: &str) -> Option<OperatorSignal> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "c" | "capture" => Some(OperatorSignal::CaptureNow),
            "q" | "quit" | "cancel" => Some(OperatorSignal::Cancel),
            _ => None,
        }
    }
}

impl OperatorInput for TerminalInput {
    fn poll(&mut self, wait: Duration) -> Result<Option<OperatorSignal>> {
        match self.lines.recv_timeout(wait) {
            Ok(line) => Ok(Self::parse(&line)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Ok(Some(OperatorSignal::Cancel)),
        }
    }
}
