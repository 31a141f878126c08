use std::collections::VecDeque;

use thiserror::Error;

use ocv_core::model::BoardStatus;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("board disconnected")]
    Disconnected,
    #[error("board rejected command: {0}")]
    Rejected(String),
}

/// Electronic sensor board. `poll_fen` returns the placement the board
/// currently reports, or None when nothing changed since the last poll.
/// `set_fen` pushes a position to the board's display; `force` resets the
/// driver state even when the board believes it is already in sync.
pub trait SensorBoard {
    fn status(&mut self) -> BoardStatus;
    fn set_fen(&mut self, fen: &str, force: bool) -> Result<(), BoardError>;
    fn poll_fen(&mut self) -> Result<Option<String>, BoardError>;
}

/// No hardware attached.
#[derive(Default)]
pub struct NoopBoard;

impl SensorBoard for NoopBoard {
    fn status(&mut self) -> BoardStatus {
        BoardStatus::default()
    }

    fn set_fen(&mut self, _fen: &str, _force: bool) -> Result<(), BoardError> {
        Err(BoardError::Disconnected)
    }

    fn poll_fen(&mut self) -> Result<Option<String>, BoardError> {
        Err(BoardError::Disconnected)
    }
}

/// Test double with a scripted stream of placement reports.
pub struct MockBoard {
    pub connected: bool,
    reports: VecDeque<String>,
    set_calls: Vec<(String, bool)>,
}

impl Default for MockBoard {
    fn default() -> Self {
        Self {
            connected: true,
            reports: VecDeque::new(),
            set_calls: Vec::new(),
        }
    }
}

impl MockBoard {
    pub fn push_report(&mut self, fen: impl Into<String>) {
        self.reports.push_back(fen.into());
    }

    pub fn set_calls(&self) -> &[(String, bool)] {
        &self.set_calls
    }
}

impl SensorBoard for MockBoard {
    fn status(&mut self) -> BoardStatus {
        BoardStatus {
            available: true,
            connected: self.connected,
        }
    }

    fn set_fen(&mut self, fen: &str, force: bool) -> Result<(), BoardError> {
        if !self.connected {
            return Err(BoardError::Disconnected);
        }
        self.set_calls.push((fen.to_string(), force));
        Ok(())
    }

    fn poll_fen(&mut self) -> Result<Option<String>, BoardError> {
        if !self.connected {
            return Err(BoardError::Disconnected);
        }
        Ok(self.reports.pop_front())
    }
}
