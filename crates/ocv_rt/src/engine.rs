use std::collections::VecDeque;

use thiserror::Error;

/// One evaluation snapshot from the engine: a display-ready score and the
/// principal variation as a SAN line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalReport {
    pub eval_text: String,
    pub pv: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine is not running")]
    NotRunning,
    #[error("engine failed: {0}")]
    Failed(String),
}

pub trait AnalysisEngine {
    fn start(&mut self) -> Result<(), EngineError>;
    fn stop(&mut self);
    fn running(&self) -> bool;
    fn analyze(&mut self, fen: &str, depth: u32) -> Result<EvalReport, EngineError>;
}

/// Test double returning scripted reports in FIFO order.
#[derive(Default)]
pub struct ScriptedEngine {
    running: bool,
    reports: VecDeque<EvalReport>,
    analyzed: Vec<(String, u32)>,
}

impl ScriptedEngine {
    pub fn push_report(&mut self, eval_text: impl Into<String>, pv: impl Into<String>) {
        self.reports.push_back(EvalReport {
            eval_text: eval_text.into(),
            pv: pv.into(),
        });
    }

    pub fn analyzed(&self) -> &[(String, u32)] {
        &self.analyzed
    }
}

impl AnalysisEngine for ScriptedEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn running(&self) -> bool {
        self.running
    }

    fn analyze(&mut self, fen: &str, depth: u32) -> Result<EvalReport, EngineError> {
        if !self.running {
            return Err(EngineError::NotRunning);
        }
        self.analyzed.push((fen.to_string(), depth));
        self.reports.pop_front().ok_or(EngineError::NotRunning)
    }
}
