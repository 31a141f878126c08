use std::collections::VecDeque;

use tracing::warn;

use ocv_core::message::{Command, ErrorScope, Message};
use ocv_core::model::Model;
use ocv_core::selectors::active_game_id;
use ocv_core::update::update;
use ocv_rt::board::SensorBoard;
use ocv_rt::clipboard::Clipboard;
use ocv_rt::engine::AnalysisEngine;
use ocv_rt::persistence::StudyStore;
use ocv_rt::recognition::Recognizer;
use ocv_storage::study::StudyDoc;

/// Steps between a dirtying edit and the autosave it schedules. A later
/// edit replaces the pending deadline, so bursts coalesce into one save.
pub const AUTOSAVE_DELAY_STEPS: u64 = 5;
pub const STATUS_POLL_INTERVAL_STEPS: u64 = 10;
pub const BOARD_POLL_INTERVAL_STEPS: u64 = 2;

/// Owns the model and the ports, and serializes all dispatch: every message
/// runs through the transition function to completion (including command
/// fallout) before the next external message is accepted.
pub struct Dispatcher {
    model: Model,
    recognizer: Box<dyn Recognizer>,
    store: Box<dyn StudyStore>,
    engine: Box<dyn AnalysisEngine>,
    board: Box<dyn SensorBoard>,
    clipboard: Box<dyn Clipboard>,
    queue: VecDeque<Message>,
    pumping: bool,
    next_game_id: u64,
    step: u64,
    autosave_at: Option<u64>,
    status_poll_at: Option<u64>,
    board_poll_at: Option<u64>,
}

impl Dispatcher {
    pub fn new(
        recognizer: Box<dyn Recognizer>,
        store: Box<dyn StudyStore>,
        engine: Box<dyn AnalysisEngine>,
        board: Box<dyn SensorBoard>,
        clipboard: Box<dyn Clipboard>,
    ) -> Self {
        Self {
            model: Model::new(),
            recognizer,
            store,
            engine,
            board,
            clipboard,
            queue: VecDeque::new(),
            pumping: false,
            next_game_id: 0,
            step: 0,
            autosave_at: None,
            status_poll_at: None,
            board_poll_at: None,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// PGN of the tree the active game is studied in, when there is one.
    pub fn active_pgn(&self) -> Option<String> {
        let game_id = active_game_id(&self.model.workflow)?;
        let context = ocv_core::selectors::analysis_context(&self.model, game_id)?;
        Some(context.tree.to_pgn())
    }

    pub fn dispatch(&mut self, message: Message) {
        self.queue.push_back(message);
        if self.pumping {
            // Re-entrant dispatch from command execution; the outer pump
            // will drain it.
            return;
        }
        self.pumping = true;
        while let Some(message) = self.queue.pop_front() {
            let model = std::mem::take(&mut self.model);
            let (next, commands) = update(model, message);
            self.model = next;
            for command in commands {
                self.execute(command);
            }
        }
        self.pumping = false;
    }

    /// Advances deterministic time by one step and fires due timers.
    pub fn tick(&mut self) {
        self.step += 1;

        if self.autosave_at.is_some_and(|at| at <= self.step) {
            self.autosave_at = None;
            self.dispatch(Message::AutosaveDue);
        }

        if self.status_poll_at.is_some_and(|at| at <= self.step) {
            self.status_poll_at = Some(self.step + STATUS_POLL_INTERVAL_STEPS);
            let status = self.board.status();
            self.dispatch(Message::BoardStatusChanged {
                available: status.available,
                connected: status.connected,
            });
        }

        if self.board_poll_at.is_some_and(|at| at <= self.step) {
            self.board_poll_at = Some(self.step + BOARD_POLL_INTERVAL_STEPS);
            match self.board.poll_fen() {
                Ok(Some(fen)) => self.dispatch(Message::BoardFenUpdated { fen }),
                Ok(None) => {}
                Err(error) => self.dispatch(Message::Error {
                    scope: ErrorScope::Board,
                    text: error.to_string(),
                }),
            }
        }
    }

    pub fn run_steps(&mut self, steps: u64) {
        for _ in 0..steps {
            self.tick();
        }
    }

    fn mint_game_id(&mut self) -> String {
        self.next_game_id += 1;
        format!("g{}", self.next_game_id)
    }

    fn execute(&mut self, command: Command) {
        match command {
            // The simulated renderer completes synchronously at the
            // requested scale.
            Command::RenderPage { page, scale } => {
                self.dispatch(Message::PageRendered {
                    page,
                    actual_scale: scale,
                });
            }

            Command::DetectDiagrams { page } => match self.recognizer.detect_diagrams(page) {
                Ok(boxes) => self.dispatch(Message::DiagramsDetected { page, boxes }),
                Err(error) => self.dispatch(Message::Error {
                    scope: ErrorScope::Detection,
                    text: error.to_string(),
                }),
            },

            Command::RecognizeDiagram { page, bbox, .. } => {
                match self.recognizer.recognize(page, bbox) {
                    Ok(position) => {
                        let game_id = self.mint_game_id();
                        self.dispatch(Message::Recognized {
                            game_id,
                            placement: position.placement,
                            confidence: position.confidence,
                        });
                    }
                    Err(error) => self.dispatch(Message::RecognitionFailed {
                        reason: error.to_string(),
                    }),
                }
            }

            Command::ExtractText { page } => match self.recognizer.extract_text(page) {
                Ok(pdf_text) => self.dispatch(Message::TextExtracted {
                    pdf_text,
                    ocr_text: String::new(),
                }),
                Err(error) => warn!(error = %error, page, "text extraction failed"),
            },

            Command::ScheduleSave => {
                self.autosave_at = Some(self.step + AUTOSAVE_DELAY_STEPS);
            }

            Command::SaveStudy => {
                let Some(info) = self.model.pdf.info.as_ref() else {
                    return;
                };
                let doc = StudyDoc::from_model_parts(
                    &info.content_hash,
                    &self.model.games,
                    &self.model.analyses,
                    &self.model.continuations,
                );
                match self.store.save(&doc) {
                    Ok(()) => self.dispatch(Message::SaveCompleted),
                    Err(error) => self.dispatch(Message::SaveFailed {
                        reason: error.to_string(),
                    }),
                }
            }

            Command::LoadStudy => {
                let Some(info) = self.model.pdf.info.as_ref() else {
                    return;
                };
                match self.store.load(&info.content_hash) {
                    Ok(Some(doc)) => self.dispatch(Message::StudyLoaded {
                        games: doc.games,
                        analyses: doc.analyses,
                        continuations: doc.continuations,
                    }),
                    Ok(None) => {}
                    Err(error) => self.dispatch(Message::LoadFailed {
                        reason: error.to_string(),
                    }),
                }
            }

            Command::SetBoardFen { fen, force } => {
                if let Err(error) = self.board.set_fen(&fen, force) {
                    self.dispatch(Message::Error {
                        scope: ErrorScope::Board,
                        text: error.to_string(),
                    });
                }
            }

            Command::StartStatusPoll => {
                self.status_poll_at = Some(self.step + STATUS_POLL_INTERVAL_STEPS);
            }

            Command::StartBoardPoll => {
                self.board_poll_at = Some(self.step + BOARD_POLL_INTERVAL_STEPS);
            }

            Command::StopBoardPoll => {
                self.board_poll_at = None;
            }

            Command::EngineStart => match self.engine.start() {
                Ok(()) => self.dispatch(Message::EngineStateChanged { running: true }),
                Err(error) => self.dispatch(Message::Error {
                    scope: ErrorScope::Engine,
                    text: error.to_string(),
                }),
            },

            Command::EngineStop => {
                self.engine.stop();
                self.dispatch(Message::EngineStateChanged { running: false });
            }

            Command::EngineAnalyze { fen, depth } => match self.engine.analyze(&fen, depth) {
                Ok(report) => self.dispatch(Message::EngineReport {
                    eval_text: report.eval_text,
                    pv: report.pv,
                }),
                Err(error) => warn!(error = %error, "engine analysis skipped"),
            },

            Command::CompleteReach { moves, final_fen } => {
                self.dispatch(Message::ReachTargetResolved { moves, final_fen });
            }

            Command::CopyToClipboard { text } => {
                if let Err(error) = self.clipboard.set_text(&text) {
                    warn!(error = %error, "clipboard write failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Dispatcher, AUTOSAVE_DELAY_STEPS, BOARD_POLL_INTERVAL_STEPS};
    use ocv_core::fen::Turn;
    use ocv_core::message::Message;
    use ocv_core::model::{BBox, ReachMode, Workflow};
    use ocv_rt::board::{MockBoard, NoopBoard};
    use ocv_rt::clipboard::{Clipboard, MemoryClipboard};
    use ocv_rt::engine::ScriptedEngine;
    use ocv_rt::persistence::{MemoryStudyStore, StudyStore};
    use ocv_rt::recognition::{RecognizedPosition, ScriptedRecognizer};

    const PLACEMENT: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR";

    struct SharedClipboard(std::rc::Rc<std::cell::RefCell<MemoryClipboard>>);

    impl Clipboard for SharedClipboard {
        fn set_text(&mut self, text: &str) -> Result<(), ocv_rt::clipboard::ClipboardError> {
            self.0.borrow_mut().set_text(text)
        }
    }

    struct SharedStore(std::rc::Rc<std::cell::RefCell<MemoryStudyStore>>);

    impl StudyStore for SharedStore {
        fn save(
            &mut self,
            doc: &ocv_storage::study::StudyDoc,
        ) -> Result<(), ocv_rt::persistence::StoreError> {
            self.0.borrow_mut().save(doc)
        }

        fn load(
            &mut self,
            pdf_hash: &str,
        ) -> Result<Option<ocv_storage::study::StudyDoc>, ocv_rt::persistence::StoreError> {
            self.0.borrow_mut().load(pdf_hash)
        }
    }

    fn recognizer_with_one_diagram() -> ScriptedRecognizer {
        let mut recognizer = ScriptedRecognizer::default();
        recognizer.push_detection(vec![BBox {
            x: 50.0,
            y: 80.0,
            width: 200.0,
            height: 200.0,
        }]);
        recognizer.push_recognition(Ok(RecognizedPosition {
            placement: PLACEMENT.to_string(),
            confidence: 0.94,
        }));
        recognizer
    }

    fn open_pdf(dispatcher: &mut Dispatcher) {
        dispatcher.dispatch(Message::PdfOpened {
            pdf_id: "hash-1".to_string(),
            content_hash: "hash-1".to_string(),
            filename: "book.pdf".to_string(),
            total_pages: 12,
        });
    }

    #[test]
    fn full_recognition_to_analysis_walkthrough() {
        let store = std::rc::Rc::new(std::cell::RefCell::new(MemoryStudyStore::default()));
        let clipboard = std::rc::Rc::new(std::cell::RefCell::new(MemoryClipboard::default()));
        let mut dispatcher = Dispatcher::new(
            Box::new(recognizer_with_one_diagram()),
            Box::new(SharedStore(store.clone())),
            Box::new(ScriptedEngine::default()),
            Box::new(NoopBoard),
            Box::new(SharedClipboard(clipboard.clone())),
        );

        open_pdf(&mut dispatcher);
        assert!(matches!(
            dispatcher.model().workflow,
            Workflow::Viewing { .. }
        ));
        // The detection completion landed during the same dispatch.
        assert_eq!(
            dispatcher.model().diagrams.as_ref().map(|d| d.boxes.len()),
            Some(1)
        );

        dispatcher.dispatch(Message::DiagramClicked { index: 0 });
        assert!(matches!(
            dispatcher.model().workflow,
            Workflow::PendingConfirm { .. }
        ));
        assert_eq!(dispatcher.model().games[0].id, "g1");

        dispatcher.dispatch(Message::PiecesConfirmed {
            placement: PLACEMENT.to_string(),
            turn: Turn::Black,
        });
        dispatcher.dispatch(Message::StartNewGame);
        let Workflow::Reaching { ref session } = dispatcher.model().workflow else {
            panic!("expected REACHING, got {:?}", dispatcher.model().workflow);
        };
        assert_eq!(session.mode, ReachMode::Manual);

        dispatcher.dispatch(Message::ReachMoveMade {
            san: "e4".to_string(),
            fen: format!("{PLACEMENT} b KQkq e3 0 1"),
        });
        // ReachDone emits CompleteReach, which the dispatcher echoes back
        // as the resolution message in the same pump.
        dispatcher.dispatch(Message::ReachDone);
        assert_eq!(
            dispatcher.model().workflow,
            Workflow::Analysis {
                game_id: "g1".to_string(),
                cursor: vec!["e4".to_string()],
            }
        );

        dispatcher.dispatch(Message::CopyPgn);
        let copied = clipboard.borrow().contents().unwrap().to_string();
        assert!(copied.contains("1. e4"), "unexpected PGN: {copied}");

        // The edit scheduled an autosave; advancing time flushes it once.
        dispatcher.run_steps(AUTOSAVE_DELAY_STEPS + 1);
        assert_eq!(store.borrow().save_count(), 1);
        assert!(!dispatcher.model().is_dirty);

        let saved = store.borrow_mut().load("hash-1").unwrap().unwrap();
        assert_eq!(saved.games.len(), 1);
        assert_eq!(saved.analyses.len(), 1);
    }

    #[test]
    fn autosave_bursts_coalesce_into_one_save() {
        let store = std::rc::Rc::new(std::cell::RefCell::new(MemoryStudyStore::default()));
        let mut dispatcher = Dispatcher::new(
            Box::new(recognizer_with_one_diagram()),
            Box::new(SharedStore(store.clone())),
            Box::new(ScriptedEngine::default()),
            Box::new(NoopBoard),
            Box::new(MemoryClipboard::default()),
        );

        open_pdf(&mut dispatcher);
        dispatcher.dispatch(Message::DiagramClicked { index: 0 });
        dispatcher.dispatch(Message::PiecesConfirmed {
            placement: PLACEMENT.to_string(),
            turn: Turn::White,
        });
        dispatcher.dispatch(Message::StartNewGame);
        dispatcher.dispatch(Message::ReachDone);

        // Several dirtying edits in quick succession, each rescheduling.
        for san in ["e5", "Nf3"] {
            dispatcher.tick();
            dispatcher.dispatch(Message::AnalysisMoveMade {
                san: san.to_string(),
                fen: format!("fen-{san}"),
            });
        }

        dispatcher.run_steps(AUTOSAVE_DELAY_STEPS + 1);
        assert_eq!(store.borrow().save_count(), 1);
    }

    #[test]
    fn board_poll_feeds_moves_into_an_otb_reach_session() {
        let mut board = MockBoard::default();
        board.push_report(PLACEMENT.to_string());

        let mut dispatcher = Dispatcher::new(
            Box::new(recognizer_with_one_diagram()),
            Box::new(MemoryStudyStore::default()),
            Box::new(ScriptedEngine::default()),
            Box::new(board),
            Box::new(MemoryClipboard::default()),
        );

        open_pdf(&mut dispatcher);
        // The status poll notices the connected board before the session
        // starts, so the reach begins in over-the-board mode.
        dispatcher.run_steps(super::STATUS_POLL_INTERVAL_STEPS + 1);
        assert!(dispatcher.model().board_status.connected);

        dispatcher.dispatch(Message::DiagramClicked { index: 0 });
        dispatcher.dispatch(Message::PiecesConfirmed {
            placement: PLACEMENT.to_string(),
            turn: Turn::Black,
        });
        dispatcher.dispatch(Message::StartNewGame);
        let Workflow::Reaching { ref session } = dispatcher.model().workflow else {
            panic!("expected REACHING");
        };
        assert_eq!(session.mode, ReachMode::Otb);

        dispatcher.run_steps(BOARD_POLL_INTERVAL_STEPS + 1);
        let Workflow::Reaching { ref session } = dispatcher.model().workflow else {
            panic!("expected REACHING");
        };
        assert_eq!(session.moves.len(), 1);
        assert_eq!(session.moves[0].san, "e4");
    }

    #[test]
    fn reopening_a_pdf_restores_the_saved_study() {
        let store = std::rc::Rc::new(std::cell::RefCell::new(MemoryStudyStore::default()));
        {
            let mut dispatcher = Dispatcher::new(
                Box::new(recognizer_with_one_diagram()),
                Box::new(SharedStore(store.clone())),
                Box::new(ScriptedEngine::default()),
                Box::new(NoopBoard),
                Box::new(MemoryClipboard::default()),
            );
            open_pdf(&mut dispatcher);
            dispatcher.dispatch(Message::DiagramClicked { index: 0 });
            dispatcher.dispatch(Message::PiecesConfirmed {
                placement: PLACEMENT.to_string(),
                turn: Turn::White,
            });
            dispatcher.dispatch(Message::StartNewGame);
            dispatcher.dispatch(Message::ReachDone);
            dispatcher.run_steps(AUTOSAVE_DELAY_STEPS + 1);
        }

        let mut dispatcher = Dispatcher::new(
            Box::new(ScriptedRecognizer::default()),
            Box::new(SharedStore(store)),
            Box::new(ScriptedEngine::default()),
            Box::new(NoopBoard),
            Box::new(MemoryClipboard::default()),
        );
        open_pdf(&mut dispatcher);

        assert_eq!(dispatcher.model().games.len(), 1);
        assert_eq!(dispatcher.model().games[0].id, "g1");
        assert!(dispatcher.model().analyses.contains_key("g1"));
        assert!(!dispatcher.model().is_dirty);
    }

    #[test]
    fn text_selection_extracts_the_current_page() {
        let mut recognizer = ScriptedRecognizer::default();
        recognizer.set_page_text(0, "12. Re1 wins the exchange");
        let mut dispatcher = Dispatcher::new(
            Box::new(recognizer),
            Box::new(MemoryStudyStore::default()),
            Box::new(ScriptedEngine::default()),
            Box::new(NoopBoard),
            Box::new(MemoryClipboard::default()),
        );

        open_pdf(&mut dispatcher);
        dispatcher.dispatch(Message::ToggleTextSelection);

        assert_eq!(
            dispatcher.model().ui.overlay_text.as_deref(),
            Some("12. Re1 wins the exchange")
        );

        dispatcher.dispatch(Message::ToggleTextSelection);
        assert_eq!(dispatcher.model().ui.overlay_text, None);
    }
}
