use crate::fen::Turn;
use crate::model::{BBox, GameId};
use crate::tree::NodePath;

/// Where a collaborator failure originated; folded into the status line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorScope {
    Recognition,
    Detection,
    Persistence,
    Board,
    Engine,
    Render,
}

impl ErrorScope {
    pub fn label(self) -> &'static str {
        match self {
            ErrorScope::Recognition => "recognition",
            ErrorScope::Detection => "detection",
            ErrorScope::Persistence => "persistence",
            ErrorScope::Board => "board",
            ErrorScope::Engine => "engine",
            ErrorScope::Render => "render",
        }
    }
}

/// Every event the core reacts to, from user, network or sensor origin.
/// One enum keeps the reducer exhaustive: adding an event without handling
/// it is a compile error.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    // PDF lifecycle
    PdfOpened {
        pdf_id: String,
        content_hash: String,
        filename: String,
        total_pages: u32,
    },
    PdfClosed,
    PageChanged {
        page: u32,
    },
    ScaleChanged {
        scale: f64,
    },
    PageRendered {
        page: u32,
        actual_scale: f64,
    },

    // Detection / recognition
    DiagramsDetected {
        page: u32,
        boxes: Vec<BBox>,
    },
    DiagramClicked {
        index: usize,
    },
    Recognized {
        game_id: GameId,
        placement: String,
        confidence: f32,
    },
    RecognitionFailed {
        reason: String,
    },

    // Confirmation / matching
    PiecesConfirmed {
        placement: String,
        turn: Turn,
    },
    ConfirmCancelled,
    CandidateSelected {
        game_id: GameId,
    },
    ContinueSelectedGame,
    StartNewGame,

    // Reach session
    ReachMoveMade {
        san: String,
        fen: String,
    },
    BoardFenUpdated {
        fen: String,
    },
    ReachUndo,
    ReachReset,
    ReachDone,
    ReachTargetResolved {
        moves: Vec<String>,
        final_fen: String,
    },
    ReachCancel,

    // Analysis
    AnalysisStarted {
        game_id: GameId,
        turn: Turn,
    },
    AnalysisMoveMade {
        san: String,
        fen: String,
    },
    GoBack,
    GoForward,
    NextVariation,
    PrevVariation,
    DeleteVariation,
    GoTo {
        path: NodePath,
    },

    // Game management
    DeleteGame {
        game_id: GameId,
    },

    // Engine
    ToggleEngine,
    EngineStateChanged {
        running: bool,
    },
    EngineReport {
        eval_text: String,
        pv: String,
    },

    // Physical board
    BoardStatusChanged {
        available: bool,
        connected: bool,
    },

    // Persistence
    AutosaveDue,
    SaveCompleted,
    SaveFailed {
        reason: String,
    },
    StudyLoaded {
        games: Vec<crate::model::Game>,
        analyses: Vec<(GameId, crate::tree::AnalysisTree)>,
        continuations: Vec<(GameId, crate::model::ContinuationLink)>,
    },
    LoadFailed {
        reason: String,
    },

    // Clipboard / UI
    CopyPgn,
    ToggleTextSelection,
    TextExtracted {
        pdf_text: String,
        ocr_text: String,
    },

    Error {
        scope: ErrorScope,
        text: String,
    },
}

/// Declarative side effects. The driving loop executes each command
/// asynchronously and feeds the outcome back as exactly one Message.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    RenderPage {
        page: u32,
        scale: f64,
    },
    DetectDiagrams {
        page: u32,
    },
    RecognizeDiagram {
        page: u32,
        bbox: BBox,
        index: usize,
    },
    ExtractText {
        page: u32,
    },
    /// Debounced: the driving loop coalesces bursts into one save.
    ScheduleSave,
    SaveStudy,
    LoadStudy,
    SetBoardFen {
        fen: String,
        force: bool,
    },
    StartStatusPoll,
    StartBoardPoll,
    StopBoardPoll,
    EngineStart,
    EngineStop,
    EngineAnalyze {
        fen: String,
        depth: u32,
    },
    /// Completion of a reach session; echoed back as ReachTargetResolved.
    CompleteReach {
        moves: Vec<String>,
        final_fen: String,
    },
    CopyToClipboard {
        text: String,
    },
}
