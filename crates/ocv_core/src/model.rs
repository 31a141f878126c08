use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::fen::{placement_key, Turn};
use crate::tree::{AnalysisTree, NodePath};

pub type GameId = String;

pub const ENGINE_DEPTH: u32 = 20;

/// Axis-aligned box in PDF-native coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PdfInfo {
    pub id: String,
    pub content_hash: String,
    pub filename: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PdfState {
    pub info: Option<PdfInfo>,
    pub current_page: u32,
    pub total_pages: u32,
    pub scale: f64,
    pub initial_scale_set: bool,
}

/// Detected diagram boxes for exactly one page.
#[derive(Clone, Debug, PartialEq)]
pub struct PageDiagrams {
    pub page: u32,
    pub boxes: Vec<BBox>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Game {
    pub id: GameId,
    pub page: u32,
    pub bbox: BBox,
    /// Piece placement only, never a full FEN.
    pub fen: String,
    pub confidence: f32,
    /// Recognized but not yet confirmed/linked. Pending games are excluded
    /// from the placement index and from persistence.
    pub pending: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContinuationLink {
    pub analysis_id: GameId,
    pub node_path: NodePath,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineState {
    pub running: bool,
    pub eval_text: String,
    pub pv: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoardStatus {
    pub available: bool,
    pub connected: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UiState {
    pub status_message: String,
    pub text_selection: bool,
    pub overlay_text: Option<String>,
    pub opening_input_visible: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReachMode {
    Manual,
    Otb,
}

/// Captured recognition awaiting piece confirmation.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingRecognition {
    pub game_id: GameId,
    pub target_fen: String,
    pub page: u32,
    pub bbox: BBox,
    pub confidence: f32,
    pub turn: Turn,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedMove {
    pub san: String,
    pub fen: String,
}

/// Move-entry session walking from a start position toward a confirmed
/// target diagram.
#[derive(Clone, Debug, PartialEq)]
pub struct ReachSession {
    pub target_fen: String,
    pub start_fen: String,
    pub current_fen: String,
    pub base_analysis_id: Option<GameId>,
    pub game_id: GameId,
    pub moves: Vec<RecordedMove>,
    pub mode: ReachMode,
    pub turn: Turn,
}

/// The operator's current pipeline stage. Exactly one variant is active;
/// messages arriving under a non-matching variant are ignored.
#[derive(Clone, Debug, PartialEq)]
pub enum Workflow {
    NoPdf,
    Viewing {
        active_game_id: Option<GameId>,
    },
    PendingConfirm {
        pending: PendingRecognition,
    },
    MatchExisting {
        pending: PendingRecognition,
        candidates: Vec<GameId>,
        selected: Option<GameId>,
    },
    Reaching {
        session: ReachSession,
    },
    Analysis {
        game_id: GameId,
        cursor: NodePath,
    },
}

impl Workflow {
    pub fn tag(&self) -> &'static str {
        match self {
            Workflow::NoPdf => "NO_PDF",
            Workflow::Viewing { .. } => "VIEWING",
            Workflow::PendingConfirm { .. } => "PENDING_CONFIRM",
            Workflow::MatchExisting { .. } => "MATCH_EXISTING",
            Workflow::Reaching { .. } => "REACHING",
            Workflow::Analysis { .. } => "ANALYSIS",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    pub pdf: PdfState,
    pub diagrams: Option<PageDiagrams>,
    pub games: Vec<Game>,
    pub analyses: HashMap<GameId, AnalysisTree>,
    pub continuations: HashMap<GameId, ContinuationLink>,
    pub workflow: Workflow,
    /// Redundant cache of the workflow cursor, kept for global lookups.
    pub current_node: NodePath,
    pub engine: EngineState,
    pub board_status: BoardStatus,
    pub recognition_in_progress: Option<usize>,
    pub is_dirty: bool,
    pub ui: UiState,
    /// Derived index: canonical placement key -> confirmed game id.
    /// Rebuilt wholesale whenever `games` changes.
    pub placement_key_index: HashMap<String, GameId>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Self {
            pdf: PdfState::default(),
            diagrams: None,
            games: Vec::new(),
            analyses: HashMap::new(),
            continuations: HashMap::new(),
            workflow: Workflow::NoPdf,
            current_node: Vec::new(),
            engine: EngineState::default(),
            board_status: BoardStatus::default(),
            recognition_in_progress: None,
            is_dirty: false,
            ui: UiState::default(),
            placement_key_index: HashMap::new(),
        }
    }

    pub fn game(&self, id: &str) -> Option<&Game> {
        self.games.iter().find(|game| game.id == id)
    }

    pub fn game_mut(&mut self, id: &str) -> Option<&mut Game> {
        self.games.iter_mut().find(|game| game.id == id)
    }

    /// Full rebuild on every games change; game lists stay small enough
    /// that incremental maintenance is not worth the bookkeeping.
    pub fn rebuild_placement_index(&mut self) {
        self.placement_key_index = self
            .games
            .iter()
            .filter(|game| !game.pending)
            .map(|game| (placement_key(&game.fen), game.id.clone()))
            .collect();
    }

    pub fn confirmed_game_by_placement(&self, fen: &str) -> Option<&Game> {
        let id = self.placement_key_index.get(&placement_key(fen))?;
        self.game(id)
    }

    pub fn with_status(mut self, message: impl Into<String>) -> Self {
        self.ui.status_message = message.into();
        self
    }
}
