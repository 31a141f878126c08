use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const VALID_PIECES: &str = "KQRBNPkqrbnp";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Turn {
    #[default]
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

impl Turn {
    pub fn as_fen(self) -> &'static str {
        match self {
            Turn::White => "w",
            Turn::Black => "b",
        }
    }

    pub fn opposite(self) -> Turn {
        match self {
            Turn::White => Turn::Black,
            Turn::Black => Turn::White,
        }
    }

    pub fn from_fen_field(field: &str) -> Option<Turn> {
        match field {
            "w" => Some(Turn::White),
            "b" => Some(Turn::Black),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("placement must have 8 ranks, got {0}")]
    RankCount(usize),
    #[error("rank {rank} has {files} squares, expected 8")]
    FileCount { rank: u8, files: u32 },
    #[error("invalid character '{0}' in placement")]
    InvalidChar(char),
    #[error("must have exactly 1 {0} king, got {1}")]
    KingCount(&'static str, u32),
    #[error("too many '{piece}' pieces: {count} > {max}")]
    TooManyPieces { piece: char, count: u32, max: u32 },
    #[error("pawns cannot be on the 1st or 8th rank")]
    PawnOnBackRank,
}

/// Extracts the piece-placement field from a FEN string.
pub fn placement_of(fen: &str) -> &str {
    fen.split_whitespace().next().unwrap_or("")
}

/// Builds a full FEN from a bare placement, defaulting the remaining fields.
/// Castling rights and en passant are unknown for book diagrams, so both
/// collapse to "-".
pub fn with_game_state(placement: &str, turn: Turn) -> String {
    format!("{} {} - - 0 1", placement_of(placement), turn.as_fen())
}

/// Side to move encoded in a full FEN, or White when the field is missing.
pub fn turn_of(fen: &str) -> Turn {
    fen.split_whitespace()
        .nth(1)
        .and_then(Turn::from_fen_field)
        .unwrap_or(Turn::White)
}

/// Fullmove number encoded in a full FEN, or 1 when missing.
pub fn fullmove_of(fen: &str) -> u32 {
    fen.split_whitespace()
        .nth(5)
        .and_then(|field| field.parse().ok())
        .unwrap_or(1)
}

/// Canonical key used for duplicate-position lookup. Placement only: the
/// same diagram recognized twice must collide regardless of side to move.
pub fn placement_key(fen: &str) -> String {
    placement_of(fen).to_string()
}

pub fn positions_equal(a: &str, b: &str) -> bool {
    placement_of(a) == placement_of(b)
}

fn max_count(piece: char) -> u32 {
    match piece {
        'K' | 'k' => 1,
        'P' | 'p' => 8,
        'Q' | 'q' => 9,
        _ => 10,
    }
}

/// Structural validation of a piece-placement field: rank/file geometry,
/// piece alphabet, king counts, promotion-aware piece maximums, and the
/// pawn back-rank rule.
pub fn validate_placement(placement: &str) -> Result<(), PlacementError> {
    let ranks: Vec<&str> = placement_of(placement).split('/').collect();
    if ranks.len() != 8 {
        return Err(PlacementError::RankCount(ranks.len()));
    }

    let mut counts: [u32; 128] = [0; 128];

    for (rank_idx, rank) in ranks.iter().enumerate() {
        let mut files = 0u32;
        for ch in rank.chars() {
            if let Some(digit) = ch.to_digit(10) {
                files += digit;
            } else if VALID_PIECES.contains(ch) {
                files += 1;
                counts[ch as usize] += 1;
                if (ch == 'P' || ch == 'p') && (rank_idx == 0 || rank_idx == 7) {
                    return Err(PlacementError::PawnOnBackRank);
                }
            } else {
                return Err(PlacementError::InvalidChar(ch));
            }
        }
        if files != 8 {
            return Err(PlacementError::FileCount {
                rank: 8 - rank_idx as u8,
                files,
            });
        }
    }

    if counts['K' as usize] != 1 {
        return Err(PlacementError::KingCount("white", counts['K' as usize]));
    }
    if counts['k' as usize] != 1 {
        return Err(PlacementError::KingCount("black", counts['k' as usize]));
    }

    for piece in VALID_PIECES.chars() {
        let count = counts[piece as usize];
        let max = max_count(piece);
        if count > max {
            return Err(PlacementError::TooManyPieces { piece, count, max });
        }
    }

    Ok(())
}
