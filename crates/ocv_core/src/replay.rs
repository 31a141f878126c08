use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};
use thiserror::Error;

use crate::fen::placement_of;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("invalid FEN '{0}'")]
    BadFen(String),
    #[error("invalid SAN '{0}'")]
    BadSan(String),
    #[error("illegal move '{san}' in position '{fen}'")]
    IllegalMove { san: String, fen: String },
}

fn parse_position(fen: &str) -> Result<Chess, ReplayError> {
    Fen::from_ascii(fen.as_bytes())
        .map_err(|_| ReplayError::BadFen(fen.to_string()))?
        .into_position(CastlingMode::Standard)
        .map_err(|_| ReplayError::BadFen(fen.to_string()))
}

fn emit_fen(position: Chess) -> String {
    Fen::from_position(position, EnPassantMode::Legal).to_string()
}

/// Plays one SAN move on a full FEN. Returns the canonical SAN (as the
/// rules engine renders it) and the resulting full FEN.
pub fn apply_san(fen: &str, san: &str) -> Result<(String, String), ReplayError> {
    let position = parse_position(fen)?;

    let parsed: SanPlus = san
        .parse()
        .map_err(|_| ReplayError::BadSan(san.to_string()))?;
    let chess_move = parsed
        .san
        .to_move(&position)
        .map_err(|_| ReplayError::IllegalMove {
            san: san.to_string(),
            fen: fen.to_string(),
        })?;

    let canonical = SanPlus::from_move(position.clone(), &chess_move).to_string();
    let next = position
        .play(&chess_move)
        .map_err(|_| ReplayError::IllegalMove {
            san: san.to_string(),
            fen: fen.to_string(),
        })?;

    Ok((canonical, emit_fen(next)))
}

/// Replays a SAN line from a start position, returning (san, fen) per move.
/// Fails atomically: either the whole line replays or an error is returned.
pub fn replay_line<S: AsRef<str>>(
    start_fen: &str,
    sans: &[S],
) -> Result<Vec<(String, String)>, ReplayError> {
    let mut fen = start_fen.to_string();
    let mut out = Vec::with_capacity(sans.len());

    for san in sans {
        let (canonical, next_fen) = apply_san(&fen, san.as_ref())?;
        out.push((canonical.clone(), next_fen.clone()));
        fen = next_fen;
    }

    Ok(out)
}

/// Matches a sensor-board placement report against the legal moves of the
/// current position. Returns the SAN and resulting full FEN of the unique
/// legal move that produces the observed placement, or None (a partial or
/// noisy report never aborts the reach session).
pub fn infer_move(fen: &str, observed_placement: &str) -> Option<(String, String)> {
    let position = parse_position(fen).ok()?;
    let target = placement_of(observed_placement);

    for chess_move in position.legal_moves() {
        let Ok(next) = position.clone().play(&chess_move) else {
            continue;
        };
        let next_fen = emit_fen(next);
        if placement_of(&next_fen) == target {
            let san = SanPlus::from_move(position.clone(), &chess_move).to_string();
            return Some((san, next_fen));
        }
    }

    None
}
