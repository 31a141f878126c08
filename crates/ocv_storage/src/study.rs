use serde_json::{json, Map, Value};
use thiserror::Error;

use ocv_core::model::{BBox, ContinuationLink, Game, GameId};
use ocv_core::tree::AnalysisTree;

pub const FORMAT_VERSION: u64 = 1;

/// One study file: everything persisted for a single PDF, keyed on disk by
/// the PDF's content hash so renamed copies share their annotations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudyDoc {
    pub pdf_hash: String,
    pub games: Vec<Game>,
    pub analyses: Vec<(GameId, AnalysisTree)>,
    pub continuations: Vec<(GameId, ContinuationLink)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StudyError {
    #[error("study document is not a JSON object")]
    NotAnObject,
    #[error("unsupported study format version {0}")]
    UnsupportedFormat(u64),
    #[error("malformed field '{0}'")]
    Malformed(&'static str),
}

impl StudyDoc {
    /// Serializes the document. Pending games are the caller's concern:
    /// filter before constructing, or use [`StudyDoc::from_model_parts`].
    pub fn to_json(&self) -> Value {
        let games: Vec<Value> = self.games.iter().map(game_to_json).collect();

        let mut analyses = Map::new();
        for (id, tree) in &self.analyses {
            analyses.insert(id.clone(), tree.to_json());
        }

        let mut continuations = Map::new();
        for (id, link) in &self.continuations {
            continuations.insert(
                id.clone(),
                json!({
                    "analysisId": link.analysis_id,
                    "nodePath": link.node_path,
                }),
            );
        }

        json!({
            "formatVersion": FORMAT_VERSION,
            "pdfHash": self.pdf_hash,
            "games": games,
            "analyses": analyses,
            "continuations": continuations,
        })
    }

    /// Collects the persistable slice of the in-memory state. Pending games
    /// never reach disk, and neither do trees or links owned by them.
    pub fn from_model_parts<'a>(
        pdf_hash: &str,
        games: impl IntoIterator<Item = &'a Game>,
        analyses: impl IntoIterator<Item = (&'a GameId, &'a AnalysisTree)>,
        continuations: impl IntoIterator<Item = (&'a GameId, &'a ContinuationLink)>,
    ) -> Self {
        let games: Vec<Game> = games
            .into_iter()
            .filter(|game| !game.pending)
            .cloned()
            .collect();
        let keep = |id: &GameId| games.iter().any(|game| &game.id == id);

        let mut analyses: Vec<(GameId, AnalysisTree)> = analyses
            .into_iter()
            .filter(|(id, _)| keep(id))
            .map(|(id, tree)| (id.clone(), tree.clone()))
            .collect();
        analyses.sort_by(|a, b| a.0.cmp(&b.0));

        let mut continuations: Vec<(GameId, ContinuationLink)> = continuations
            .into_iter()
            .filter(|(id, link)| keep(id) && keep(&link.analysis_id))
            .map(|(id, link)| (id.clone(), link.clone()))
            .collect();
        continuations.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            pdf_hash: pdf_hash.to_string(),
            games,
            analyses,
            continuations,
        }
    }

    /// Decodes a study file. Any structural problem (wrong root type,
    /// unknown format version, mistyped field) is an error. Exactly three
    /// fields decode leniently: a game's `confidence` defaults to 0,
    /// `pending` to false, and a continuation's bad `nodePath` to the
    /// empty path.
    pub fn from_json(value: &Value) -> Result<Self, StudyError> {
        let root = value.as_object().ok_or(StudyError::NotAnObject)?;

        let version = root
            .get("formatVersion")
            .and_then(Value::as_u64)
            .unwrap_or(FORMAT_VERSION);
        if version != FORMAT_VERSION {
            return Err(StudyError::UnsupportedFormat(version));
        }

        let pdf_hash = root
            .get("pdfHash")
            .and_then(Value::as_str)
            .ok_or(StudyError::Malformed("pdfHash"))?
            .to_string();

        let mut games = Vec::new();
        if let Some(raw) = root.get("games") {
            let items = raw.as_array().ok_or(StudyError::Malformed("games"))?;
            for item in items {
                games.push(game_from_json(item)?);
            }
        }

        let mut analyses = Vec::new();
        if let Some(raw) = root.get("analyses") {
            let entries = raw.as_object().ok_or(StudyError::Malformed("analyses"))?;
            for (id, tree) in entries {
                analyses.push((id.clone(), AnalysisTree::from_json(tree)));
            }
        }

        let mut continuations = Vec::new();
        if let Some(raw) = root.get("continuations") {
            let entries = raw
                .as_object()
                .ok_or(StudyError::Malformed("continuations"))?;
            for (id, link) in entries {
                continuations.push((id.clone(), link_from_json(link)?));
            }
        }

        Ok(Self {
            pdf_hash,
            games,
            analyses,
            continuations,
        })
    }
}

fn game_to_json(game: &Game) -> Value {
    json!({
        "id": game.id,
        "page": game.page,
        "bbox": {
            "x": game.bbox.x,
            "y": game.bbox.y,
            "width": game.bbox.width,
            "height": game.bbox.height,
        },
        "fen": game.fen,
        "confidence": game.confidence,
    })
}

fn game_from_json(value: &Value) -> Result<Game, StudyError> {
    let str_field = |key, tag| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(StudyError::Malformed(tag))
    };

    Ok(Game {
        id: str_field("id", "games.id")?,
        fen: str_field("fen", "games.fen")?,
        page: value
            .get("page")
            .and_then(Value::as_u64)
            .ok_or(StudyError::Malformed("games.page"))? as u32,
        bbox: bbox_from_json(
            value
                .get("bbox")
                .ok_or(StudyError::Malformed("games.bbox"))?,
        )?,
        confidence: value
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0) as f32,
        pending: false,
    })
}

fn bbox_from_json(value: &Value) -> Result<BBox, StudyError> {
    let field = |key| {
        value
            .get(key)
            .and_then(Value::as_f64)
            .ok_or(StudyError::Malformed("games.bbox"))
    };
    Ok(BBox {
        x: field("x")?,
        y: field("y")?,
        width: field("width")?,
        height: field("height")?,
    })
}

fn link_from_json(value: &Value) -> Result<ContinuationLink, StudyError> {
    let analysis_id = value
        .get("analysisId")
        .and_then(Value::as_str)
        .ok_or(StudyError::Malformed("continuations.analysisId"))?
        .to_string();
    let node_path = value
        .get("nodePath")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ContinuationLink {
        analysis_id,
        node_path,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    use super::{StudyDoc, StudyError, FORMAT_VERSION};
    use ocv_core::fen::{Turn, STARTING_FEN};
    use ocv_core::model::{BBox, ContinuationLink, Game};
    use ocv_core::tree::AnalysisTree;

    fn game(id: &str, pending: bool) -> Game {
        Game {
            id: id.to_string(),
            page: 3,
            bbox: BBox {
                x: 10.0,
                y: 20.0,
                width: 120.0,
                height: 120.0,
            },
            fen: "4k3/8/8/8/8/8/8/4K3".to_string(),
            confidence: 0.87,
            pending,
        }
    }

    fn sample_doc() -> StudyDoc {
        let tree = AnalysisTree::create(STARTING_FEN, Turn::White);
        let (tree, c) = tree.make_move(&[], "e4", "fen-e4").unwrap();
        let (tree, _) = tree.make_move(&c, "e5", "fen-e5").unwrap();

        StudyDoc {
            pdf_hash: "abc123".to_string(),
            games: vec![game("g1", false), game("g2", false)],
            analyses: vec![("g1".to_string(), tree)],
            continuations: vec![(
                "g2".to_string(),
                ContinuationLink {
                    analysis_id: "g1".to_string(),
                    node_path: vec!["e4".to_string(), "e5".to_string()],
                },
            )],
        }
    }

    #[test]
    fn round_trip_preserves_the_document() {
        let doc = sample_doc();
        let restored = StudyDoc::from_json(&doc.to_json()).unwrap();
        assert_eq!(restored, doc);
    }

    #[test]
    fn from_model_parts_drops_pending_games_and_their_data() {
        let games = vec![game("g1", false), game("g2", true)];
        let tree = AnalysisTree::create(STARTING_FEN, Turn::White);
        let mut analyses = HashMap::new();
        analyses.insert("g1".to_string(), tree.clone());
        analyses.insert("g2".to_string(), tree);
        let mut continuations = HashMap::new();
        continuations.insert(
            "g2".to_string(),
            ContinuationLink {
                analysis_id: "g1".to_string(),
                node_path: Vec::new(),
            },
        );

        let doc = StudyDoc::from_model_parts(
            "hash",
            &games,
            analyses.iter(),
            continuations.iter(),
        );

        assert_eq!(doc.games.len(), 1);
        assert_eq!(doc.games[0].id, "g1");
        assert_eq!(doc.analyses.len(), 1);
        assert!(doc.continuations.is_empty());
    }

    #[test]
    fn loaded_games_default_confidence_and_pending_only() {
        let doc = StudyDoc::from_json(&serde_json::json!({
            "formatVersion": FORMAT_VERSION,
            "pdfHash": "h",
            "games": [{
                "id": "g1",
                "fen": "4k3/8/8/8/8/8/8/4K3",
                "page": 2,
                "bbox": { "x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0 },
            }],
        }))
        .unwrap();

        let game = &doc.games[0];
        assert_eq!(game.page, 2);
        assert_eq!(game.confidence, 0.0);
        assert!(!game.pending);
    }

    #[test]
    fn games_missing_required_fields_fail_to_decode() {
        let entry = serde_json::json!({
            "id": "g1",
            "fen": "4k3/8/8/8/8/8/8/4K3",
            "page": 2,
            "bbox": { "x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0 },
        });
        for (key, tag) in [
            ("id", "games.id"),
            ("fen", "games.fen"),
            ("page", "games.page"),
            ("bbox", "games.bbox"),
        ] {
            let mut broken = entry.clone();
            broken.as_object_mut().unwrap().remove(key);
            let error = StudyDoc::from_json(&serde_json::json!({
                "pdfHash": "h",
                "games": [broken],
            }))
            .unwrap_err();
            assert_eq!(error, StudyError::Malformed(tag));
        }
    }

    #[test]
    fn version_field_is_optional_but_checked() {
        let doc =
            StudyDoc::from_json(&serde_json::json!({ "pdfHash": "h", "games": [] })).unwrap();
        assert!(doc.games.is_empty());

        let error = StudyDoc::from_json(&serde_json::json!({ "formatVersion": 99 })).unwrap_err();
        assert_eq!(error, StudyError::UnsupportedFormat(99));
    }

    #[test]
    fn structural_problems_are_errors() {
        assert_eq!(
            StudyDoc::from_json(&serde_json::json!([])),
            Err(StudyError::NotAnObject)
        );
        assert_eq!(
            StudyDoc::from_json(&serde_json::json!({})),
            Err(StudyError::Malformed("pdfHash"))
        );
        assert_eq!(
            StudyDoc::from_json(&serde_json::json!({ "pdfHash": "h", "games": {} })),
            Err(StudyError::Malformed("games"))
        );
        assert_eq!(
            StudyDoc::from_json(&serde_json::json!({ "pdfHash": "h", "continuations": [] })),
            Err(StudyError::Malformed("continuations"))
        );
    }

    #[test]
    fn continuation_without_analysis_id_fails_to_decode() {
        let error = StudyDoc::from_json(&serde_json::json!({
            "pdfHash": "h",
            "continuations": {
                "g2": { "nodePath": ["e4"] },
            },
        }))
        .unwrap_err();
        assert_eq!(error, StudyError::Malformed("continuations.analysisId"));
    }

    #[test]
    fn continuation_node_path_is_lenient() {
        let doc = StudyDoc::from_json(&serde_json::json!({
            "pdfHash": "h",
            "continuations": {
                "g2": { "analysisId": "g1", "nodePath": "not a list" },
            },
        }))
        .unwrap();
        assert_eq!(doc.continuations[0].1.analysis_id, "g1");
        assert!(doc.continuations[0].1.node_path.is_empty());
    }
}
