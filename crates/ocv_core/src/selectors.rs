use crate::model::{Game, GameId, Model, Workflow};
use crate::tree::{AnalysisTree, NodePath};

/// Resolved view into the tree a game is studied in: either its own
/// analysis or the one reached through a continuation link.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisContext<'a> {
    pub analysis_id: &'a GameId,
    pub tree: &'a AnalysisTree,
    pub cursor: NodePath,
}

pub fn active_game_id(workflow: &Workflow) -> Option<&GameId> {
    match workflow {
        Workflow::NoPdf => None,
        Workflow::Viewing { active_game_id } => active_game_id.as_ref(),
        Workflow::PendingConfirm { pending } => Some(&pending.game_id),
        Workflow::MatchExisting { pending, .. } => Some(&pending.game_id),
        Workflow::Reaching { session } => Some(&session.game_id),
        Workflow::Analysis { game_id, .. } => Some(game_id),
    }
}

pub fn active_game(model: &Model) -> Option<&Game> {
    let id = active_game_id(&model.workflow)?;
    model.game(id)
}

/// Looks up the analysis a game belongs to. For a game with its own tree
/// the cursor is the globally cached `current_node`. For a continuation,
/// the link's stored path is used unless the workflow is ANALYSIS for this
/// very game; browsing one game must not perturb another game's saved
/// continuation cursor.
pub fn analysis_context<'a>(model: &'a Model, game_id: &str) -> Option<AnalysisContext<'a>> {
    if let Some((id, tree)) = model.analyses.get_key_value(game_id) {
        return Some(AnalysisContext {
            analysis_id: id,
            tree,
            cursor: model.current_node.clone(),
        });
    }

    let link = model.continuations.get(game_id)?;
    let (id, tree) = model.analyses.get_key_value(&link.analysis_id)?;

    let viewing_this_game = matches!(
        &model.workflow,
        Workflow::Analysis { game_id: active, .. } if active == game_id
    );
    let cursor = if viewing_this_game {
        model.current_node.clone()
    } else {
        link.node_path.clone()
    };

    Some(AnalysisContext {
        analysis_id: id,
        tree,
        cursor,
    })
}
