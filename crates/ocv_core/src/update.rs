use tracing::{debug, info};

use crate::fen::{turn_of, validate_placement, with_game_state, STARTING_FEN};
use crate::message::{Command, ErrorScope, Message};
use crate::model::{
    BBox, ContinuationLink, Game, GameId, Model, PageDiagrams, PendingRecognition, ReachMode,
    ReachSession, RecordedMove, Workflow, ENGINE_DEPTH,
};
use crate::replay::{infer_move, replay_line};
use crate::selectors::{active_game_id, analysis_context};
use crate::tree::{AnalysisTree, NodePath};

/// The transition function. Pure: consumes the model, returns the next one
/// plus the side effects the driving loop must execute. A message arriving
/// under a workflow tag that cannot handle it returns the model unchanged
/// with no commands.
pub fn update(model: Model, message: Message) -> (Model, Vec<Command>) {
    let prior_tag = model.workflow.tag();
    debug!(message = ?message, workflow = prior_tag, "dispatch");

    let (next, commands) = apply(model, message);

    let next_tag = next.workflow.tag();
    if next_tag != prior_tag {
        info!(from = prior_tag, to = next_tag, "workflow transition");
    }
    (next, commands)
}

fn apply(mut model: Model, message: Message) -> (Model, Vec<Command>) {
    match message {
        Message::PdfOpened {
            pdf_id,
            content_hash,
            filename,
            total_pages,
        } => {
            // Full reset: only the new PDF identity survives.
            let mut next = Model::new();
            next.pdf.info = Some(crate::model::PdfInfo {
                id: pdf_id,
                content_hash,
                filename,
            });
            next.pdf.total_pages = total_pages;
            next.pdf.scale = 1.0;
            next.workflow = Workflow::Viewing {
                active_game_id: None,
            };
            let commands = vec![
                Command::RenderPage {
                    page: 0,
                    scale: 1.0,
                },
                Command::DetectDiagrams { page: 0 },
                Command::LoadStudy,
                Command::StartStatusPoll,
            ];
            (next, commands)
        }

        Message::PdfClosed => {
            let mut commands = vec![Command::StopBoardPoll];
            if model.engine.running {
                commands.push(Command::EngineStop);
            }
            (Model::new(), commands)
        }

        Message::PageChanged { page } => {
            if model.pdf.info.is_none() || page >= model.pdf.total_pages {
                return (model, Vec::new());
            }
            model.pdf.current_page = page;
            model.diagrams = None;
            let scale = model.pdf.scale;
            (
                model,
                vec![
                    Command::RenderPage { page, scale },
                    Command::DetectDiagrams { page },
                ],
            )
        }

        Message::ScaleChanged { scale } => {
            if model.pdf.info.is_none() {
                return (model, Vec::new());
            }
            model.pdf.scale = scale;
            let page = model.pdf.current_page;
            (model, vec![Command::RenderPage { page, scale }])
        }

        Message::PageRendered { page, actual_scale } => {
            // A completion for a page we already left is stale.
            if page != model.pdf.current_page {
                return (model, Vec::new());
            }
            if !model.pdf.initial_scale_set {
                model.pdf.scale = actual_scale;
                model.pdf.initial_scale_set = true;
            }
            (model, Vec::new())
        }

        Message::DiagramsDetected { page, boxes } => {
            if page != model.pdf.current_page {
                return (model, Vec::new());
            }
            model.diagrams = Some(PageDiagrams { page, boxes });
            (model, Vec::new())
        }

        Message::DiagramClicked { index } => {
            let clickable = matches!(
                model.workflow,
                Workflow::Viewing { .. } | Workflow::PendingConfirm { .. }
            );
            if !clickable || model.recognition_in_progress.is_some() {
                return (model, Vec::new());
            }
            let Some(bbox) = diagram_bbox(&model, index) else {
                return (model, Vec::new());
            };
            model.recognition_in_progress = Some(index);
            let page = model.pdf.current_page;
            (
                model.with_status("Recognizing position..."),
                vec![Command::RecognizeDiagram { page, bbox, index }],
            )
        }

        Message::Recognized {
            game_id,
            placement,
            confidence,
        } => {
            let Some(index) = model.recognition_in_progress.take() else {
                return (model, Vec::new());
            };
            if !matches!(
                model.workflow,
                Workflow::Viewing { .. } | Workflow::PendingConfirm { .. }
            ) {
                return (model, Vec::new());
            }

            // A fresh recognition supersedes a confirmation still open;
            // its provisional game must not outlive it.
            if let Workflow::PendingConfirm { pending } = &model.workflow {
                let superseded = pending.game_id.clone();
                model.games.retain(|game| game.id != superseded);
            }

            if let Some(existing) = model.confirmed_game_by_placement(&placement) {
                let existing_id = existing.id.clone();
                let fen = with_game_state(&existing.fen, crate::fen::Turn::White);
                model.workflow = Workflow::Viewing {
                    active_game_id: Some(existing_id),
                };
                let mut commands = Vec::new();
                if model.board_status.connected {
                    commands.push(Command::SetBoardFen { fen, force: false });
                }
                return (model.with_status("Position already in study"), commands);
            }

            let page = model.pdf.current_page;
            let bbox = diagram_bbox(&model, index).unwrap_or_default();
            model.games.push(Game {
                id: game_id.clone(),
                page,
                bbox,
                fen: placement.clone(),
                confidence,
                pending: true,
            });
            model.rebuild_placement_index();
            model.workflow = Workflow::PendingConfirm {
                pending: PendingRecognition {
                    game_id,
                    target_fen: placement,
                    page,
                    bbox,
                    confidence,
                    turn: crate::fen::Turn::White,
                },
            };
            (model.with_status("Confirm the recognized pieces"), Vec::new())
        }

        Message::RecognitionFailed { reason } => {
            model.recognition_in_progress = None;
            let status = format!("Recognition failed: {reason}");
            (model.with_status(status), Vec::new())
        }

        Message::PiecesConfirmed { placement, turn } => {
            let Workflow::PendingConfirm { pending } = model.workflow.clone() else {
                return (model, Vec::new());
            };

            if let Err(error) = validate_placement(&placement) {
                let status = format!("Invalid position: {error}");
                return (model.with_status(status), Vec::new());
            }

            // Editing pieces may land on a position we already study;
            // activate it instead of creating a duplicate.
            if let Some(existing) = model.confirmed_game_by_placement(&placement) {
                let existing_id = existing.id.clone();
                model.games.retain(|game| game.id != pending.game_id);
                model.rebuild_placement_index();
                model.workflow = Workflow::Viewing {
                    active_game_id: Some(existing_id),
                };
                return (model.with_status("Position already in study"), Vec::new());
            }

            if let Some(game) = model.game_mut(&pending.game_id) {
                game.fen = crate::fen::placement_key(&placement);
            }
            let candidates: Vec<GameId> = model
                .games
                .iter()
                .filter(|game| !game.pending && model.analyses.contains_key(&game.id))
                .map(|game| game.id.clone())
                .collect();
            model.workflow = Workflow::MatchExisting {
                pending: PendingRecognition {
                    target_fen: crate::fen::placement_key(&placement),
                    turn,
                    ..pending
                },
                candidates,
                selected: None,
            };
            (model, Vec::new())
        }

        Message::ConfirmCancelled => {
            let Workflow::PendingConfirm { pending } = model.workflow.clone() else {
                return (model, Vec::new());
            };
            model.games.retain(|game| game.id != pending.game_id);
            model.rebuild_placement_index();
            model.workflow = Workflow::Viewing {
                active_game_id: None,
            };
            (model, Vec::new())
        }

        Message::CandidateSelected { game_id } => {
            let Workflow::MatchExisting {
                pending,
                candidates,
                ..
            } = model.workflow.clone()
            else {
                return (model, Vec::new());
            };
            if !candidates.contains(&game_id) {
                return (model, Vec::new());
            }
            model.workflow = Workflow::MatchExisting {
                pending,
                candidates,
                selected: Some(game_id),
            };
            (model, Vec::new())
        }

        Message::ContinueSelectedGame => {
            let Workflow::MatchExisting {
                pending,
                selected: Some(base_id),
                ..
            } = model.workflow.clone()
            else {
                return (model, Vec::new());
            };
            let Some(base_tree) = model.analyses.get(&base_id) else {
                return (model, Vec::new());
            };
            let (leaf, _) = base_tree.main_line_leaf();
            let start_fen = leaf.fen.clone();
            begin_reach(model, pending, start_fen, Some(base_id))
        }

        Message::StartNewGame => {
            let Workflow::MatchExisting { pending, .. } = model.workflow.clone() else {
                return (model, Vec::new());
            };
            begin_reach(model, pending, STARTING_FEN.to_string(), None)
        }

        Message::ReachMoveMade { san, fen } => {
            let Workflow::Reaching { mut session } = model.workflow.clone() else {
                return (model, Vec::new());
            };
            session.moves.push(RecordedMove {
                san,
                fen: fen.clone(),
            });
            session.current_fen = fen.clone();
            model.workflow = Workflow::Reaching { session };
            let mut commands = Vec::new();
            if model.board_status.connected {
                commands.push(Command::SetBoardFen { fen, force: false });
            }
            (model, commands)
        }

        Message::BoardFenUpdated { fen } => {
            let Workflow::Reaching { mut session } = model.workflow.clone() else {
                return (model, Vec::new());
            };
            if session.mode != ReachMode::Otb {
                return (model, Vec::new());
            }
            if crate::fen::positions_equal(&session.current_fen, &fen) {
                return (model, Vec::new());
            }
            // A report that no single legal move explains is sensor noise.
            let Some((san, new_fen)) = infer_move(&session.current_fen, &fen) else {
                return (model, Vec::new());
            };
            session.moves.push(RecordedMove {
                san,
                fen: new_fen.clone(),
            });
            session.current_fen = new_fen;
            model.workflow = Workflow::Reaching { session };
            (model, Vec::new())
        }

        Message::ReachUndo => {
            let Workflow::Reaching { mut session } = model.workflow.clone() else {
                return (model, Vec::new());
            };
            if session.moves.is_empty() {
                return (model, Vec::new());
            }
            let sans: Vec<String> = session.moves[..session.moves.len() - 1]
                .iter()
                .map(|m| m.san.clone())
                .collect();
            // Replay from scratch; if that fails the undo is abandoned.
            let Ok(line) = replay_line(&session.start_fen, &sans) else {
                return (model, Vec::new());
            };
            session.current_fen = line
                .last()
                .map(|(_, fen)| fen.clone())
                .unwrap_or_else(|| session.start_fen.clone());
            session.moves = line
                .into_iter()
                .map(|(san, fen)| RecordedMove { san, fen })
                .collect();
            let current = session.current_fen.clone();
            model.workflow = Workflow::Reaching { session };
            let mut commands = Vec::new();
            if model.board_status.connected {
                commands.push(Command::SetBoardFen {
                    fen: current,
                    force: true,
                });
            }
            (model, commands)
        }

        Message::ReachReset => {
            let Workflow::Reaching { mut session } = model.workflow.clone() else {
                return (model, Vec::new());
            };
            session.moves.clear();
            session.current_fen = session.start_fen.clone();
            let start = session.start_fen.clone();
            model.workflow = Workflow::Reaching { session };
            let mut commands = Vec::new();
            if model.board_status.connected {
                commands.push(Command::SetBoardFen {
                    fen: start,
                    force: true,
                });
            }
            (model, commands)
        }

        Message::ReachDone => {
            let Workflow::Reaching { session } = &model.workflow else {
                return (model, Vec::new());
            };
            let command = Command::CompleteReach {
                moves: session.moves.iter().map(|m| m.san.clone()).collect(),
                final_fen: session.current_fen.clone(),
            };
            (model, vec![command])
        }

        Message::ReachTargetResolved {
            moves,
            final_fen: _,
        } => {
            let Workflow::Reaching { session } = model.workflow.clone() else {
                return (model, Vec::new());
            };
            let line = match replay_line(&session.start_fen, &moves) {
                Ok(line) => line,
                Err(error) => {
                    let status = format!("Could not replay moves: {error}");
                    return (model.with_status(status), Vec::new());
                }
            };

            let cursor;
            if let Some(base_id) = &session.base_analysis_id {
                let Some(base_tree) = model.analyses.get(base_id) else {
                    return (model.with_status("Base analysis is gone"), Vec::new());
                };
                let (_, leaf_path) = base_tree.main_line_leaf();
                let mut tree = base_tree.clone();
                let mut path = leaf_path;
                for (san, fen) in &line {
                    let Some((next_tree, next_path)) = tree.make_move(&path, san, fen) else {
                        return (model.with_status("Could not graft moves"), Vec::new());
                    };
                    tree = next_tree;
                    path = next_path;
                }
                model.analyses.insert(base_id.clone(), tree);
                model.continuations.insert(
                    session.game_id.clone(),
                    ContinuationLink {
                        analysis_id: base_id.clone(),
                        node_path: path.clone(),
                    },
                );
                cursor = path;
            } else {
                let mut tree =
                    AnalysisTree::create(session.start_fen.clone(), turn_of(&session.start_fen));
                let mut path = NodePath::new();
                for (san, fen) in &line {
                    let Some((next_tree, next_path)) = tree.make_move(&path, san, fen) else {
                        return (model.with_status("Could not graft moves"), Vec::new());
                    };
                    tree = next_tree;
                    path = next_path;
                }
                model.analyses.insert(session.game_id.clone(), tree);
                cursor = path;
            }

            let was_otb = session.mode == ReachMode::Otb;
            model.current_node = cursor.clone();
            model.workflow = Workflow::Analysis {
                game_id: session.game_id.clone(),
                cursor,
            };
            let mut commands = Vec::new();
            mark_dirty(&mut model, &mut commands);
            if was_otb {
                commands.push(Command::StopBoardPoll);
            }
            if model.engine.running {
                let fen = line
                    .last()
                    .map(|(_, fen)| fen.clone())
                    .unwrap_or_else(|| session.start_fen.clone());
                commands.push(Command::EngineAnalyze {
                    fen,
                    depth: ENGINE_DEPTH,
                });
            }
            (model, commands)
        }

        Message::ReachCancel => {
            let Workflow::Reaching { session } = model.workflow.clone() else {
                return (model, Vec::new());
            };
            model.games.retain(|game| game.id != session.game_id);
            model.rebuild_placement_index();
            model.workflow = Workflow::Viewing {
                active_game_id: None,
            };
            model.current_node.clear();
            let mut commands = Vec::new();
            mark_dirty(&mut model, &mut commands);
            if session.mode == ReachMode::Otb {
                commands.push(Command::StopBoardPoll);
            }
            (model, commands)
        }

        Message::AnalysisStarted { game_id, turn } => {
            if !matches!(
                model.workflow,
                Workflow::Viewing { .. } | Workflow::Analysis { .. }
            ) {
                return (model, Vec::new());
            }
            let Some(game) = model.game(&game_id) else {
                return (model, Vec::new());
            };
            let placement = game.fen.clone();

            let cursor = match model.continuations.get(&game_id) {
                Some(link) if model.analyses.contains_key(&link.analysis_id) => {
                    link.node_path.clone()
                }
                _ => {
                    if !model.analyses.contains_key(&game_id) {
                        let start_fen = with_game_state(&placement, turn);
                        model
                            .analyses
                            .insert(game_id.clone(), AnalysisTree::create(start_fen, turn));
                    }
                    NodePath::new()
                }
            };

            model.current_node = cursor.clone();
            model.workflow = Workflow::Analysis {
                game_id: game_id.clone(),
                cursor,
            };
            let fen = context_fen(&model, &game_id);
            let commands = position_commands(&model, fen);
            (model, commands)
        }

        Message::AnalysisMoveMade { san, fen } => {
            let Workflow::Analysis { game_id, cursor } = model.workflow.clone() else {
                return (model, Vec::new());
            };
            let Some(context) = analysis_context(&model, &game_id) else {
                return (model, Vec::new());
            };
            let analysis_id = context.analysis_id.clone();
            let Some((tree, new_cursor)) = context.tree.make_move(&cursor, &san, &fen) else {
                return (model, Vec::new());
            };
            let changed = model.analyses.get(&analysis_id) != Some(&tree);
            model.analyses.insert(analysis_id, tree);
            model.current_node = new_cursor.clone();
            model.workflow = Workflow::Analysis {
                game_id,
                cursor: new_cursor,
            };
            let mut commands = position_commands(&model, fen);
            if changed {
                mark_dirty(&mut model, &mut commands);
            }
            (model, commands)
        }

        Message::GoBack => navigate(model, |_, cursor| AnalysisTree::go_back(cursor)),
        Message::GoForward => navigate(model, |tree, cursor| tree.go_forward(cursor)),
        Message::NextVariation => navigate(model, |tree, cursor| tree.next_variation(cursor)),
        Message::PrevVariation => navigate(model, |tree, cursor| tree.prev_variation(cursor)),
        Message::GoTo { path } => navigate(model, move |tree, _| {
            tree.get_node(&path).map(|_| path.clone())
        }),

        Message::DeleteVariation => {
            let Workflow::Analysis { game_id, cursor } = model.workflow.clone() else {
                return (model, Vec::new());
            };
            let Some(context) = analysis_context(&model, &game_id) else {
                return (model, Vec::new());
            };
            let analysis_id = context.analysis_id.clone();
            let Some((tree, new_cursor)) = context.tree.delete_variation(&cursor) else {
                return (model, Vec::new());
            };
            model.analyses.insert(analysis_id, tree);
            model.current_node = new_cursor.clone();
            model.workflow = Workflow::Analysis {
                game_id: game_id.clone(),
                cursor: new_cursor,
            };
            let fen = context_fen(&model, &game_id);
            let mut commands = position_commands(&model, fen);
            mark_dirty(&mut model, &mut commands);
            (model, commands)
        }

        Message::DeleteGame { game_id } => {
            if model.game(&game_id).is_none() {
                return (model, Vec::new());
            }
            let was_active = active_game_id(&model.workflow) == Some(&game_id);
            let was_otb_reach = matches!(
                &model.workflow,
                Workflow::Reaching { session }
                    if session.game_id == game_id && session.mode == ReachMode::Otb
            );

            model.games.retain(|game| game.id != game_id);
            model.analyses.remove(&game_id);
            model
                .continuations
                .retain(|owner, link| owner != &game_id && link.analysis_id != game_id);
            model.rebuild_placement_index();

            if was_active {
                model.workflow = Workflow::Viewing {
                    active_game_id: None,
                };
                model.current_node.clear();
            }
            let mut commands = Vec::new();
            mark_dirty(&mut model, &mut commands);
            if was_otb_reach {
                commands.push(Command::StopBoardPoll);
            }
            (model, commands)
        }

        Message::ToggleEngine => {
            if model.pdf.info.is_none() {
                return (model, Vec::new());
            }
            let command = if model.engine.running {
                Command::EngineStop
            } else {
                Command::EngineStart
            };
            (model, vec![command])
        }

        Message::EngineStateChanged { running } => {
            model.engine.running = running;
            if !running {
                model.engine.eval_text.clear();
                model.engine.pv.clear();
                return (model, Vec::new());
            }
            let commands = match &model.workflow {
                Workflow::Analysis { game_id, .. } => {
                    let fen = context_fen(&model, game_id);
                    vec![Command::EngineAnalyze {
                        fen,
                        depth: ENGINE_DEPTH,
                    }]
                }
                _ => Vec::new(),
            };
            (model, commands)
        }

        Message::EngineReport { eval_text, pv } => {
            model.engine.eval_text = eval_text;
            model.engine.pv = pv;
            (model, Vec::new())
        }

        Message::BoardStatusChanged {
            available,
            connected,
        } => {
            let was_connected = model.board_status.connected;
            model.board_status.available = available;
            model.board_status.connected = connected;

            let mut commands = Vec::new();
            if connected && !was_connected {
                if let Workflow::Reaching { session } = &model.workflow {
                    if session.mode == ReachMode::Otb {
                        commands.push(Command::SetBoardFen {
                            fen: session.current_fen.clone(),
                            force: true,
                        });
                        commands.push(Command::StartBoardPoll);
                    }
                }
            }
            if !connected && was_connected {
                commands.push(Command::StopBoardPoll);
            }
            (model, commands)
        }

        Message::AutosaveDue => {
            if model.pdf.info.is_none() {
                return (model, Vec::new());
            }
            (model, vec![Command::SaveStudy])
        }

        Message::SaveCompleted => {
            model.is_dirty = false;
            (model.with_status("Study saved"), Vec::new())
        }

        Message::SaveFailed { reason } => {
            // is_dirty stays set so the next dirtying edit reschedules.
            let status = format!("Save failed: {reason}");
            (model.with_status(status), Vec::new())
        }

        Message::StudyLoaded {
            games,
            analyses,
            continuations,
        } => {
            if model.pdf.info.is_none() {
                return (model, Vec::new());
            }
            model.games = games;
            model.analyses = analyses.into_iter().collect();
            model.continuations = continuations.into_iter().collect();
            model.rebuild_placement_index();
            model.is_dirty = false;
            (model.with_status("Study loaded"), Vec::new())
        }

        Message::LoadFailed { reason } => {
            let status = format!("Could not load study: {reason}");
            (model.with_status(status), Vec::new())
        }

        Message::CopyPgn => {
            let Some(game_id) = active_game_id(&model.workflow).cloned() else {
                return (model, Vec::new());
            };
            let Some(context) = analysis_context(&model, &game_id) else {
                return (model, Vec::new());
            };
            let text = context.tree.to_pgn();
            (
                model.with_status("PGN copied"),
                vec![Command::CopyToClipboard { text }],
            )
        }

        Message::ToggleTextSelection => {
            model.ui.text_selection = !model.ui.text_selection;
            if model.ui.text_selection && model.pdf.info.is_some() {
                let page = model.pdf.current_page;
                (model, vec![Command::ExtractText { page }])
            } else {
                model.ui.overlay_text = None;
                (model, Vec::new())
            }
        }

        Message::TextExtracted { pdf_text, ocr_text } => {
            let text = if pdf_text.trim().is_empty() {
                ocr_text
            } else {
                pdf_text
            };
            model.ui.overlay_text = Some(text);
            (model, Vec::new())
        }

        Message::Error { scope, text } => {
            if scope == ErrorScope::Recognition {
                model.recognition_in_progress = None;
            }
            let status = format!("{} error: {}", scope.label(), text);
            (model.with_status(status), Vec::new())
        }
    }
}

fn diagram_bbox(model: &Model, index: usize) -> Option<BBox> {
    let diagrams = model.diagrams.as_ref()?;
    if diagrams.page != model.pdf.current_page {
        return None;
    }
    diagrams.boxes.get(index).copied()
}

fn mark_dirty(model: &mut Model, commands: &mut Vec<Command>) {
    model.is_dirty = true;
    commands.push(Command::ScheduleSave);
}

/// FEN at the active analysis cursor, falling back to the tree's start.
fn context_fen(model: &Model, game_id: &str) -> String {
    let Some(context) = analysis_context(model, game_id) else {
        return STARTING_FEN.to_string();
    };
    match context.tree.get_node(&context.cursor) {
        Some(node) if !node.fen.is_empty() => node.fen.clone(),
        _ => context.tree.start_fen.clone(),
    }
}

fn position_commands(model: &Model, fen: String) -> Vec<Command> {
    let mut commands = Vec::new();
    if model.engine.running {
        commands.push(Command::EngineAnalyze {
            fen: fen.clone(),
            depth: ENGINE_DEPTH,
        });
    }
    if model.board_status.connected {
        commands.push(Command::SetBoardFen { fen, force: false });
    }
    commands
}

/// Shared cursor-motion arm: resolves the analysis context, computes the
/// new cursor, and re-syncs engine/board. No-op when the move is absent.
fn navigate<F>(mut model: Model, step: F) -> (Model, Vec<Command>)
where
    F: Fn(&AnalysisTree, &[String]) -> Option<NodePath>,
{
    let Workflow::Analysis { game_id, cursor } = model.workflow.clone() else {
        return (model, Vec::new());
    };
    let Some(context) = analysis_context(&model, &game_id) else {
        return (model, Vec::new());
    };
    let Some(new_cursor) = step(context.tree, &cursor) else {
        return (model, Vec::new());
    };

    model.current_node = new_cursor.clone();
    model.workflow = Workflow::Analysis {
        game_id: game_id.clone(),
        cursor: new_cursor,
    };
    let fen = context_fen(&model, &game_id);
    let commands = position_commands(&model, fen);
    (model, commands)
}

fn begin_reach(
    mut model: Model,
    pending: PendingRecognition,
    start_fen: String,
    base_analysis_id: Option<GameId>,
) -> (Model, Vec<Command>) {
    // The game becomes real immediately, before the target is reached.
    if let Some(game) = model.game_mut(&pending.game_id) {
        game.pending = false;
    }
    model.rebuild_placement_index();

    let mode = if model.board_status.connected {
        ReachMode::Otb
    } else {
        ReachMode::Manual
    };
    let session = ReachSession {
        target_fen: pending.target_fen,
        start_fen: start_fen.clone(),
        current_fen: start_fen.clone(),
        base_analysis_id,
        game_id: pending.game_id,
        moves: Vec::new(),
        mode,
        turn: pending.turn,
    };
    model.workflow = Workflow::Reaching { session };

    let mut commands = Vec::new();
    mark_dirty(&mut model, &mut commands);
    if mode == ReachMode::Otb {
        commands.push(Command::SetBoardFen {
            fen: start_fen,
            force: true,
        });
        commands.push(Command::StartBoardPoll);
    }
    (model, commands)
}
