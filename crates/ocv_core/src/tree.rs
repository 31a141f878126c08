use serde_json::{json, Value};

use crate::fen::{fullmove_of, turn_of, Turn};

pub type NodePath = Vec<String>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub fen: String,
    pub san: Option<String>,
    pub comment: String,
    pub children: Vec<Node>,
}

/// Branching game tree. `children[0]` is always the main line; later
/// siblings are variations in creation order. Nodes are addressed by a
/// cursor: the SAN sequence from the root.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisTree {
    pub start_fen: String,
    pub turn: Turn,
    pub root: Node,
}

impl AnalysisTree {
    pub fn create(start_fen: impl Into<String>, turn: Turn) -> Self {
        let start_fen = start_fen.into();
        Self {
            root: Node {
                fen: start_fen.clone(),
                san: None,
                comment: String::new(),
                children: Vec::new(),
            },
            start_fen,
            turn,
        }
    }

    pub fn get_node<'a>(&'a self, path: &[String]) -> Option<&'a Node> {
        let mut node = &self.root;
        for san in path {
            node = node.children.iter().find(|child| {
                child.san.as_deref() == Some(san.as_str())
            })?;
        }
        Some(node)
    }

    fn get_node_mut(&mut self, path: &[String]) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for san in path {
            node = node.children.iter_mut().find(|child| {
                child.san.as_deref() == Some(san.as_str())
            })?;
        }
        Some(node)
    }

    /// Plays `san` at `cursor`. Re-playing a known move advances the cursor
    /// without creating a duplicate sibling; a novel move is appended as the
    /// last child, becoming a variation when a main line already exists.
    /// Returns None when the cursor does not resolve.
    pub fn make_move(
        &self,
        cursor: &[String],
        san: &str,
        fen: &str,
    ) -> Option<(AnalysisTree, NodePath)> {
        self.get_node(cursor)?;

        let mut advanced: NodePath = cursor.to_vec();
        advanced.push(san.to_string());

        let known = self
            .get_node(cursor)
            .is_some_and(|node| node.children.iter().any(|c| c.san.as_deref() == Some(san)));
        if known {
            return Some((self.clone(), advanced));
        }

        let mut next = self.clone();
        let parent = next.get_node_mut(cursor)?;
        parent.children.push(Node {
            fen: fen.to_string(),
            san: Some(san.to_string()),
            comment: String::new(),
            children: Vec::new(),
        });

        Some((next, advanced))
    }

    pub fn go_back(cursor: &[String]) -> Option<NodePath> {
        if cursor.is_empty() {
            return None;
        }
        Some(cursor[..cursor.len() - 1].to_vec())
    }

    pub fn go_forward(&self, cursor: &[String]) -> Option<NodePath> {
        let node = self.get_node(cursor)?;
        let main = node.children.first()?;
        let mut path = cursor.to_vec();
        path.push(main.san.clone()?);
        Some(path)
    }

    fn sibling_at_offset(&self, cursor: &[String], offset: isize) -> Option<NodePath> {
        let last = cursor.last()?;
        let parent = self.get_node(&cursor[..cursor.len() - 1])?;
        let index = parent
            .children
            .iter()
            .position(|child| child.san.as_deref() == Some(last.as_str()))?;

        let target = index.checked_add_signed(offset)?;
        let sibling = parent.children.get(target)?;

        let mut path = cursor[..cursor.len() - 1].to_vec();
        path.push(sibling.san.clone()?);
        Some(path)
    }

    pub fn next_variation(&self, cursor: &[String]) -> Option<NodePath> {
        self.sibling_at_offset(cursor, 1)
    }

    pub fn prev_variation(&self, cursor: &[String]) -> Option<NodePath> {
        self.sibling_at_offset(cursor, -1)
    }

    /// Removes the node at `cursor`. The new cursor points at the new first
    /// sibling when one remains, otherwise at the parent. Returns None when
    /// nothing was deleted (root or unresolvable cursor).
    pub fn delete_variation(&self, cursor: &[String]) -> Option<(AnalysisTree, NodePath)> {
        let last = cursor.last()?;
        let parent_path = &cursor[..cursor.len() - 1];

        let mut next = self.clone();
        let parent = next.get_node_mut(parent_path)?;
        let index = parent
            .children
            .iter()
            .position(|child| child.san.as_deref() == Some(last.as_str()))?;
        parent.children.remove(index);

        let new_cursor = match parent.children.first().and_then(|c| c.san.clone()) {
            Some(first_san) => {
                let mut path = parent_path.to_vec();
                path.push(first_san);
                path
            }
            None => parent_path.to_vec(),
        };

        Some((next, new_cursor))
    }

    /// Follows the main line to its terminal node.
    pub fn main_line_leaf(&self) -> (&Node, NodePath) {
        let mut node = &self.root;
        let mut path = Vec::new();

        while let Some(child) = node.children.first() {
            if let Some(san) = &child.san {
                path.push(san.clone());
            }
            node = child;
        }

        (node, path)
    }

    pub fn to_pgn(&self) -> String {
        let header = format!("[FEN \"{}\"]", self.start_fen);

        if self.root.children.is_empty() {
            return format!("{}\n\n*", header);
        }

        let numbering = Numbering {
            white_starts: turn_of(&self.start_fen) == Turn::White,
            first_move: fullmove_of(&self.start_fen),
        };
        let mut tokens = Vec::new();
        render_moves(&self.root, 0, true, numbering, &mut tokens);

        format!("{}\n\n{}", header, tokens.join(" "))
    }

    pub fn to_json(&self) -> Value {
        json!({
            "startFen": self.start_fen,
            "turn": self.turn.as_fen(),
            "root": node_to_json(&self.root),
        })
    }

    /// Lenient structural decode: missing or mistyped fields fall back to
    /// empty string/array rather than failing.
    pub fn from_json(value: &Value) -> AnalysisTree {
        let start_fen = str_field(value, "startFen");
        let turn = Turn::from_fen_field(&str_field(value, "turn")).unwrap_or_default();
        let root = value
            .get("root")
            .map(node_from_json)
            .unwrap_or_default();

        AnalysisTree {
            start_fen,
            turn,
            root,
        }
    }
}

#[derive(Clone, Copy)]
struct Numbering {
    white_starts: bool,
    first_move: u32,
}

impl Numbering {
    fn is_white(&self, ply: usize) -> bool {
        if self.white_starts {
            ply % 2 == 0
        } else {
            ply % 2 == 1
        }
    }

    fn move_number(&self, ply: usize) -> u32 {
        if self.white_starts {
            self.first_move + (ply / 2) as u32
        } else {
            self.first_move + ((ply + 1) / 2) as u32
        }
    }
}

fn move_token(node: &Node, ply: usize, force_number: bool, numbering: Numbering) -> String {
    let san = node.san.as_deref().unwrap_or("");
    if numbering.is_white(ply) {
        format!("{}. {}", numbering.move_number(ply), san)
    } else if force_number {
        format!("{}... {}", numbering.move_number(ply), san)
    } else {
        san.to_string()
    }
}

fn render_moves(
    node: &Node,
    ply: usize,
    force_number: bool,
    numbering: Numbering,
    out: &mut Vec<String>,
) {
    let Some(main) = node.children.first() else {
        return;
    };

    out.push(move_token(main, ply, force_number, numbering));
    let mut commented = false;
    if !main.comment.is_empty() {
        out.push(format!("{{{}}}", main.comment));
        commented = true;
    }

    let has_variations = node.children.len() > 1;
    for variation in &node.children[1..] {
        let mut inner = vec![move_token(variation, ply, true, numbering)];
        if !variation.comment.is_empty() {
            inner.push(format!("{{{}}}", variation.comment));
        }
        render_moves(variation, ply + 1, false, numbering, &mut inner);
        out.push(format!("({})", inner.join(" ")));
    }

    // A Black continuation needs its number restated after an interruption.
    render_moves(main, ply + 1, has_variations || commented, numbering, out);
}

fn node_to_json(node: &Node) -> Value {
    json!({
        "fen": node.fen,
        "san": node.san,
        "comment": node.comment,
        "children": node.children.iter().map(node_to_json).collect::<Vec<_>>(),
    })
}

fn node_from_json(value: &Value) -> Node {
    Node {
        fen: str_field(value, "fen"),
        san: value
            .get("san")
            .and_then(Value::as_str)
            .map(str::to_string),
        comment: str_field(value, "comment"),
        children: value
            .get("children")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(node_from_json).collect())
            .unwrap_or_default(),
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::AnalysisTree;
    use crate::fen::{Turn, STARTING_FEN};

    fn path(sans: &[&str]) -> Vec<String> {
        sans.iter().map(|s| s.to_string()).collect()
    }

    fn sample_tree() -> AnalysisTree {
        // 1. e4 e5 2. Nf3 (2. Bc4)
        let tree = AnalysisTree::create(STARTING_FEN, Turn::White);
        let (tree, c) = tree.make_move(&[], "e4", "fen-e4").unwrap();
        let (tree, c) = tree.make_move(&c, "e5", "fen-e5").unwrap();
        let (tree, _) = tree.make_move(&c, "Nf3", "fen-nf3").unwrap();
        let (tree, _) = tree.make_move(&c, "Bc4", "fen-bc4").unwrap();
        tree
    }

    #[test]
    fn make_move_is_idempotent() {
        let tree = sample_tree();
        let cursor = path(&["e4"]);

        let (once, c1) = tree.make_move(&cursor, "e5", "fen-e5").unwrap();
        let (twice, c2) = once.make_move(&cursor, "e5", "fen-e5").unwrap();

        assert_eq!(once, twice);
        assert_eq!(c1, c2);
        assert_eq!(once.get_node(&cursor).unwrap().children.len(), 1);
    }

    #[test]
    fn novel_moves_become_variations_not_main_line() {
        let tree = sample_tree();
        let node = tree.get_node(&path(&["e4", "e5"])).unwrap();

        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[0].san.as_deref(), Some("Nf3"));
        assert_eq!(node.children[1].san.as_deref(), Some("Bc4"));
    }

    #[test]
    fn unresolvable_cursor_returns_none() {
        let tree = sample_tree();
        assert!(tree.get_node(&path(&["d4"])).is_none());
        assert!(tree.make_move(&path(&["d4"]), "d5", "fen").is_none());
    }

    #[test]
    fn navigation_laws() {
        let tree = sample_tree();
        let at_nf3 = path(&["e4", "e5", "Nf3"]);

        assert_eq!(AnalysisTree::go_back(&at_nf3), Some(path(&["e4", "e5"])));
        assert_eq!(AnalysisTree::go_back(&[]), None);
        assert_eq!(tree.go_forward(&path(&["e4", "e5"])), Some(at_nf3.clone()));
        assert_eq!(tree.go_forward(&at_nf3), None);

        let at_bc4 = path(&["e4", "e5", "Bc4"]);
        assert_eq!(tree.next_variation(&at_nf3), Some(at_bc4.clone()));
        assert_eq!(tree.prev_variation(&at_bc4), Some(at_nf3.clone()));
        assert_eq!(tree.next_variation(&at_bc4), None);
        assert_eq!(tree.prev_variation(&at_nf3), None);
        assert_eq!(tree.next_variation(&[]), None);
        assert_eq!(tree.prev_variation(&[]), None);
    }

    #[test]
    fn delete_variation_moves_cursor_to_first_sibling() {
        let tree = sample_tree();
        let (after, cursor) = tree.delete_variation(&path(&["e4", "e5", "Nf3"])).unwrap();

        assert_eq!(cursor, path(&["e4", "e5", "Bc4"]));
        let node = after.get_node(&path(&["e4", "e5"])).unwrap();
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].san.as_deref(), Some("Bc4"));
    }

    #[test]
    fn delete_last_child_moves_cursor_to_parent() {
        let tree = AnalysisTree::create(STARTING_FEN, Turn::White);
        let (tree, c) = tree.make_move(&[], "e4", "fen-e4").unwrap();

        let (after, cursor) = tree.delete_variation(&c).unwrap();
        assert!(cursor.is_empty());
        assert!(after.root.children.is_empty());
    }

    #[test]
    fn delete_variation_refuses_root_and_missing() {
        let tree = sample_tree();
        assert!(tree.delete_variation(&[]).is_none());
        assert!(tree.delete_variation(&path(&["d4"])).is_none());
    }

    #[test]
    fn main_line_leaf_follows_first_children() {
        let tree = sample_tree();
        let (leaf, leaf_path) = tree.main_line_leaf();

        assert_eq!(leaf.san.as_deref(), Some("Nf3"));
        assert_eq!(leaf_path, path(&["e4", "e5", "Nf3"]));

        let empty = AnalysisTree::create(STARTING_FEN, Turn::White);
        let (leaf, leaf_path) = empty.main_line_leaf();
        assert!(leaf.san.is_none());
        assert!(leaf_path.is_empty());
    }

    #[test]
    fn pgn_matches_reference_rendering() {
        let tree = sample_tree();
        assert_eq!(
            tree.to_pgn(),
            format!("[FEN \"{}\"]\n\n1. e4 e5 2. Nf3 (2. Bc4)", STARTING_FEN)
        );
    }

    #[test]
    fn pgn_empty_tree_renders_star() {
        let tree = AnalysisTree::create(STARTING_FEN, Turn::White);
        assert_eq!(tree.to_pgn(), format!("[FEN \"{}\"]\n\n*", STARTING_FEN));
    }

    #[test]
    fn pgn_black_start_uses_ellipsis() {
        let start = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 2";
        let tree = AnalysisTree::create(start, Turn::Black);
        let (tree, c) = tree.make_move(&[], "Nc6", "fen-1").unwrap();
        let (tree, _) = tree.make_move(&c, "Nf3", "fen-2").unwrap();

        assert_eq!(
            tree.to_pgn(),
            format!("[FEN \"{}\"]\n\n2... Nc6 3. Nf3", start)
        );
    }

    #[test]
    fn pgn_black_variation_gets_ellipsis_prefix() {
        // 1. e4 e5 (1... c5) 2. Nf3
        let tree = AnalysisTree::create(STARTING_FEN, Turn::White);
        let (tree, c) = tree.make_move(&[], "e4", "fen-e4").unwrap();
        let (tree, _) = tree.make_move(&c, "e5", "fen-e5").unwrap();
        let (tree, _) = tree.make_move(&c, "c5", "fen-c5").unwrap();
        let (tree, _) = tree
            .make_move(&path(&["e4", "e5"]), "Nf3", "fen-nf3")
            .unwrap();

        assert_eq!(
            tree.to_pgn(),
            format!(
                "[FEN \"{}\"]\n\n1. e4 e5 (1... c5) 2. Nf3",
                STARTING_FEN
            )
        );
    }

    #[test]
    fn pgn_restates_number_after_white_variation() {
        // 1. e4 e5 2. Nf3 (2. Bc4) 2... Nc6
        let tree = sample_tree();
        let (tree, _) = tree
            .make_move(&path(&["e4", "e5", "Nf3"]), "Nc6", "fen-nc6")
            .unwrap();

        assert_eq!(
            tree.to_pgn(),
            format!(
                "[FEN \"{}\"]\n\n1. e4 e5 2. Nf3 (2. Bc4) 2... Nc6",
                STARTING_FEN
            )
        );
    }

    #[test]
    fn json_round_trip_preserves_structure() {
        let mut tree = sample_tree();
        tree.root.children[0].comment = "book move".to_string();

        let restored = AnalysisTree::from_json(&tree.to_json());
        assert_eq!(restored, tree);
    }

    #[test]
    fn json_decode_defaults_missing_fields() {
        let tree = AnalysisTree::from_json(&serde_json::json!({
            "root": { "san": "e4", "children": [{}] }
        }));

        assert_eq!(tree.start_fen, "");
        assert_eq!(tree.turn, Turn::White);
        assert_eq!(tree.root.san.as_deref(), Some("e4"));
        assert_eq!(tree.root.comment, "");
        assert_eq!(tree.root.children.len(), 1);
        assert_eq!(tree.root.children[0].fen, "");
    }
}
