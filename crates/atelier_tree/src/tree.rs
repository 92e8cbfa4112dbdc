//! The branching conversation tree.

use crate::error::{TreeError, Violation};
use crate::node::{MediaAttachment, MessageNode, NodeId};
use atelier_core::Clock;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

/// Direction for [`ChatTree::navigate_to_sibling`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards the first sibling.
    Previous,
    /// Towards the last sibling.
    Next,
}

/// Position of a node among its parent's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiblingPosition {
    /// Zero-based index in branch order.
    pub index: usize,
    /// Number of siblings, including the node itself.
    pub total: usize,
}

/// Root-to-node sequence returned by [`ChatTree::path_to_leaf`].
///
/// The iterator is finite and can be cloned to restart it.
#[derive(Debug, Clone)]
pub struct Path<'a> {
    nodes: std::vec::IntoIter<&'a MessageNode>,
}

impl<'a> Iterator for Path<'a> {
    type Item = &'a MessageNode;

    fn next(&mut self) -> Option<Self::Item> {
        self.nodes.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.nodes.size_hint()
    }
}

impl DoubleEndedIterator for Path<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.nodes.next_back()
    }
}

impl ExactSizeIterator for Path<'_> {}

/// A conversation stored as a tree of [`MessageNode`]s.
///
/// Nodes live in an arena keyed by [`NodeId`]; parents and children refer to
/// each other by id. Editing a message never rewrites it: a sibling holding
/// the new content is added under the same parent and becomes the current
/// leaf, so every earlier branch stays reachable.
///
/// # Example
///
/// ```
/// use atelier_core::Clock;
/// use atelier_tree::{ChatTree, MessageNode, Role};
///
/// let clock = Clock::default();
/// let mut tree = ChatTree::new();
///
/// let root = tree.append(MessageNode::new(Role::System, "be brief", clock.now())).unwrap();
/// let question = tree.append(MessageNode::new(Role::User, "a cat?", clock.now())).unwrap();
/// let edited = tree.edit_node(&question, "a dog?").unwrap();
///
/// assert_eq!(tree.get(&root).unwrap().children().len(), 2);
/// let path: Vec<_> = tree.active_path().map(|n| n.content.as_str()).collect();
/// assert_eq!(path, ["be brief", "a dog?"]);
/// # let _ = edited;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTree {
    nodes: HashMap<NodeId, MessageNode>,
    root: Option<NodeId>,
    current_leaf: Option<NodeId>,
    #[serde(skip)]
    clock: Clock,
}

impl ChatTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty tree that timestamps edits with `clock`.
    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    /// Replaces the clock used to timestamp edits.
    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the root id.
    #[must_use]
    pub fn root(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    /// Returns the current leaf id.
    #[must_use]
    pub fn current_leaf(&self) -> Option<&NodeId> {
        self.current_leaf.as_ref()
    }

    /// Returns a node by id.
    #[must_use]
    pub fn get(&self, id: &NodeId) -> Option<&MessageNode> {
        self.nodes.get(id)
    }

    /// Returns `true` if the node exists.
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Iterates over every node in unspecified order.
    pub fn nodes(&self) -> impl Iterator<Item = &MessageNode> {
        self.nodes.values()
    }

    fn node(&self, id: &NodeId) -> Result<&MessageNode, TreeError> {
        self.nodes
            .get(id)
            .ok_or_else(|| TreeError::NotFound(id.clone()))
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut MessageNode, TreeError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| TreeError::NotFound(id.clone()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Structural operations
    // ─────────────────────────────────────────────────────────────────────────

    fn check_insertable(&self, node: &MessageNode) -> Result<(), TreeError> {
        if !node.is_detached() {
            return Err(TreeError::InvalidState(format!(
                "node {} is already linked into a tree",
                node.id
            )));
        }
        if self.nodes.contains_key(&node.id) {
            return Err(TreeError::InvalidState(format!(
                "node {} already exists",
                node.id
            )));
        }
        Ok(())
    }

    /// Inserts the first node.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidState`] if the tree already has a root or
    /// the node is already linked.
    pub fn create_root(&mut self, node: MessageNode) -> Result<NodeId, TreeError> {
        if let Some(root) = &self.root {
            return Err(TreeError::InvalidState(format!("tree already has root {root}")));
        }
        if !self.nodes.is_empty() {
            return Err(TreeError::InvalidState("tree has nodes but no root".into()));
        }
        self.check_insertable(&node)?;

        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        self.root = Some(id.clone());
        self.current_leaf = Some(id.clone());
        tracing::debug!(node = %id, "created root");
        Ok(id)
    }

    /// Appends `node` as the last child of `parent` and makes it the current leaf.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFound`] if the parent does not exist, or
    /// [`TreeError::InvalidState`] if the node is already linked.
    pub fn append_child(&mut self, parent: &NodeId, mut node: MessageNode) -> Result<NodeId, TreeError> {
        self.node(parent)?;
        self.check_insertable(&node)?;

        let id = node.id.clone();
        node.parent = Some(parent.clone());
        self.nodes.insert(id.clone(), node);
        self.node_mut(parent)?.children.push(id.clone());
        self.current_leaf = Some(id.clone());
        tracing::debug!(node = %id, parent = %parent, "appended child");
        Ok(id)
    }

    /// Appends `node` under the current leaf, or makes it the root of an empty tree.
    ///
    /// # Errors
    ///
    /// See [`create_root`](Self::create_root) and [`append_child`](Self::append_child).
    /// A non-empty tree without a current leaf is [`TreeError::InvalidState`].
    pub fn append(&mut self, node: MessageNode) -> Result<NodeId, TreeError> {
        if self.root.is_none() {
            return self.create_root(node);
        }
        let Some(leaf) = self.current_leaf.clone() else {
            return Err(TreeError::InvalidState("tree has no current leaf".into()));
        };
        self.append_child(&leaf, node)
    }

    /// Branches from `node_id`: adds a sibling with `new_content` under the
    /// same parent and makes it the current leaf.
    ///
    /// The sibling keeps the role and vision inputs of the original but no
    /// attachments. The original node is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFound`] if the node does not exist, or
    /// [`TreeError::InvalidState`] when editing the root, which has no parent
    /// to branch under.
    pub fn edit_node(&mut self, node_id: &NodeId, new_content: impl Into<String>) -> Result<NodeId, TreeError> {
        let original = self.node(node_id)?;
        let Some(parent) = original.parent.clone() else {
            return Err(TreeError::InvalidState(format!(
                "cannot branch from root {node_id}"
            )));
        };

        let mut sibling = MessageNode::new(original.role, new_content, self.clock.now());
        sibling.vision_inputs = original.vision_inputs.clone();
        let id = self.append_child(&parent, sibling)?;
        tracing::debug!(node = %id, original = %node_id, "edited into new branch");
        Ok(id)
    }

    /// Makes `node_id` the current leaf.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFound`] if the node does not exist.
    pub fn switch_leaf(&mut self, node_id: &NodeId) -> Result<(), TreeError> {
        self.node(node_id)?;
        self.current_leaf = Some(node_id.clone());
        Ok(())
    }

    /// Appends an attachment to a node.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFound`] if the node does not exist.
    pub fn attach_media(&mut self, node_id: &NodeId, attachment: MediaAttachment) -> Result<(), TreeError> {
        let node = self.node_mut(node_id)?;
        tracing::debug!(node = %node_id, attachment = %attachment.id, kind = ?attachment.kind, "attached media");
        node.attachments.push(attachment);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Paths
    // ─────────────────────────────────────────────────────────────────────────

    /// Walks parents from `node_id` to the root, returning nodes leaf first.
    fn ancestry(&self, node_id: &NodeId) -> Result<Vec<&MessageNode>, TreeError> {
        let mut chain = Vec::new();
        let mut current = self.node(node_id)?;
        loop {
            chain.push(current);
            // A chain longer than the arena means a cycle.
            if chain.len() > self.nodes.len() {
                return Err(TreeError::NotFound(node_id.clone()));
            }
            match &current.parent {
                Some(parent) => {
                    current = self
                        .nodes
                        .get(parent)
                        .ok_or_else(|| TreeError::NotFound(node_id.clone()))?;
                }
                None if self.root.as_ref() == Some(&current.id) => return Ok(chain),
                None => return Err(TreeError::NotFound(node_id.clone())),
            }
        }
    }

    /// Returns the nodes from the root to `node_id`, inclusive.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFound`] if the node does not exist or is not
    /// reachable from the root.
    pub fn path_to_leaf(&self, node_id: &NodeId) -> Result<Path<'_>, TreeError> {
        let mut chain = self.ancestry(node_id)?;
        chain.reverse();
        Ok(Path {
            nodes: chain.into_iter(),
        })
    }

    /// Returns the path to the current leaf; empty for an empty tree.
    #[must_use]
    pub fn active_path(&self) -> Path<'_> {
        let nodes = self
            .current_leaf
            .as_ref()
            .and_then(|leaf| self.ancestry(leaf).ok())
            .map(|mut chain| {
                chain.reverse();
                chain
            })
            .unwrap_or_default();
        Path {
            nodes: nodes.into_iter(),
        }
    }

    /// Returns the number of edges between the root and `node_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFound`] if the node does not exist or is unreachable.
    pub fn depth(&self, node_id: &NodeId) -> Result<usize, TreeError> {
        Ok(self.ancestry(node_id)?.len() - 1)
    }

    /// Returns every node without children.
    #[must_use]
    pub fn leaves(&self) -> Vec<&NodeId> {
        self.nodes
            .values()
            .filter(|n| n.is_leaf())
            .map(|n| &n.id)
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Siblings
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the node's position among its siblings; `(0, 1)` for the root.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFound`] if the node does not exist, or
    /// [`TreeError::InvalidState`] if its parent does not list it.
    pub fn sibling_index(&self, node_id: &NodeId) -> Result<SiblingPosition, TreeError> {
        let node = self.node(node_id)?;
        let Some(parent) = &node.parent else {
            return Ok(SiblingPosition { index: 0, total: 1 });
        };
        let siblings = &self.node(parent)?.children;
        let index = siblings
            .iter()
            .position(|c| c == node_id)
            .ok_or_else(|| TreeError::InvalidState(format!("{parent} does not list child {node_id}")))?;
        Ok(SiblingPosition {
            index,
            total: siblings.len(),
        })
    }

    /// Moves to the previous or next sibling of `node_id` and follows that
    /// branch down through last children to its tip, which becomes the
    /// current leaf.
    ///
    /// Returns the new leaf, or `None` if `node_id` is already the first
    /// (or last) sibling or is the root.
    ///
    /// # Errors
    ///
    /// See [`sibling_index`](Self::sibling_index).
    pub fn navigate_to_sibling(&mut self, node_id: &NodeId, direction: Direction) -> Result<Option<NodeId>, TreeError> {
        let SiblingPosition { index, total } = self.sibling_index(node_id)?;
        let target = match direction {
            Direction::Previous => index.saturating_sub(1),
            Direction::Next => (index + 1).min(total - 1),
        };
        if target == index {
            return Ok(None);
        }
        let Some(parent) = self.node(node_id)?.parent.clone() else {
            return Ok(None);
        };

        let mut tip = self.node(&parent)?.children[target].clone();
        // Bounded by the arena size so a corrupt tree cannot loop forever.
        for _ in 0..self.nodes.len() {
            match self.node(&tip)?.children.last() {
                Some(last) => tip = last.clone(),
                None => break,
            }
        }
        self.current_leaf = Some(tip.clone());
        Ok(Some(tip))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // UI flags
    // ─────────────────────────────────────────────────────────────────────────

    /// Sets the pinned flag.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFound`] if the node does not exist.
    pub fn set_pinned(&mut self, node_id: &NodeId, pinned: bool) -> Result<(), TreeError> {
        self.node_mut(node_id)?.pinned = pinned;
        Ok(())
    }

    /// Flips the pinned flag, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFound`] if the node does not exist.
    pub fn toggle_pin(&mut self, node_id: &NodeId) -> Result<bool, TreeError> {
        let node = self.node_mut(node_id)?;
        node.pinned = !node.pinned;
        Ok(node.pinned)
    }

    /// Sets the editing flag.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFound`] if the node does not exist.
    pub fn set_editing(&mut self, node_id: &NodeId, editing: bool) -> Result<(), TreeError> {
        self.node_mut(node_id)?.editing = editing;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Splitting
    // ─────────────────────────────────────────────────────────────────────────

    /// Copies the root-to-`node_id` path into a new tree whose current leaf is
    /// `node_id`. Branches off the path are not copied.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFound`] if the node does not exist or is unreachable.
    pub fn split_at(&self, node_id: &NodeId) -> Result<ChatTree, TreeError> {
        let path: Vec<&MessageNode> = self.path_to_leaf(node_id)?.collect();

        let mut split = ChatTree::with_clock(self.clock.clone());
        for (i, node) in path.iter().enumerate() {
            let mut copy = (*node).clone();
            copy.editing = false;
            copy.children = path
                .get(i + 1)
                .map(|next| vec![next.id.clone()])
                .unwrap_or_default();
            split.nodes.insert(copy.id.clone(), copy);
        }
        split.root = path.first().map(|n| n.id.clone());
        split.current_leaf = Some(node_id.clone());
        Ok(split)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    /// Checks every structural invariant.
    ///
    /// - A non-empty tree has a root that exists and has no parent
    /// - The current leaf, if set, exists
    /// - Parent and child links agree in both directions, with no repeats
    /// - Every node is reachable from the root (no cycles, no second root)
    ///
    /// # Errors
    ///
    /// Returns every violation found.
    pub fn validate(&self) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();

        match &self.root {
            None if !self.nodes.is_empty() => violations.push(Violation::MissingRoot),
            None => {
                if let Some(leaf) = &self.current_leaf {
                    violations.push(Violation::LeafWithoutRoot(leaf.clone()));
                }
            }
            Some(root) => match self.nodes.get(root) {
                None => violations.push(Violation::DanglingRoot(root.clone())),
                Some(node) if node.parent.is_some() => {
                    violations.push(Violation::RootHasParent(root.clone()));
                }
                Some(_) => {}
            },
        }

        if let Some(leaf) = &self.current_leaf
            && self.root.is_some()
            && !self.nodes.contains_key(leaf)
        {
            violations.push(Violation::DanglingLeaf(leaf.clone()));
        }

        for node in self.nodes.values() {
            self.validate_links(node, &mut violations);
        }

        if let Some(root) = self.root.as_ref().filter(|r| self.nodes.contains_key(*r)) {
            let reachable = self.reachable_from(root);
            for id in self.nodes.keys() {
                if !reachable.contains(id) {
                    violations.push(Violation::Unreachable(id.clone()));
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn validate_links(&self, node: &MessageNode, violations: &mut Vec<Violation>) {
        match &node.parent {
            Some(parent) => match self.nodes.get(parent) {
                None => violations.push(Violation::MissingParent {
                    node: node.id.clone(),
                    parent: parent.clone(),
                }),
                Some(p) if !p.children.contains(&node.id) => {
                    violations.push(Violation::NotListedByParent {
                        node: node.id.clone(),
                        parent: parent.clone(),
                    });
                }
                Some(_) => {}
            },
            None if self.root.as_ref() != Some(&node.id) => {
                violations.push(Violation::SecondRoot(node.id.clone()));
            }
            None => {}
        }

        let mut seen = HashSet::with_capacity(node.children.len());
        for child in &node.children {
            if !seen.insert(child) {
                violations.push(Violation::DuplicateChild {
                    node: node.id.clone(),
                    child: child.clone(),
                });
                continue;
            }
            match self.nodes.get(child) {
                None => violations.push(Violation::MissingChild {
                    node: node.id.clone(),
                    child: child.clone(),
                }),
                Some(c) if c.parent.as_ref() != Some(&node.id) => {
                    violations.push(Violation::ChildParentMismatch {
                        node: node.id.clone(),
                        child: child.clone(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    /// Ids reachable from `root` following child links whose parent pointer agrees.
    fn reachable_from<'a>(&'a self, root: &'a NodeId) -> HashSet<&'a NodeId> {
        let mut reachable = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !reachable.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(id) {
                stack.extend(
                    node.children
                        .iter()
                        .filter(|c| self.nodes.get(*c).is_some_and(|n| n.parent.as_ref() == Some(id))),
                );
            }
        }
        reachable
    }

    #[cfg(test)]
    pub(crate) fn raw_node_mut(&mut self, id: &NodeId) -> Option<&mut MessageNode> {
        self.nodes.get_mut(id)
    }
}
