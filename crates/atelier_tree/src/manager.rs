//! Concurrent access to many conversations.

use crate::conversation::{Conversation, ConversationId};
use crate::error::{ConversationError, TreeError};
use crate::node::{MediaAttachment, NodeId, Role};
use crate::tree::{ChatTree, Direction};
use atelier_core::{Clock, Timestamp};
use atelier_persistence::{Store, StoreExt};
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Listing entry returned by [`Conversations::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    /// Conversation id.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Last change.
    pub updated_at: Timestamp,
    /// Number of messages across all branches.
    pub messages: usize,
}

/// Holds every open conversation.
///
/// Each conversation sits behind its own mutex: operations on one tree are
/// serialized while different trees proceed in parallel. When a [`Store`] is
/// attached every successful mutation is written through; a failed write is
/// logged and does not undo the in-memory change.
pub struct Conversations {
    entries: RwLock<HashMap<ConversationId, Arc<Mutex<Conversation>>>>,
    store: Option<Arc<dyn Store>>,
    clock: Clock,
}

impl core::fmt::Debug for Conversations {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Conversations")
            .field("count", &self.entries.read().len())
            .field("persistent", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Conversations {
    fn default() -> Self {
        Self::new(Clock::default())
    }
}

impl Conversations {
    /// Creates an in-memory manager.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store: None,
            clock,
        }
    }

    /// Creates a manager that writes through to `store`.
    #[must_use]
    pub fn with_store(store: Arc<dyn Store>, clock: Clock) -> Self {
        Self {
            store: Some(store),
            ..Self::new(clock)
        }
    }

    fn entry(&self, id: &ConversationId) -> Result<Arc<Mutex<Conversation>>, ConversationError> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ConversationError::NotFound(id.to_string()))
    }

    fn persist(&self, conversation: &Conversation) {
        if let Some(store) = &self.store
            && let Err(error) = store.save(conversation.id.as_str(), conversation)
        {
            tracing::warn!(conversation = %conversation.id, %error, "failed to persist conversation");
        }
    }

    fn insert(&self, conversation: Conversation) -> ConversationId {
        let id = conversation.id.clone();
        self.persist(&conversation);
        self.entries
            .write()
            .insert(id.clone(), Arc::new(Mutex::new(conversation)));
        id
    }

    /// Creates an empty conversation.
    pub fn create(&self) -> ConversationId {
        let id = self.insert(Conversation::new(&self.clock));
        tracing::info!(conversation = %id, "conversation created");
        id
    }

    /// Returns a copy of a conversation.
    #[must_use]
    pub fn get(&self, id: &ConversationId) -> Option<Conversation> {
        let entry = self.entries.read().get(id).cloned()?;
        let conversation = entry.lock().clone();
        Some(conversation)
    }

    /// Returns `true` if the conversation exists.
    #[must_use]
    pub fn contains(&self, id: &ConversationId) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Deletes a conversation, returning whether it existed.
    pub fn delete(&self, id: &ConversationId) -> bool {
        let removed = self.entries.write().remove(id).is_some();
        if removed
            && let Some(store) = &self.store
            && let Err(error) = store.delete::<Conversation>(id.as_str())
        {
            tracing::warn!(conversation = %id, %error, "failed to delete persisted conversation");
        }
        removed
    }

    /// Lists conversations, most recently updated first.
    #[must_use]
    pub fn list(&self) -> Vec<ConversationSummary> {
        let entries: Vec<_> = self.entries.read().values().cloned().collect();
        let mut summaries: Vec<_> = entries
            .iter()
            .map(|entry| {
                let conversation = entry.lock();
                ConversationSummary {
                    id: conversation.id.clone(),
                    title: conversation.title.clone(),
                    updated_at: conversation.updated_at,
                    messages: conversation.tree.len(),
                }
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    /// Reads a conversation's tree under its lock.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::NotFound`] if the conversation does not exist.
    pub fn with_tree<R>(&self, id: &ConversationId, f: impl FnOnce(&ChatTree) -> R) -> Result<R, ConversationError> {
        let entry = self.entry(id)?;
        let conversation = entry.lock();
        Ok(f(&conversation.tree))
    }

    /// Mutates a conversation under its lock.
    ///
    /// On success the conversation's `updated_at` is bumped and the result is
    /// written through to the store. On failure nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::NotFound`] if the conversation does not
    /// exist, or the tree error returned by `f`.
    pub fn update<R>(
        &self,
        id: &ConversationId,
        f: impl FnOnce(&mut Conversation) -> Result<R, TreeError>,
    ) -> Result<R, ConversationError> {
        let entry = self.entry(id)?;
        let mut conversation = entry.lock();
        let out = f(&mut conversation)?;
        conversation.updated_at = self.clock.now();
        self.persist(&conversation);
        Ok(out)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Convenience operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends a message under the current leaf.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update) and [`ChatTree::append`].
    pub fn add_message(&self, id: &ConversationId, role: Role, content: impl Into<String>) -> Result<NodeId, ConversationError> {
        let now = self.clock.now();
        self.update(id, |c| c.add_message(role, content, now))
    }

    /// Branches from a message with new content.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update) and [`ChatTree::edit_node`].
    pub fn edit_message(&self, id: &ConversationId, node: &NodeId, content: impl Into<String>) -> Result<NodeId, ConversationError> {
        self.update(id, |c| c.tree.edit_node(node, content))
    }

    /// Switches the current leaf.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update) and [`ChatTree::switch_leaf`].
    pub fn switch_leaf(&self, id: &ConversationId, node: &NodeId) -> Result<(), ConversationError> {
        self.update(id, |c| c.tree.switch_leaf(node))
    }

    /// Moves to a sibling branch.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update) and [`ChatTree::navigate_to_sibling`].
    pub fn navigate_to_sibling(
        &self,
        id: &ConversationId,
        node: &NodeId,
        direction: Direction,
    ) -> Result<Option<NodeId>, ConversationError> {
        self.update(id, |c| c.tree.navigate_to_sibling(node, direction))
    }

    /// Attaches media to a message.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update) and [`ChatTree::attach_media`].
    pub fn attach_media(&self, id: &ConversationId, node: &NodeId, attachment: MediaAttachment) -> Result<(), ConversationError> {
        self.update(id, |c| c.tree.attach_media(node, attachment))
    }

    /// Flips a message's pinned flag.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update) and [`ChatTree::toggle_pin`].
    pub fn toggle_pin(&self, id: &ConversationId, node: &NodeId) -> Result<bool, ConversationError> {
        self.update(id, |c| c.tree.toggle_pin(node))
    }

    /// Renames a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::NotFound`] if the conversation does not exist.
    pub fn set_title(&self, id: &ConversationId, title: impl Into<String>) -> Result<(), ConversationError> {
        self.update(id, |c| {
            c.title = title.into();
            Ok(())
        })
    }

    /// Sets the preferred model of a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::NotFound`] if the conversation does not exist.
    pub fn set_model(&self, id: &ConversationId, model_id: impl Into<String>, provider_id: Option<String>) -> Result<(), ConversationError> {
        self.update(id, |c| {
            c.set_model(model_id, provider_id);
            Ok(())
        })
    }

    /// Copies the path to `node` into a new conversation and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::NotFound`] if the conversation does not
    /// exist, or [`TreeError::NotFound`] if the node does not.
    pub fn split(&self, id: &ConversationId, node: &NodeId) -> Result<ConversationId, ConversationError> {
        let split = {
            let entry = self.entry(id)?;
            let conversation = entry.lock();
            conversation.split(node, &self.clock)?
        };
        let split_id = self.insert(split);
        tracing::info!(conversation = %id, split = %split_id, node = %node, "conversation split");
        Ok(split_id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Loads every stored conversation, replacing in-memory copies with the same id.
    ///
    /// Every tree is validated before any is installed.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::Persistence`] if reading fails, or
    /// [`ConversationError::Corrupt`] for the first tree that violates an
    /// invariant. Nothing is installed on error.
    pub fn load_all(&self) -> Result<Vec<ConversationId>, ConversationError> {
        let Some(store) = &self.store else {
            return Ok(Vec::new());
        };
        let mut loaded: Vec<Conversation> = store.load_all()?;
        for conversation in &mut loaded {
            if let Err(violations) = conversation.tree.validate() {
                tracing::warn!(conversation = %conversation.id, count = violations.len(), "stored conversation is corrupt");
                return Err(ConversationError::Corrupt {
                    id: conversation.id.to_string(),
                    violations,
                });
            }
            conversation.tree.set_clock(self.clock.clone());
        }

        let mut entries = self.entries.write();
        let ids = loaded
            .into_iter()
            .map(|conversation| {
                let id = conversation.id.clone();
                entries.insert(id.clone(), Arc::new(Mutex::new(conversation)));
                id
            })
            .collect::<Vec<_>>();
        tracing::info!(count = ids.len(), "conversations loaded");
        Ok(ids)
    }
}
