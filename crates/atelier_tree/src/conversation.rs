//! Conversation metadata wrapped around a [`ChatTree`].

use crate::error::TreeError;
use crate::node::{MessageNode, NodeId, Role};
use crate::tree::ChatTree;
use atelier_core::{Clock, Timestamp, define_id};
use atelier_persistence::Storable;
use serde::{Deserialize, Serialize};

define_id! {
    /// Identifier of a [`Conversation`].
    pub struct ConversationId("conv");
}

/// Title given to conversations before their first user message.
pub const DEFAULT_TITLE: &str = "New Conversation";

const TITLE_MAX_CHARS: usize = 40;

/// Derives a title from a message: the first 40 characters, with `...`
/// appended when the message is longer.
#[must_use]
pub fn derive_title(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// A titled conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique identifier.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Preferred model for this thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Preferred provider for this thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// When the conversation was created.
    pub created_at: Timestamp,
    /// When the conversation last changed.
    pub updated_at: Timestamp,
    /// The message tree.
    pub tree: ChatTree,
}

impl Storable for Conversation {
    fn collection() -> &'static str {
        "conversations"
    }
}

impl Conversation {
    /// Creates an empty conversation titled [`DEFAULT_TITLE`].
    #[must_use]
    pub fn new(clock: &Clock) -> Self {
        let now = clock.now();
        Self {
            id: ConversationId::generate(),
            title: DEFAULT_TITLE.to_string(),
            model_id: None,
            provider_id: None,
            created_at: now,
            updated_at: now,
            tree: ChatTree::with_clock(clock.clone()),
        }
    }

    /// Appends a message under the current leaf.
    ///
    /// When the message is the first in the conversation and comes from the
    /// user, the title is derived from it.
    ///
    /// # Errors
    ///
    /// See [`ChatTree::append`].
    pub fn add_message(&mut self, role: Role, content: impl Into<String>, now: Timestamp) -> Result<NodeId, TreeError> {
        let node = MessageNode::new(role, content, now);
        let first_user_message = self.tree.is_empty() && role == Role::User;
        let title = first_user_message.then(|| derive_title(&node.content));

        let id = self.tree.append(node)?;
        if let Some(title) = title {
            self.title = title;
        }
        self.updated_at = now;
        Ok(id)
    }

    /// Sets the preferred model and provider.
    pub fn set_model(&mut self, model_id: impl Into<String>, provider_id: Option<String>) {
        self.model_id = Some(model_id.into());
        self.provider_id = provider_id;
    }

    /// Copies the path to `node_id` into a new conversation titled
    /// `Split: <title>`.
    ///
    /// # Errors
    ///
    /// See [`ChatTree::split_at`].
    pub fn split(&self, node_id: &NodeId, clock: &Clock) -> Result<Conversation, TreeError> {
        let tree = self.tree.split_at(node_id)?;
        let now = clock.now();
        Ok(Self {
            id: ConversationId::generate(),
            title: format!("Split: {}", self.title),
            model_id: self.model_id.clone(),
            provider_id: self.provider_id.clone(),
            created_at: now,
            updated_at: now,
            tree,
        })
    }
}
