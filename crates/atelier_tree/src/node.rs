//! Message nodes and their media attachments.

use atelier_core::{Timestamp, define_id};
use serde::{Deserialize, Serialize};

define_id! {
    /// Identifier of a [`MessageNode`].
    pub struct NodeId("msg");
}

define_id! {
    /// Identifier of a [`MediaAttachment`].
    pub struct AttachmentId("att");
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the conversation.
    System,
    /// The human participant.
    User,
    /// The model.
    Assistant,
    /// Structured data injected into the conversation.
    Data,
}

/// Kind of media attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A still image.
    Image,
    /// A video clip.
    Video,
}

/// Generated media attached to a message. Immutable once attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAttachment {
    /// Unique identifier.
    pub id: AttachmentId,
    /// Media kind.
    pub kind: MediaKind,
    /// Where the media lives.
    pub url: String,
    /// Optional preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// The prompt that produced the media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl MediaAttachment {
    /// Creates an attachment with a fresh id.
    #[must_use]
    pub fn new(kind: MediaKind, url: impl Into<String>) -> Self {
        Self {
            id: AttachmentId::generate(),
            kind,
            url: url.into(),
            thumbnail_url: None,
            prompt: None,
        }
    }

    /// Sets the thumbnail url.
    #[must_use]
    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// Sets the originating prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

/// One turn in a conversation.
///
/// `parent` and `children` are owned by the [`ChatTree`](crate::ChatTree):
/// a node handed to the tree must be detached (no parent, no children) and
/// the tree wires it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNode {
    /// Unique identifier.
    pub id: NodeId,
    /// Author.
    pub role: Role,
    /// Text content.
    pub content: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// When the node was created.
    pub created_at: Timestamp,
    pub(crate) attachments: Vec<MediaAttachment>,
    /// References to images supplied as model input.
    #[serde(default)]
    pub vision_inputs: Vec<String>,
    /// UI flag: the node is being edited.
    #[serde(default)]
    pub editing: bool,
    /// UI flag: the node is pinned.
    #[serde(default)]
    pub pinned: bool,
}

impl MessageNode {
    /// Creates a detached node with a fresh id.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            id: NodeId::generate(),
            role,
            content: content.into(),
            parent: None,
            children: Vec::new(),
            created_at,
            attachments: Vec::new(),
            vision_inputs: Vec::new(),
            editing: false,
            pinned: false,
        }
    }

    /// Adds a vision input reference.
    #[must_use]
    pub fn with_vision_input(mut self, reference: impl Into<String>) -> Self {
        self.vision_inputs.push(reference.into());
        self
    }

    /// The parent node, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    /// Child ids in branch order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Attached media in attachment order.
    #[must_use]
    pub fn attachments(&self) -> &[MediaAttachment] {
        &self.attachments
    }

    /// Returns `true` if the node has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.parent.is_none() && self.children.is_empty()
    }
}
