//! Branching conversation trees for Atelier.
//!
//! A conversation is a tree of [`MessageNode`]s. Editing a message never
//! rewrites history: it creates a sibling branch and moves the current leaf
//! there, so every earlier branch stays reachable.
//!
//! - [`ChatTree`] - The node arena with its root and current leaf, plus the
//!   structural operations (append, edit, switch, navigate, split) and
//!   [`validate`](ChatTree::validate).
//! - [`Conversation`] - A titled tree with its preferred model.
//! - [`Conversations`] - Concurrent manager over many conversations with
//!   optional write-through persistence.
//!
//! # Example
//!
//! ```
//! use atelier_tree::{Conversations, Role};
//!
//! let conversations = Conversations::default();
//! let id = conversations.create();
//! let question = conversations.add_message(&id, Role::User, "Draw a fox").unwrap();
//! conversations.add_message(&id, Role::Assistant, "Here it is").unwrap();
//!
//! // Branch: the original answer stays in the tree.
//! let edited = conversations.add_message(&id, Role::User, "Now in winter").unwrap();
//! let alt = conversations.edit_message(&id, &edited, "Now in spring").unwrap();
//!
//! let path = conversations
//!     .with_tree(&id, |tree| tree.active_path().map(|n| n.id.clone()).collect::<Vec<_>>())
//!     .unwrap();
//! assert_eq!(path.first(), Some(&question));
//! assert_eq!(path.last(), Some(&alt));
//! ```

mod conversation;
mod error;
mod manager;
mod node;
mod tree;

pub use conversation::{Conversation, ConversationId, DEFAULT_TITLE, derive_title};
pub use error::{ConversationError, TreeError, Violation};
pub use manager::{ConversationSummary, Conversations};
pub use node::{AttachmentId, MediaAttachment, MediaKind, MessageNode, NodeId, Role};
pub use tree::{ChatTree, Direction, Path, SiblingPosition};
