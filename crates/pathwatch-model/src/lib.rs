//! Observable directory tree model, reconciled against snapshots.

mod error;
mod mirror;
mod model;
mod node;
mod reporter;

pub use error::ModelError;
pub use mirror::{TreeMirror, watch_tree};
pub use model::DirectoryModel;
pub use node::{DirectoryItem, FileItem, TreeNode};
pub use reporter::{ChannelReporter, ModelEvent, Reporter};
