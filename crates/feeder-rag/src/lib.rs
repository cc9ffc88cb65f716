//! Query-time half of the pipeline: nearest-chunk retrieval, context
//! assembly, and conversation turns against a generation backend.

pub mod history;
pub mod retrieve;
pub mod session;

pub use history::{ConversationState, HistoryPolicy};
pub use retrieve::{build_context, retrieve, Retriever};
pub use session::{RagSession, Turn};
