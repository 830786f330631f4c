//! Session vector indexes, their registry, and query answering

pub mod index;
pub mod orchestrator;
pub mod registry;

pub use index::{IndexStats, SearchHit, SessionIndex};
pub use orchestrator::{QueryEngine, QuerySettings, QueryStage};
pub use registry::{generate_session_id, IndexRegistry};
