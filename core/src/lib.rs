pub mod builder;
pub mod encoding;
pub mod models;
pub mod retrieval;
pub mod store;
pub mod tokenizer;

pub use builder::Indexer;
pub use retrieval::Searcher;
pub use store::{Field, IndexStore, PageId, WordId};
