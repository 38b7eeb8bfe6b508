pub mod anchor;
pub mod scorer;

pub use anchor::ReferenceStore;
pub use scorer::relevance_score;
