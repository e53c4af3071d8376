//! The incremental classification pipeline.
//!
//! A fill pass flows:
//! 1. `ClassificationCache::count()`: how far from target?
//! 2. `MailboxSource::fetch_batch()`: exactly the shortfall
//! 3. `Classifier::classify()`: three axis prompts per new message
//! 4. `ClassificationCache::put_with_ttl()`: durable, idempotent per id

pub mod classifier;
pub mod fill;
pub mod types;

pub use classifier::Classifier;
pub use fill::FillController;
