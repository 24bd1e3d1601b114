/// Database model definitions.
pub mod models;
/// Prompt store trait and its backends.
pub mod prompt_store;
/// Storage abstraction layer for database operations.
pub mod storage;
