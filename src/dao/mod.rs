/// Database entity definitions.
pub mod models;
/// Session and score store traits plus backends.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
