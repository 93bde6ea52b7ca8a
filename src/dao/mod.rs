/// Database model definitions.
pub mod models;
/// Room, chat and vote persistence backends.
pub mod room_store;
/// Storage abstraction layer for database operations.
pub mod storage;
