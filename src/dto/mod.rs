pub mod admin;
pub mod chat;
pub mod common;
pub mod health;
pub mod phase;
pub mod public;
pub mod sse;
pub mod validation;
pub mod votes;
