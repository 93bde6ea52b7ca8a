//! Library crate for album-club-back: room state store, phase derivation and the listening
//! session, exposed for the server binary, the OpenAPI generator and embedding clients.

pub mod config;
pub mod dao;
mod dto;
mod error;
pub mod routes;
pub mod services;
pub mod state;
