//! Library crate for game-night-back: a bar trivia and prediction game where hosts push timed
//! prompts and patrons answer from their phones, earning more points the faster they answer.
//!
//! Exposes modules for binaries and integration tests.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
