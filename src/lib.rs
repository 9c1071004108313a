//! SmartMark: a personal bookmark manager.
//!
//! The core is [`managers::view_model::BookmarkViewModel`], which keeps the
//! signed-in user's bookmarks in sync with a [`services::backend::BookmarkBackend`]
//! (hosted Supabase or local SQLite) and derives the searchable view.
//!
//! This library crate exposes all modules for use by the binaries and integration tests.

pub mod app;
pub mod database;
pub mod logging;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
