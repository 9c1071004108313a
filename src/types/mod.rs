// SmartMark shared type definitions
// Each submodule defines types used across the view-model, collaborators and RPC layer.

pub mod bookmark;
pub mod errors;
pub mod session;
pub mod settings;
pub mod view;
