// SmartMark state managers
// Managers handle stateful operations: the bookmark view-model, local bookmark rows, persisted sessions.

pub mod bookmark_manager;
pub mod session_manager;
pub mod view_model;
