// SmartMark services
// Services provide the collaborators (Supabase, local), crypto and settings.

pub mod backend;
pub mod crypto_service;
pub mod local_backend;
pub mod settings_engine;
pub mod supabase_backend;
