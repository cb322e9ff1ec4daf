pub mod script;
pub mod venv;
pub mod wait;
