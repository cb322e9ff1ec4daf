pub mod commands;
pub mod globalsettings;
pub mod jobfile;
