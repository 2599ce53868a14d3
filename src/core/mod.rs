pub mod date_parser;
pub mod state_machine;
