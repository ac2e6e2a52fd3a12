pub mod check;
pub mod config;
pub mod info;
pub mod track;
