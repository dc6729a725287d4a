pub mod config;
pub mod helpers;
pub mod history;
pub mod replay;
pub mod score;
