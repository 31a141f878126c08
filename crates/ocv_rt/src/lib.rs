pub mod board;
pub mod clipboard;
pub mod engine;
pub mod persistence;
pub mod recognition;
