pub mod fen;
pub mod message;
pub mod model;
pub mod replay;
pub mod selectors;
pub mod tree;
pub mod update;
