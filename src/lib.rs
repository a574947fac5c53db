//! Royal Chess 100: game orchestration over an external search engine.
pub mod board;
pub mod engine;
pub mod game;
pub mod rules;

pub use game::GameController;
