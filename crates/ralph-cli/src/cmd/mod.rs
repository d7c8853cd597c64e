pub mod iterate;
pub mod plan;
pub mod state;
