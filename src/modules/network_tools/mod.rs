pub mod model;

// Re-export the main types for easy access
pub use model::*;
