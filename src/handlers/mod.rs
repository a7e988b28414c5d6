pub mod configurations;
pub mod contracts;
pub mod financial;
pub mod risks;
pub mod uppf;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
