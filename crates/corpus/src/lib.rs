pub mod error;
pub mod loader;

pub use error::Error;
pub use loader::{load_final_hypothesis, load_gold, load_increco};
