// Re-export all model types for ease of use

pub mod ids;
pub mod probe;
pub mod value;

pub use ids::*;
pub use probe::*;
pub use value::*;
