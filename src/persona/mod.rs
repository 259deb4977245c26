pub mod generator;
pub mod record;
pub mod schema;

pub use generator::{PersonaGenerator, PhotoOutcome};
pub use record::PersonaField;
