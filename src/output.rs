pub mod clean;

pub use clean::{OBJECT_EXTENSION, StaleOutputCleaner, object_file_for};
