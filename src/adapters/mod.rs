//! Adapters - concrete implementations of ports (traits)

mod software_element;

// Re-export for convenience
pub use software_element::{SoftwareElement, SoftwareFinder};
