//! Adapters for the ports in [`crate::ports`].

mod characterizer;
mod local_staging;
pub mod memory;
mod virus;

pub use characterizer::BasicCharacterizer;
pub use local_staging::LocalStagingArea;
pub use virus::{EICAR_SIGNATURE, SignatureScanner};
