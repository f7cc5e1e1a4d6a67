//! Reusable transaction steps.

pub mod asset;
pub mod files;
pub mod item;
pub mod resource;
