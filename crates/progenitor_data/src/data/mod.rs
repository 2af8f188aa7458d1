//! Core data structures for the Progenitor pipeline and simulation.

pub mod knowledge;
pub mod record;
pub mod sim_data;
pub mod state;
pub mod validation;
pub mod variant;
