pub mod config {
    pub use progenitor_core::config::*;
}
pub mod state {
    pub use progenitor_core::state::*;
}
pub mod data {
    pub use progenitor_data::*;
}

pub mod cell;
pub mod fitter;
pub mod knowledge_base;
pub mod validation;
pub mod variants;
