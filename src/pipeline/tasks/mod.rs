//! Concrete task types.

mod fit_sim_data;
mod init_raw_data;
mod simulation;
mod validation;
mod variant_sim_data;

pub use fit_sim_data::{CacheOutcome, FitSimData};
pub use init_raw_data::InitRawData;
pub use simulation::{Simulation, DAUGHTERS, FINAL_STATE, GRANT_RECORDS, LISTENER_RECORDS};
pub use validation::{InitRawValidationData, InitValidationData};
pub use variant_sim_data::VariantSimData;
