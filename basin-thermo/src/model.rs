//! Concrete property and reaction packages.

mod aqueous;
mod biogas;
mod kinetics;

pub use aqueous::AqueousPackage;
pub use biogas::BiogasPackage;
pub use kinetics::{DissolvedCo2, FirstOrderKinetics};

/// Universal gas constant, J/(kmol K).
pub const GAS_CONSTANT: f64 = 8314.462_618;
