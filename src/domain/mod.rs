// Domain layer: measurements, estimate results, analysis documents and ports.

pub mod analysis;
pub mod estimate;
pub mod model;
pub mod ports;
