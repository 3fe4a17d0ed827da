pub mod assemblies;
pub mod coverage;
pub mod keywords;
pub mod pricing;
pub mod systems;
