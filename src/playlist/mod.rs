pub mod assembler;
pub mod config;
pub mod generator;
pub mod metadata;
pub mod recommender;
pub mod scoring;
pub mod track;

pub use assembler::*;
pub use config::*;
pub use generator::*;
pub use metadata::*;
pub use track::*;
