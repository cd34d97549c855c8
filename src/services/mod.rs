pub mod dataset;
pub mod import;
pub mod recommendation;
pub mod training;
