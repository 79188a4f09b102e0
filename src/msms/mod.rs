pub mod annotator;
pub mod fragmentation;
pub mod model;
pub mod search;
pub mod stats;
