//! Theoretic ion generation and tolerance matching for annotating
//! proteoform-spectrum matches against the peak lists of one or more
//! deconvolution programs.

pub mod chemistry;
pub mod config;
pub mod errors;
pub mod io;
pub mod ms;
pub mod msms;

pub use config::AnalysisConfig;
pub use errors::{Error, Result};
