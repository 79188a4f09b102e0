pub mod constants;
pub mod sequence;
pub mod table;
