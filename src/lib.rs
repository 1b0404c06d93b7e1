//! Parse an NMON file. Output one .csv file per metric type (CPU_ALL, MEM...).

pub mod classify;
pub mod error;
pub mod resolve;
pub mod split;
