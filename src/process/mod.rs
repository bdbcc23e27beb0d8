// src/process/mod.rs
//! Turning fetched rows into upload-safe rows.

pub mod convert;
pub mod date_parser;
pub mod split;
pub mod trimming;

pub use convert::{convert_cell, normalize_rows, CellError, Normalized};
pub use split::{part_count, split_into};
