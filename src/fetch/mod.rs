// src/fetch/mod.rs

pub mod archive;

pub use archive::{download_zip, extract_zip, fetch_and_extract, rename_extracted};
