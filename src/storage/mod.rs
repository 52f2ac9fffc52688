//! Storage layer - heap files and page formats.
//!
//! This module handles persistent storage:
//! - [`HeapFile`] - A table as an array of fixed-size pages on disk
//! - [`DbFile`] - The page-provider contract the buffer pool consumes
//! - [`Catalog`] - Table id to file resolution
//! - [`page`] - Page types and layouts

mod catalog;
mod db_file;
mod heap_file;
pub mod page;

pub use catalog::Catalog;
pub use db_file::DbFile;
pub use heap_file::{HeapFile, HeapFileIter};
