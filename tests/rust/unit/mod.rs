//! Unit tests - public SQL text helpers and compiler entry points
//!
//! No files or environment involved; everything is built in memory.

mod compile_entry_point_tests;
mod sql_text_tests;
