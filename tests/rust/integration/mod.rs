//! Integration tests - Compile load plans from YAML mapping, plan and config files
//!
//! These tests drive the public API the way the CLI does: files on disk, a
//! configured dialect, and a full compilation.

mod file_loading_tests;
mod inheritance_tests;
