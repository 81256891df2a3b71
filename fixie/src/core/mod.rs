//! Pure logic: script parsing, line cleanup, sentinel detection.
//!
//! Nothing in here spawns processes or touches the filesystem, apart from
//! `Script::load` reading the script text.

pub mod fragment;
pub mod function_ref;
pub mod script;
pub mod sentinel;
