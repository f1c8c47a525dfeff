//! Command implementations for the locpatch CLI

pub mod apply;
pub mod check;
pub mod completions;
pub mod helpers;
pub mod lint;
pub mod version;
