//! Shared utilities: single-slot memoization and the categorical palette.

pub mod memo;
pub mod palette;
