//! Core scan data model and shared helpers for the formatter engine.

pub mod model;
pub mod trace;

pub use model::*;

/// Delimiter used when several values are flattened into one text column.
pub const DEFAULT_DELIMITER: &str = ", ";

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }
}
