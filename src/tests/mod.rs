//! Binary-crate test modules.
