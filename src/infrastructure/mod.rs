pub mod defensive;
pub mod market;
pub mod observability;
pub mod persistence;
