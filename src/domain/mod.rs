// Core value types
pub mod types;

// Domain-specific error types
pub mod errors;

// Port interfaces
pub mod ports;

// Baseline profile and deviation classifier
pub mod baseline;

// Feature schema
pub mod ml;
