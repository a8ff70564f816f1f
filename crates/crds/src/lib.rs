//! CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the MAAS machine
//! admission webhook.

pub mod machine;

pub use machine::*;
