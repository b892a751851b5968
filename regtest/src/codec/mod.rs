//! On-disk formats for baselines and obtained results.
//!
//! Each codec writes deterministically: the same value always produces the
//! same bytes, so baselines do not churn under version control.

pub mod csv;
pub mod json;
pub mod npz;
