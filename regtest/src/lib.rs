//! Regression checks for numeric and scientific test output.
//!
//! The first run of a check writes a *baseline* artifact and aborts so the
//! new file can be reviewed. Later runs write an *obtained* artifact next to
//! it and compare the two with a data-kind aware comparator: tolerance for
//! floats, exact equality elsewhere, and a structural report of missing keys,
//! incompatible kinds and differing shapes.
//!
//! # Architecture
//!
//! - `lifecycle`: the create-or-compare protocol ([`RegressionContext::perform`])
//! - `tolerance`: closeness rules shared by every comparator
//! - `structural`: key-set, kind and shape checks of keyed collections
//! - `codec`: on-disk formats (JSON, delimited text, array archives)
//! - `fixtures`: one check facade per data kind
//!
//! ```no_run
//! use regtest::{CheckOptions, DataRegression, RegressionContext, TestIdentity};
//!
//! let ctx = RegressionContext::new(
//!     "data/baseline",
//!     "data/obtained",
//!     TestIdentity::new("test_config"),
//! );
//! let data = serde_json::json!({"threads": 4, "name": "run"});
//! DataRegression::new(&ctx)
//!     .check(&data, &CheckOptions::default())
//!     .unwrap()
//!     .assert_pass();
//! ```

pub mod array;
pub mod codec;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod kind;
pub mod lifecycle;
pub mod naming;
pub mod structural;
pub mod table;
pub mod textdiff;
pub mod tolerance;
pub mod verdict;

pub use array::{ArrayData, Element, NdArray};
pub use config::Config;
pub use error::{RegressError, Result};
pub use fixtures::file::{Encoding, FileContents, FileMode, FileOptions, FileRegression, Newline};
pub use fixtures::mapping::DataRegression;
pub use fixtures::ndarray::{ArrayComparison, ArrayOptions, ArrayRegression};
pub use fixtures::sequence::{Scalar, ValueOptions, ValueRegression};
pub use fixtures::tabular::{TableOptions, TableRegression};
pub use fixtures::ToleranceOptions;
pub use kind::Kind;
pub use lifecycle::{Artifact, CheckOptions, Comparison, RegressionContext};
pub use naming::{DataDirs, TestIdentity};
pub use structural::{Mismatch, StructuralDiff, Structured};
pub use table::{Column, Table};
pub use tolerance::{is_close, Tolerance, Tolerances};
pub use verdict::Verdict;
