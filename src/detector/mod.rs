//! Chat sampling, behaviour classification and viewer estimation.
//!
//! Data only flows one way: message source, then [`collector`], then
//! [`classifier`], then [`estimator`], and finally a record handed to the
//! sink. [`scheduler`] repeats that on a fixed interval and reports progress
//! through [`status`].

pub mod classifier;
pub mod collector;
pub mod estimator;
pub mod scheduler;
pub mod shutdown;
pub mod status;

pub use classifier::{assess_author, classify, AuthorVerdict, ClassifierSettings};
pub use collector::{Lexicon, WindowCollector};
pub use estimator::{estimate, EstimatorSettings};
pub use scheduler::CycleScheduler;
pub use shutdown::ShutdownSignal;
pub use status::{StatusPublisher, StatusSnapshot};
