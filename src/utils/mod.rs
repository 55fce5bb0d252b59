pub mod file_ops;
pub mod naming;
pub mod parallel;
pub mod reporting;
