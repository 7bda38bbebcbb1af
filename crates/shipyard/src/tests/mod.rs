//! Test suites for the pipeline.

pub(crate) mod support;
