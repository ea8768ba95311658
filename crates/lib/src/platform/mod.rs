//! Filesystem locations used by the aggregator.

pub mod paths;
