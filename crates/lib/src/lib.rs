//! osiris-lib: build log aggregation for OpenShift builds
//!
//! This crate provides the pieces of the Osiris aggregator:
//! - `normalize`: turns platform events, build resources and canonical
//!   documents into one `BuildRecord`
//! - `store`: content-addressed storage of build records over an object store
//! - `paginate`: cursor-based listing of stored records
//! - `delivery`: retrying client that forwards watched events to the hooks
//! - `service`: the hook flows and read paths, with error translation

pub mod build;
pub mod cluster;
pub mod config;
pub mod consts;
pub mod delivery;
pub mod error;
pub mod hook;
pub mod normalize;
pub mod paginate;
pub mod platform;
pub mod service;
pub mod store;
pub mod util;
