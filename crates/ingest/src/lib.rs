//! Listing ingestion: source adapters, structural validation and the
//! rejection side channel.
//!
//! A raw source record either becomes a `ValidatedAsset` or a
//! `RejectionRecord`; nothing in between ever reaches the pipeline, and
//! rejections never travel with pipeline output.

pub mod adapter;
pub mod feed;
pub mod rejection;
pub mod validate;

pub use adapter::*;
pub use feed::*;
pub use rejection::*;
pub use validate::*;
