// src/lib.rs

//! Faculty Crawler Library
//!
//! Breadth-first discovery of faculty profile pages on university
//! department websites.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;
