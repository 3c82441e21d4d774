pub mod config;
pub mod logging;

pub mod anchors;
pub mod filter;
pub mod host;
pub mod redirect;
pub mod resolver;
pub mod rewrite;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;
