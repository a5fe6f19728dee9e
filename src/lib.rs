pub mod archive;
pub mod config;
pub mod error;
pub mod prune;
pub mod run;
pub mod storage;

#[cfg(test)]
mod testutil;
