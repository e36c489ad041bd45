pub mod cli;
pub mod client;
pub mod config;
pub mod consts;
pub mod credentials;
pub mod executor;
pub mod main_actions;
pub mod manager;
pub mod operations;
pub mod registry;
pub mod request;
pub mod template;
pub mod transformer;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod test_utils;
