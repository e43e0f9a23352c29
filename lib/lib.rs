pub mod api_client;
pub mod batch;
pub mod build_info;
pub mod cli;
pub mod config;
pub mod data_source;
pub mod import;
pub mod logging;
pub mod report;
pub mod request;
pub mod response;

#[cfg(test)]
mod test_support;
