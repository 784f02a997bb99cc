pub mod config;
pub mod fetch;
pub mod humanize;
pub mod observability;
pub mod repos;
pub mod resolver;
pub mod storage;
