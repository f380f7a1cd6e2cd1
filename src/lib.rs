pub mod application;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod infra;
