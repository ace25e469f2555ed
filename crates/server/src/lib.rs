pub mod auth;
pub mod config;
pub mod db;
pub mod error_convert;
pub mod health;
pub mod lifecycle;
pub mod mailgun;
pub mod notify;
pub mod openapi;
pub mod rate_limit;
pub mod repo;
pub mod rest;
pub mod storage;
pub mod telemetry;
pub mod typst;
