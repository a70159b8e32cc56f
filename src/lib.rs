pub mod arguments;
pub mod config;
pub mod context;
pub mod errors;
pub mod logger;
pub mod paths;
pub mod rpc;
pub mod webserver;
