pub mod backup;
pub mod config;
pub mod sync;
pub mod token_provider;
