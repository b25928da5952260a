pub mod events;
pub mod fetcher;
pub mod freshness;
pub mod lister;
pub mod paths;
pub mod records;
pub mod resolver;
pub mod walker;
