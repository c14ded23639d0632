pub mod config;
pub mod driver;
pub mod errors;
pub mod export;
pub mod fonts;
pub mod information;
pub mod input;
pub mod output;
pub mod record;
pub mod render;
pub mod report;
pub mod repository;
pub mod schema;
