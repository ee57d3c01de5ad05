//! Photo metadata catalog built around a single `photo` table.

pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod scanner;

pub use config::Config;
pub use db::{Column, Database, NewPhoto, Photo, PhotoError, PhotoQuery, PhotoUpdate};
