pub mod config;
pub mod db;
pub mod handlers;
pub mod messenger;
pub mod render;
