pub mod activity;
pub mod builder;
pub mod cell;
pub mod condition;
pub mod config;
pub mod context;
pub mod models;
pub mod report;
pub mod resource;
pub mod schema;
pub mod simulation;
pub mod task;
pub mod time;
