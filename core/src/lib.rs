pub mod categorize;
pub mod clock;
pub mod db;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod models;
pub mod scheduler;
pub mod service;
pub mod storage;
