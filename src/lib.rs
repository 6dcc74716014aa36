//! Carta de Moçambique digest
//!
//! This crate periodically scrapes the Carta de Moçambique front page,
//! stores new articles under their category, and keeps a registry of phone
//! numbers subscribed to article notifications.

pub mod config;
pub mod dates;
pub mod db;
pub mod fetcher;
pub mod ingest;
pub mod listing;
pub mod notify;
pub mod routes;
pub mod slug;
pub mod subscriptions;
