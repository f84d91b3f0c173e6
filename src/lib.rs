//! authlink - credential and identity-linking service.
//!
//! Accounts with password login, bearer access tokens, idempotent service
//! tokens, roles, and a two-step verification handshake that links an
//! account to a secondary identity through a short-lived numeric code.
//!
//! The orchestrator ([`service::AuthService`]) depends only on the
//! [`store::AccountStore`] and [`codes::CodeStore`] capabilities; SQLite,
//! redb and in-memory backends plug in behind them.

pub mod codes;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod http;
pub mod metrics;
pub mod model;
pub mod security;
pub mod service;
pub mod store;
pub mod telemetry;
