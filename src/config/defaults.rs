//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::SocketAddr;

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

pub fn default_request_timeout_ms() -> u64 {
    10_000
}

// =============================================================================
// Storage Defaults
// =============================================================================

pub fn default_database_path() -> String {
    "authlink.db".to_string()
}

pub fn default_code_store_path() -> String {
    "codes.redb".to_string()
}

pub fn default_prune_interval_secs() -> u64 {
    60
}

// =============================================================================
// Auth Code Defaults
// =============================================================================

pub fn default_code_length() -> usize {
    6
}

pub fn default_code_ttl_secs() -> u64 {
    300
}

pub fn default_write_timeout_ms() -> u64 {
    5_000
}

// =============================================================================
// Password Defaults
// =============================================================================

pub fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}
