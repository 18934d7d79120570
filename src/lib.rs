// HTTP API
pub mod api;

// Request cookies and application session detection
pub mod auth;

// Startup configuration
pub mod config;

// Encrypted credential persistence
pub mod credentials;

// Authenticated request gate
pub mod gate;

// Gmail reads
pub mod gmail;

// Google OAuth client
pub mod oauth;
