pub mod audit;
pub mod auth;
pub mod host;

// Re-export main types
pub use audit::{AuditEvent, AuditPhase};
pub use auth::{AuthMethod, AuthMethodSet};
pub use host::{ConnectOptions, HostKeyPolicy, HostRecord, DEFAULT_SSH_PORT};
