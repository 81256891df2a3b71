//! Side-effecting pieces: config, first-run setup, the shell session and the
//! syntax-check oracle.

pub mod config;
pub mod init;
pub mod oracle;
pub mod session;
