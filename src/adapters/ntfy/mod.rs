//! ntfy Adapter
//!
//! Notifier port implementation publishing to an ntfy server.

mod notifier;

pub use notifier::{encode_for_transport, NtfyConfig, NtfyNotifier, DEFAULT_NTFY_SERVER};
