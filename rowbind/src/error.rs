//! Error types for binding setup and reconciliation.

use thiserror::Error;

/// Errors raised synchronously while establishing a binding.
///
/// These are configuration mistakes and are never recovered from.
#[derive(Debug, Clone, Error)]
pub enum BindError {
    /// The container holds no content node to use as the row template.
    #[error("container has no content node to use as a row template")]
    NoTemplate,

    /// The container holds more than one content node; the template is
    /// ambiguous.
    #[error("container has {count} content nodes; a binding needs exactly one template")]
    AmbiguousTemplate {
        /// How many content nodes were found.
        count: usize,
    },
}

/// Errors surfaced by a reconciliation turn.
///
/// Any of these abandons the current drain; the binding stops re-arming
/// its scheduler until disposed or refreshed.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The host tree rejected a batched attach twice in a row.
    #[error("host tree rejected attach after retry: {0}")]
    AttachRejected(String),

    /// Debug-mode consistency check failed: the rendered slot count no
    /// longer matches the backing list. Indicates an engine bug, never
    /// well-formed input.
    #[error("rendered {rendered} slots but backing list has {expected}")]
    StoreDesync {
        /// Number of slots currently in the node store.
        rendered: usize,
        /// Length of the backing list snapshot being applied.
        expected: usize,
    },
}
