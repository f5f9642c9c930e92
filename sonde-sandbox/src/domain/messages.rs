//! Worker message protocol

use serde::{Deserialize, Serialize};

use sonde_core::domain::finding::{EvidencePointer, Finding};

/// Message sent from a sandbox worker back to the host
///
/// The first `Result` or `Error` message is terminal; `Log` and `Evidence`
/// messages before it are forwarded to observability and never affect
/// control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SandboxMessage {
    /// Log line emitted by the plugin
    Log { message: String },
    /// Evidence pointer discovered during probing
    Evidence { pointer: EvidencePointer },
    /// Terminal: the plugin completed with these findings
    Result { findings: Vec<Finding> },
    /// Terminal: the plugin failed or the worker crashed
    Error { message: String },
}

impl SandboxMessage {
    /// Whether this message ends the invocation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(SandboxMessage::Result { findings: vec![] }.is_terminal());
        assert!(SandboxMessage::Error {
            message: "boom".into()
        }
        .is_terminal());
        assert!(!SandboxMessage::Log {
            message: "probing".into()
        }
        .is_terminal());
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&SandboxMessage::Log {
            message: "hello".into(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"log\""));
    }
}
