//! Live Reload Message Protocol
//!
//! JSON message sent to every connected browser after a rebuild:
//!
//! ```json
//! {"eventType":"FileModified","fileName":"web/styles.css","fileExt":".css"}
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::actor::messages::{WatchEvent, dotted_ext};

/// Kind of change being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    FileModified,
}

/// Notification sent over WebSocket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub event_type: EventType,
    /// Path of the file that triggered the rebuild, as observed
    pub file_name: String,
    /// Extension with leading dot, e.g. `.css`
    pub file_ext: String,
}

impl NotificationMessage {
    pub fn file_modified(path: &Path) -> Self {
        Self {
            event_type: EventType::FileModified,
            file_name: path.display().to_string(),
            file_ext: dotted_ext(path),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&WatchEvent> for NotificationMessage {
    fn from(event: &WatchEvent) -> Self {
        Self::file_modified(&event.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::messages::WatchOp;

    #[test]
    fn test_wire_format() {
        let event = WatchEvent::new("web/styles.css", WatchOp::Write);
        let json = NotificationMessage::from(&event).to_json().unwrap();
        assert_eq!(
            json,
            r#"{"eventType":"FileModified","fileName":"web/styles.css","fileExt":".css"}"#
        );
    }

    #[test]
    fn test_parse_back() {
        let json = r#"{"eventType":"FileModified","fileName":"src/main.rs","fileExt":".rs"}"#;
        let msg: NotificationMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg, NotificationMessage::file_modified(Path::new("src/main.rs")));
    }
}
