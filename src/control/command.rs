//! Control commands

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProtocolError;

/// A decoded control command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    Start,
    Stop,
    AddUrl { url: String },
    RemoveUrl { url: String },
    Status,
    ListUrls,
}

impl Command {
    /// Every action name the protocol accepts
    pub const ACTIONS: [&'static str; 6] =
        ["start", "stop", "add_url", "remove_url", "status", "list_urls"];

    /// Decode one control message
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let Some(object) = value.as_object() else {
            return Err(ProtocolError::Malformed("expected a JSON object".into()));
        };
        let Some(action) = object.get("action").and_then(Value::as_str) else {
            return Err(ProtocolError::Malformed("missing string field 'action'".into()));
        };
        let Some(action) = Self::ACTIONS.iter().copied().find(|a| *a == action) else {
            return Err(ProtocolError::UnknownAction(action.to_string()));
        };

        if matches!(action, "add_url" | "remove_url") {
            match object.get("url").and_then(Value::as_str) {
                Some(url) if !url.trim().is_empty() => {}
                _ => {
                    return Err(ProtocolError::MissingField {
                        action,
                        field: "url",
                    })
                }
            }
        }

        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Action name, echoed in the response
    pub fn action(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::AddUrl { .. } => "add_url",
            Command::RemoveUrl { .. } => "remove_url",
            Command::Status => "status",
            Command::ListUrls => "list_urls",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_actions() {
        assert_eq!(Command::decode(r#"{"action":"start"}"#), Ok(Command::Start));
        assert_eq!(Command::decode(r#"{"action":"list_urls"}"#), Ok(Command::ListUrls));
        assert_eq!(
            Command::decode(r#"{"action":"add_url","url":"rtmp://a/live/1"}"#),
            Ok(Command::AddUrl {
                url: "rtmp://a/live/1".into()
            })
        );
    }

    #[test]
    fn test_extra_fields_ignored() {
        let command = Command::decode(r#"{"action":"stop","id":17}"#).unwrap();
        assert_eq!(command, Command::Stop);
        assert_eq!(command.action(), "stop");
    }

    #[test]
    fn test_unknown_action() {
        assert_eq!(
            Command::decode(r#"{"action":"bogus"}"#),
            Err(ProtocolError::UnknownAction("bogus".into()))
        );
    }

    #[test]
    fn test_missing_url() {
        for text in [
            r#"{"action":"add_url"}"#,
            r#"{"action":"add_url","url":""}"#,
            r#"{"action":"add_url","url":42}"#,
        ] {
            assert_eq!(
                Command::decode(text),
                Err(ProtocolError::MissingField {
                    action: "add_url",
                    field: "url"
                })
            );
        }

        assert!(matches!(
            Command::decode(r#"{"action":"remove_url"}"#),
            Err(ProtocolError::MissingField { action: "remove_url", .. })
        ));
    }

    #[test]
    fn test_malformed() {
        for text in ["", "not json", "[1,2]", r#"{"url":"rtmp://a/1"}"#, r#"{"action":3}"#] {
            assert!(
                matches!(Command::decode(text), Err(ProtocolError::Malformed(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn test_action_names_round_trip() {
        for action in Command::ACTIONS {
            let text = format!(r#"{{"action":"{action}","url":"rtmp://a/1"}}"#);
            assert_eq!(Command::decode(&text).unwrap().action(), action);
        }
    }
}
