/*
[INPUT]:  Session keys and subscription requests
[OUTPUT]: Newline-terminated JSON feed commands
[POS]:    Feed layer - outbound command encoding
[UPDATE]: When adding feed commands or changing their argument layout
*/

use serde::Serialize;
use serde_json::{Map, Value};

use crate::http::{NordnetError, Result};
use crate::types::SERVICE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedCommandKind {
    Login,
    Subscribe,
    Unsubscribe,
}

/// `{"cmd": ..., "args": {...}}`; field order is part of the wire format
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedCommand {
    pub cmd: FeedCommandKind,
    pub args: Map<String, Value>,
}

impl FeedCommand {
    pub fn login(session_key: &str) -> Self {
        let mut args = Map::new();
        args.insert("session_key".to_string(), Value::from(session_key));
        args.insert("service".to_string(), Value::from(SERVICE));
        Self {
            cmd: FeedCommandKind::Login,
            args,
        }
    }

    /// Subscribe to events of `event_type`; `args` must be a JSON object or null
    pub fn subscribe(event_type: &str, args: Value) -> Result<Self> {
        Self::typed(FeedCommandKind::Subscribe, event_type, args)
    }

    pub fn unsubscribe(event_type: &str, args: Value) -> Result<Self> {
        Self::typed(FeedCommandKind::Unsubscribe, event_type, args)
    }

    fn typed(cmd: FeedCommandKind, event_type: &str, args: Value) -> Result<Self> {
        let mut args = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(NordnetError::InvalidArgument(format!(
                    "feed command args must be a JSON object, got {other}"
                )));
            }
        };
        args.insert("t".to_string(), Value::from(event_type));
        Ok(Self { cmd, args })
    }

    /// Event type carried in `t`, if any
    pub fn event_type(&self) -> Option<&str> {
        self.args.get("t").and_then(Value::as_str)
    }

    /// Serialized command terminated by `\n`
    pub fn encode(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
