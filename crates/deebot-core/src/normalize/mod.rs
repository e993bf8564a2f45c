// ── Response/event normalizer ──
//
// Turns raw inbound payloads into canonical events. The decoder is picked
// once from the device generation; payloads are never sniffed. Both
// decoders type a report from the payload itself where it says what it
// is, and otherwise from the delivery context (command name or topic).

mod json;
mod markup;

use serde_json::Value;

use crate::error::CoreError;
use crate::event::Decoded;
use crate::model::DeviceGeneration;

/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context<'a> {
    /// MQTT delivery on this topic.
    Topic(&'a str),
    /// Gateway reply to the command with this wire name.
    Command(&'a str),
    /// Stanza pushed over the XMPP stream.
    Stanza,
}

impl<'a> Context<'a> {
    /// Report name the context suggests, if any.
    fn name_hint(self) -> Option<&'a str> {
        match self {
            Self::Topic(topic) => topic_report_name(topic),
            Self::Command(name) => Some(name),
            Self::Stanza => None,
        }
    }
}

/// Report name segment of a device topic:
/// `iot/atr/{name}/{did}/{class}/{resource}/{x|j}`.
pub fn topic_report_name(topic: &str) -> Option<&str> {
    topic.split('/').nth(2).filter(|s| !s.is_empty())
}

/// Decoder for one wire dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    Markup,
    Json,
}

impl Normalizer {
    pub fn for_generation(generation: DeviceGeneration) -> Self {
        match generation {
            DeviceGeneration::Legacy => Self::Markup,
            DeviceGeneration::Json => Self::Json,
        }
    }

    /// Decode a payload delivered by a backbone.
    pub fn normalize(self, payload: &str, context: Context<'_>) -> Result<Decoded, CoreError> {
        match self {
            Self::Markup => markup::decode(payload, context.name_hint()),
            Self::Json => {
                let document: Value = serde_json::from_str(payload)
                    .map_err(|e| CoreError::parse(format!("invalid JSON payload: {e}")))?;
                json::decode(&document, context.name_hint())
            }
        }
    }

    /// Decode a gateway reply to the command named `command`.
    pub fn normalize_response(self, document: &Value, command: &str) -> Result<Decoded, CoreError> {
        match self {
            Self::Markup => match document.get("resp").and_then(Value::as_str) {
                Some(resp) => markup::decode(resp, Some(command)),
                None => Ok(Decoded::Skip),
            },
            Self::Json => json::decode(document, Some(command)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn topic_name_segment() {
        assert_eq!(
            topic_report_name("iot/atr/onBattery/did1/yna5xi/res/j"),
            Some("onBattery")
        );
        assert_eq!(topic_report_name("iot"), None);
    }

    #[test]
    fn decoder_follows_generation() {
        assert_eq!(
            Normalizer::for_generation(DeviceGeneration::Legacy),
            Normalizer::Markup
        );
        assert_eq!(
            Normalizer::for_generation(DeviceGeneration::Json),
            Normalizer::Json
        );
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = Normalizer::Json
            .normalize("not json", Context::Topic("iot/atr/onBattery/a/b/c/j"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Parse { .. }));

        let err = Normalizer::Markup
            .normalize("<ctl", Context::Stanza)
            .unwrap_err();
        assert!(matches!(err, CoreError::Parse { .. }));
    }
}
