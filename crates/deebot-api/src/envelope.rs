// ── Wire envelopes ──
//
// The two payload dialects a command can take on the wire, plus the
// REST request body the gateway posts. Legacy devices receive markup,
// newer devices a `{header, body}` JSON envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::address::DeviceAddress;
use crate::error::Error;
use crate::markup::Element;

/// Attribute carrying the report kind; addressing only, never sent to
/// the device through the gateway.
pub const ROUTING_ATTR: &str = "td";

const HEADER_PRIORITY: &str = "1";
const HEADER_TIMEZONE_MINUTES: i32 = 480;
const HEADER_VERSION: &str = "0.0.1";

// ── JSON envelope ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonHeader {
    pub pri: String,
    /// Milliseconds since the epoch.
    pub ts: i64,
    /// Timezone offset in minutes.
    pub tmz: i32,
    pub ver: String,
}

impl JsonHeader {
    pub fn now() -> Self {
        Self {
            pri: HEADER_PRIORITY.into(),
            ts: chrono::Utc::now().timestamp_millis(),
            tmz: HEADER_TIMEZONE_MINUTES,
            ver: HEADER_VERSION.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonBody {
    pub data: Value,
}

/// `{header, body: {data}}`; `body` is left out entirely for commands
/// without arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonEnvelope {
    pub header: JsonHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonBody>,
}

impl JsonEnvelope {
    /// Wrap command arguments. Arguments are usually an object; a few
    /// queries take a list (`getLifeSpan`, `getPos`).
    pub fn new(args: Value) -> Self {
        let empty = match &args {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        };
        Self {
            header: JsonHeader::now(),
            body: if empty { None } else { Some(JsonBody { data: args }) },
        }
    }

    /// The argument mapping, or an empty map when there is no body.
    pub fn args(&self) -> Map<String, Value> {
        match self.body.as_ref().map(|b| &b.data) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }
}

// ── Payload ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadType {
    #[serde(rename = "x")]
    Markup,
    #[serde(rename = "j")]
    Json,
}

impl PayloadType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markup => "x",
            Self::Json => "j",
        }
    }
}

/// An encoded command ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Markup(Element),
    Json(JsonEnvelope),
}

impl Payload {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Self::Markup(_) => PayloadType::Markup,
            Self::Json(_) => PayloadType::Json,
        }
    }

    /// Render for the REST gateway: markup goes as a string with the
    /// routing attribute stripped, JSON as a nested object.
    pub fn to_gateway_value(&self) -> Result<Value, Error> {
        match self {
            Self::Markup(element) => {
                let mut element = element.clone();
                element.remove_attr(ROUTING_ATTR);
                Ok(Value::String(element.to_xml()?))
            }
            Self::Json(envelope) => {
                serde_json::to_value(envelope).map_err(|e| Error::Encoding(e.to_string()))
            }
        }
    }
}

// ── Gateway request ──────────────────────────────────────────────────

/// One command addressed to one device.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// Wire command name, e.g. `getBattery` or `Clean`.
    pub cmd_name: String,
    pub payload: Payload,
    pub to: DeviceAddress,
}

impl GatewayRequest {
    pub fn new(cmd_name: impl Into<String>, payload: Payload, to: DeviceAddress) -> Self {
        Self {
            cmd_name: cmd_name.into(),
            payload,
            to,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GatewayAuth<'a> {
    pub realm: &'a str,
    pub resource: &'a str,
    pub token: &'a str,
    pub userid: &'a str,
    pub with: &'static str,
}

/// Body of a `iot/devmanager.do` call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeviceCommandBody<'a> {
    pub auth: GatewayAuth<'a>,
    pub cmd_name: &'a str,
    pub payload: Value,
    pub payload_type: &'static str,
    pub td: &'static str,
    pub to_id: &'a str,
    pub to_res: &'a str,
    pub to_type: &'a str,
}

/// Body of a `lg/log.do` call; arguments are flattened in.
#[derive(Debug, Serialize)]
pub(crate) struct LogQueryBody<'a> {
    pub auth: GatewayAuth<'a>,
    pub did: &'a str,
    pub country: &'a str,
    pub resource: &'a str,
    pub td: &'a str,
    #[serde(flatten)]
    pub args: Map<String, Value>,
}

// ── Gateway response ─────────────────────────────────────────────────

/// Raw gateway reply. Success is signalled by either `result` or `ret`
/// being `"ok"`; everything else is kept for the normalizer.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayResponse {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub ret: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub errno: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GatewayResponse {
    pub fn is_ok(&self) -> bool {
        self.result.as_deref() == Some("ok") || self.ret.as_deref() == Some("ok")
    }

    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.ret.clone().filter(|r| r != "ok"))
            .or_else(|| self.result.clone().filter(|r| r != "ok"))
            .unwrap_or_else(|| "unknown gateway failure".into())
    }

    pub fn errno(&self) -> Option<String> {
        self.errno.as_ref().map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}
