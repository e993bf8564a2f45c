// Device-command REST gateway
//
// MQTT-connected devices do not accept commands over the broker; every
// command is POSTed to the portal, which relays it and returns the
// device's reply in the HTTP response. The portal occasionally answers
// "set token error" while it renegotiates the session token, so calls
// are retried a bounded number of times on exactly that reason.

use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::address::{AccountIdentity, Continent};
use crate::envelope::{
    DeviceCommandBody, GatewayAuth, GatewayRequest, GatewayResponse, LogQueryBody, Payload,
    PayloadType,
};
use crate::error::{Error, is_token_error_message};
use crate::transport::TransportConfig;

/// Total attempts for one command: the first call plus three retries.
pub const MAX_ATTEMPTS: u32 = 4;

const DEVMANAGER_PATH: &str = "iot/devmanager.do";
const LOG_PATH: &str = "lg/log.do";

// App version parameters JSON devices expect on the query string.
const CLIENT_VERSION: &str = "1.67.3";
const APP_VERSION: &str = "1.3.1";

/// Which portal endpoint a command goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `iot/devmanager.do`, the device-command relay.
    DevManager,
    /// `lg/log.do`, clean-log queries.
    Log,
}

/// HTTP client for the portal's command relay.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
    identity: AccountIdentity,
    country: String,
}

impl GatewayClient {
    /// Create a gateway client for the account's continent.
    pub fn new(
        continent: &Continent,
        identity: AccountIdentity,
        country: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let base_url = Url::parse(&continent.portal_base())?;
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, identity, country))
    }

    /// Create a gateway client with a pre-built `reqwest::Client` and an
    /// explicit base URL (must end with `/`).
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        identity: AccountIdentity,
        country: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url,
            identity,
            country: country.into().to_ascii_lowercase(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    pub(crate) fn endpoint_url(&self, endpoint: Endpoint, request: &GatewayRequest) -> Result<Url, Error> {
        let path = match endpoint {
            Endpoint::DevManager => DEVMANAGER_PATH,
            Endpoint::Log => LOG_PATH,
        };
        let mut url = self.base_url.join(path)?;

        if Self::needs_app_query(endpoint, request) {
            url.query_pairs_mut()
                .append_pair("mid", &request.to.class)
                .append_pair("did", &request.to.did)
                .append_pair("td", "q")
                .append_pair("u", &self.identity.user_id)
                .append_pair("cv", CLIENT_VERSION)
                .append_pair("t", "a")
                .append_pair("av", APP_VERSION);
        }
        Ok(url)
    }

    // JSON devices are only reachable with the app's query string.
    fn needs_app_query(endpoint: Endpoint, request: &GatewayRequest) -> bool {
        endpoint == Endpoint::DevManager && request.payload.payload_type() == PayloadType::Json
    }

    fn auth(&self) -> GatewayAuth<'_> {
        GatewayAuth {
            realm: &self.identity.realm,
            resource: &self.identity.resource,
            token: self.identity.token.expose_secret(),
            userid: &self.identity.user_id,
            with: "users",
        }
    }

    pub(crate) fn request_body(&self, endpoint: Endpoint, request: &GatewayRequest) -> Result<Value, Error> {
        let body = match endpoint {
            Endpoint::DevManager => serde_json::to_value(DeviceCommandBody {
                auth: self.auth(),
                cmd_name: &request.cmd_name,
                payload: request.payload.to_gateway_value()?,
                payload_type: request.payload.payload_type().as_str(),
                td: "q",
                to_id: &request.to.did,
                to_res: &request.to.resource,
                to_type: &request.to.class,
            }),
            Endpoint::Log => {
                let args = match &request.payload {
                    Payload::Json(envelope) => envelope.args(),
                    Payload::Markup(_) => serde_json::Map::new(),
                };
                serde_json::to_value(LogQueryBody {
                    auth: self.auth(),
                    did: &request.to.did,
                    country: &self.country,
                    resource: &request.to.resource,
                    td: &request.cmd_name,
                    args,
                })
            }
        };
        body.map_err(|e| Error::Encoding(e.to_string()))
    }

    // ── Sending ──────────────────────────────────────────────────────

    /// Send one command, retrying only on "set token error".
    ///
    /// Returns the full response document on success. Any other failure
    /// is returned after a single attempt.
    pub async fn send(&self, endpoint: Endpoint, request: &GatewayRequest) -> Result<Value, Error> {
        let mut attempt = 1;
        loop {
            match self.post_once(endpoint, request).await {
                Err(Error::Gateway { ref message, .. }) if is_token_error_message(message) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(Error::TokenRetriesExhausted { attempts: attempt });
                    }
                    warn!(command = %request.cmd_name, attempt, "gateway token error, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn post_once(&self, endpoint: Endpoint, request: &GatewayRequest) -> Result<Value, Error> {
        let url = self.endpoint_url(endpoint, request)?;
        let body = self.request_body(endpoint, request)?;
        debug!(command = %request.cmd_name, "POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?
            .error_for_status()
            .map_err(Error::Transport)?;

        let text = resp.text().await.map_err(Error::Transport)?;
        let document: Value = serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.clone(),
        })?;
        let envelope: GatewayResponse =
            serde_json::from_value(document.clone()).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: text,
            })?;

        if envelope.is_ok() {
            Ok(document)
        } else {
            Err(Error::Gateway {
                message: envelope.error_message(),
                errno: envelope.errno(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use serde_json::{Map, json};

    use super::*;
    use crate::address::DeviceAddress;
    use crate::envelope::JsonEnvelope;
    use crate::markup::Element;

    fn client() -> GatewayClient {
        GatewayClient::with_client(
            reqwest::Client::new(),
            Url::parse("https://portal-eu.ecouser.net/api/").unwrap(),
            AccountIdentity::new("user1", SecretString::from("secret"), "res1"),
            "DE",
        )
    }

    fn device() -> DeviceAddress {
        DeviceAddress::new("did1", "yna5xi", "botres")
    }

    #[test]
    fn json_devices_get_query_parameters() {
        let req = GatewayRequest::new(
            "getBattery",
            Payload::Json(JsonEnvelope::new(json!({}))),
            device(),
        );
        let url = client().endpoint_url(Endpoint::DevManager, &req).unwrap();
        assert_eq!(url.path(), "/api/iot/devmanager.do");
        let query = url.query().unwrap();
        assert!(query.starts_with("mid=yna5xi&did=did1&td=q&u=user1"));
        assert!(query.contains("cv=1.67.3"));
    }

    #[test]
    fn markup_devices_use_bare_endpoint() {
        let req = GatewayRequest::new("GetBatteryInfo", Payload::Markup(Element::new("ctl")), device());
        let url = client().endpoint_url(Endpoint::DevManager, &req).unwrap();
        assert!(url.query().is_none());
    }

    #[test]
    fn body_carries_auth_and_addressing() {
        let req = GatewayRequest::new(
            "GetBatteryInfo",
            Payload::Markup(Element::new("ctl").with_attr("td", "GetBatteryInfo")),
            device(),
        );
        let body = client().request_body(Endpoint::DevManager, &req).unwrap();
        assert_eq!(body["auth"]["realm"], "ecouser.net");
        assert_eq!(body["auth"]["token"], "secret");
        assert_eq!(body["auth"]["with"], "users");
        assert_eq!(body["cmdName"], "GetBatteryInfo");
        assert_eq!(body["payload"], "<ctl/>");
        assert_eq!(body["payloadType"], "x");
        assert_eq!(body["toId"], "did1");
        assert_eq!(body["toType"], "yna5xi");
        assert_eq!(body["toRes"], "botres");
    }

    #[test]
    fn log_body_flattens_arguments() {
        let mut args = Map::new();
        args.insert("count".into(), json!(20));
        let req = GatewayRequest::new("GetCleanLogs", Payload::Json(JsonEnvelope::new(Value::Object(args))), device());
        let body = client().request_body(Endpoint::Log, &req).unwrap();
        assert_eq!(body["td"], "GetCleanLogs");
        assert_eq!(body["count"], 20);
        assert_eq!(body["country"], "de");
    }
}
