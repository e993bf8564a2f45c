// deebot-api: wire-level client for the Ecovacs device cloud
//
// Everything here speaks bytes and envelopes: the markup element model
// used by legacy firmware, the JSON envelope used by newer firmware,
// the REST command gateway, and the two message backbones (MQTT and
// XMPP). Typed commands and device state live in `deebot-core`.

pub mod address;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod markup;
pub mod mqtt;
pub mod session;
pub mod tls;
pub mod transport;
pub mod xmpp;

pub use address::{AccountIdentity, Continent, DeviceAddress};
pub use envelope::{GatewayRequest, GatewayResponse, JsonEnvelope, JsonHeader, Payload, PayloadType};
pub use error::Error;
pub use gateway::{Endpoint, GatewayClient};
pub use markup::Element;
pub use mqtt::MqttSession;
pub use session::{TransportEvent, event_channel};
pub use transport::TransportConfig;
pub use xmpp::XmppSession;
