// JSON envelope decoder.
//
// Pushed reports and gateway replies share the `{header, body: {code,
// msg, data}}` shape; gateway replies nest it under `resp`. Some replies
// use the flat `{resultCode, resultData}` form instead. Clean-log replies
// have no envelope at all and carry their data at the top level.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::CoreError;
use crate::event::{Decoded, Event, EventType, value_str};

/// Top-level gateway keys that carry no report data.
const STATUS_KEYS: [&str; 6] = ["ret", "result", "error", "errno", "id", "payloadType"];

pub(super) fn decode(document: &Value, name_hint: Option<&str>) -> Result<Decoded, CoreError> {
    let resp = document.get("resp").unwrap_or(document);
    if !resp.is_object() {
        return Err(CoreError::parse("JSON report is not an object"));
    }

    if let Some(body) = resp.get("body") {
        let code = body.get("code").and_then(value_str);
        let msg = body.get("msg").and_then(Value::as_str);
        let success = match (code.as_deref(), msg) {
            (Some("0"), _) | (_, Some("ok")) | (None, None) => true,
            _ => false,
        };
        return Ok(outcome(success, code, msg, body.get("data"), name_hint));
    }

    // Older portal replies: `{resultCode, resultData}`.
    if resp.get("resultCode").is_some() || resp.get("resultData").is_some() {
        let code = resp.get("resultCode").and_then(value_str);
        let msg = resp.get("resultMsg").and_then(Value::as_str);
        let success = code.as_deref().is_none_or(|c| c == "0");
        return Ok(outcome(success, code, msg, resp.get("resultData"), name_hint));
    }

    Ok(bare_document(resp, name_hint))
}

/// Type an enveloped reply. A failed `charge` still reports the dock.
fn outcome(
    success: bool,
    code: Option<String>,
    msg: Option<&str>,
    data: Option<&Value>,
    name_hint: Option<&str>,
) -> Decoded {
    let data = data.filter(|d| !d.is_null());

    let Some(name) = name_hint else {
        debug!("JSON report without a name");
        return Decoded::Skip;
    };
    let event_type = EventType::from_raw(name);

    if !success {
        if event_type == EventType::ChargeState {
            return Decoded::Event(Event {
                event_type,
                success: false,
                result_code: code,
                data: data.cloned().unwrap_or_else(|| Value::Object(Map::new())),
            });
        }
        return Decoded::Rejected {
            code,
            message: msg.unwrap_or("device reported failure").to_owned(),
        };
    }

    match data {
        Some(data) => Decoded::Event(Event::new(event_type, data.clone())),
        None => Decoded::Skip,
    }
}

/// A reply without an envelope: everything but the status keys is data.
fn bare_document(resp: &Value, name_hint: Option<&str>) -> Decoded {
    let Some(object) = resp.as_object() else {
        return Decoded::Skip;
    };
    let data: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| !STATUS_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    match name_hint {
        Some(name) if !data.is_empty() => {
            Decoded::Event(Event::new(EventType::from_raw(name), Value::Object(data)))
        }
        _ => Decoded::Skip,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn event(decoded: Decoded) -> Event {
        match decoded {
            Decoded::Event(event) => event,
            other => panic!("expected an event, got {other:?}"),
        }
    }

    #[test]
    fn pushed_report_uses_topic_name() {
        let doc = json!({
            "header": {"pri": 1, "ts": 1_700_000_000_000_i64},
            "body": {"data": {"value": 42, "isLow": 0}}
        });
        let e = event(decode(&doc, Some("onBattery")).unwrap());
        assert_eq!(e.event_type, EventType::BatteryInfo);
        assert_eq!(e.data["value"], 42);
    }

    #[test]
    fn gateway_reply_is_unwrapped() {
        let doc = json!({
            "ret": "ok",
            "resp": {"header": {}, "body": {"code": 0, "msg": "ok", "data": {"isCharging": 1, "mode": "slot"}}}
        });
        let e = event(decode(&doc, Some("getChargeState")).unwrap());
        assert_eq!(e.event_type, EventType::ChargeState);
        assert_eq!(e.data["isCharging"], 1);
        assert!(e.success);
    }

    #[test]
    fn success_without_data_is_skipped() {
        let doc = json!({"ret": "ok", "resp": {"header": {}, "body": {"code": 0, "msg": "ok"}}});
        assert_eq!(decode(&doc, Some("clean")).unwrap(), Decoded::Skip);
    }

    #[test]
    fn failed_charge_is_a_charge_state() {
        let doc = json!({
            "ret": "ok",
            "resp": {"header": {}, "body": {"code": 30007, "msg": "fail"}}
        });
        let e = event(decode(&doc, Some("charge")).unwrap());
        assert_eq!(e.event_type, EventType::ChargeState);
        assert!(!e.success);
        assert_eq!(e.result_code.as_deref(), Some("30007"));
    }

    #[test]
    fn other_failures_are_rejections() {
        let doc = json!({"resp": {"body": {"code": 20011, "msg": "map unsupported"}}});
        assert_eq!(
            decode(&doc, Some("getMapSet")).unwrap(),
            Decoded::Rejected {
                code: Some("20011".into()),
                message: "map unsupported".into()
            }
        );
    }

    #[test]
    fn log_reply_without_envelope() {
        let doc = json!({"ret": "ok", "logs": [{"id": "a", "ts": 1}]});
        let e = event(decode(&doc, Some("GetCleanLogs")).unwrap());
        assert_eq!(e.event_type, EventType::CleanLogs);
        assert_eq!(e.data, json!({"logs": [{"id": "a", "ts": 1}]}));

        assert_eq!(decode(&json!({"ret": "ok"}), Some("GetCleanLogs")).unwrap(), Decoded::Skip);
    }

    #[test]
    fn result_data_reply_is_unwrapped() {
        let doc = json!({"resultCode": "0", "resultData": {"value": 42}});
        let e = event(decode(&doc, Some("getBattery")).unwrap());
        assert_eq!(e.event_type, EventType::BatteryInfo);
        assert_eq!(e.data, json!({"value": 42}));
    }

    #[test]
    fn failed_result_code_follows_the_charge_rule() {
        let doc = json!({"resultCode": "30007", "resultMsg": "fail"});
        let e = event(decode(&doc, Some("charge")).unwrap());
        assert_eq!(e.event_type, EventType::ChargeState);
        assert!(!e.success);
        assert_eq!(e.result_code.as_deref(), Some("30007"));

        assert_eq!(
            decode(&doc, Some("getBattery")).unwrap(),
            Decoded::Rejected {
                code: Some("30007".into()),
                message: "fail".into()
            }
        );
    }
}
