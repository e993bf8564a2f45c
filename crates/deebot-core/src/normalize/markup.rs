// Legacy markup decoder.
//
// Reports look like `<ctl td="ChargeState"><charge type="Going"/></ctl>`,
// replies like `<ctl ret="ok"><battery power="100"/></ctl>` or
// `<ctl ret="ok" type="Brush" left="4142" total="18000"/>`. Over XMPP
// the `<ctl>` is wrapped in `<iq><query>`.

use deebot_api::Element;
use deebot_api::envelope::ROUTING_ATTR;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::CoreError;
use crate::event::{Decoded, Event, EventType};

/// Bookkeeping attributes that carry no report data.
const STATUS_ATTRS: [&str; 3] = [ROUTING_ATTR, "ret", "id"];

pub(super) fn decode(text: &str, name_hint: Option<&str>) -> Result<Decoded, CoreError> {
    let root = Element::parse(text).map_err(|e| CoreError::parse(e.to_string()))?;
    let ctl = if root.name == "iq" {
        match root.find("ctl") {
            Some(ctl) => ctl,
            None => return Ok(Decoded::Skip),
        }
    } else {
        &root
    };

    let failed = ctl.attr("ret") == Some("fail");
    let Some(event_type) = report_type(ctl, name_hint) else {
        debug!(tag = %ctl.name, "markup without a report name");
        return Ok(if failed { rejection(ctl) } else { Decoded::Skip });
    };

    if failed {
        if event_type == EventType::ChargeState {
            return Ok(Decoded::Event(Event {
                event_type,
                success: false,
                result_code: ctl.attr("errno").map(str::to_owned),
                data: Value::Object(report_data(ctl)),
            }));
        }
        return Ok(rejection(ctl));
    }

    let data = report_data(ctl);
    if data.is_empty() {
        // acknowledgement only
        return Ok(Decoded::Skip);
    }
    Ok(Decoded::Event(Event::new(event_type, Value::Object(data))))
}

/// (a) explicit routing attribute, (b) context name, (c) first child's
/// tag. A bare non-`ctl` root names itself; a childless reply with a
/// component `type` is a lifespan reply.
fn report_type(ctl: &Element, name_hint: Option<&str>) -> Option<EventType> {
    if let Some(td) = ctl.attr(ROUTING_ATTR) {
        return Some(EventType::from_raw(td));
    }
    if let Some(name) = name_hint {
        return Some(EventType::from_raw(name));
    }
    if let Some(child) = ctl.first_child() {
        return Some(EventType::from_raw(&child.name));
    }
    if ctl.name != "ctl" {
        return Some(EventType::from_raw(&ctl.name));
    }
    ctl.attr("type").map(|_| EventType::LifeSpan)
}

/// Attributes of the relevant element (first child, else the root),
/// completed by the root's own attributes, plus every child under
/// `items` when there are any.
fn report_data(ctl: &Element) -> Map<String, Value> {
    let mut data = Map::new();
    if let Some(child) = ctl.first_child() {
        insert_attrs(&mut data, child);
    }
    for (key, value) in &ctl.attributes {
        if !STATUS_ATTRS.contains(&key.as_str()) && !data.contains_key(key) {
            data.insert(key.clone(), Value::String(value.clone()));
        }
    }
    if !ctl.children.is_empty() {
        let items = ctl
            .children
            .iter()
            .map(|child| {
                let mut item = Map::new();
                item.insert("tag".into(), Value::String(child.name.clone()));
                insert_attrs(&mut item, child);
                if let Some(ref text) = child.text {
                    item.insert("text".into(), Value::String(text.clone()));
                }
                Value::Object(item)
            })
            .collect();
        data.insert("items".into(), Value::Array(items));
    }
    data
}

fn insert_attrs(data: &mut Map<String, Value>, element: &Element) {
    for (key, value) in &element.attributes {
        data.insert(key.clone(), Value::String(value.clone()));
    }
}

fn rejection(ctl: &Element) -> Decoded {
    Decoded::Rejected {
        code: ctl.attr("errno").map(str::to_owned),
        message: ctl
            .attr("error")
            .map_or_else(|| "device reported failure".to_owned(), str::to_owned),
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
    fn routing_attribute_names_the_report() {
        let e = event(decode(r#"<ctl td="ChargeState"><charge type="SlotCharging"/></ctl>"#, None).unwrap());
        assert_eq!(e.event_type, EventType::ChargeState);
        assert_eq!(e.data["type"], "SlotCharging");
    }

    #[test]
    fn bare_report_element() {
        let e = event(decode(r#"<charge type="SlotCharging"/>"#, None).unwrap());
        assert_eq!(e.event_type, EventType::ChargeState);
        assert_eq!(e.data, json!({"type": "SlotCharging"}));
    }

    #[test]
    fn command_name_types_a_reply() {
        let e = event(
            decode(
                r#"<ctl ret="ok" type="Brush" left="4142" total="18000"/>"#,
                Some("GetLifeSpan"),
            )
            .unwrap(),
        );
        assert_eq!(e.event_type, EventType::LifeSpan);
        assert_eq!(e.data, json!({"type": "Brush", "left": "4142", "total": "18000"}));
    }

    #[test]
    fn first_child_types_a_stanza() {
        let stanza = r#"<iq type="set" id="5" to="a@ecouser.net/r" from="E1@ls1ok3.ecorobot.net/atom"><query xmlns="com:ctl"><ctl ret="ok"><battery power="082"/></ctl></query></iq>"#;
        let e = event(decode(stanza, None).unwrap());
        assert_eq!(e.event_type, EventType::BatteryInfo);
        assert_eq!(e.data["power"], "082");
    }

    #[test]
    fn childless_type_reply_is_lifespan() {
        let e = event(decode(r#"<ctl ret="ok" type="SideBrush" left="10" total="100"/>"#, None).unwrap());
        assert_eq!(e.event_type, EventType::LifeSpan);
    }

    #[test]
    fn acknowledgement_is_skipped() {
        assert_eq!(decode(r#"<ctl ret="ok"/>"#, Some("Clean")).unwrap(), Decoded::Skip);
        assert_eq!(decode(r#"<ctl ret="ok" id="12"/>"#, None).unwrap(), Decoded::Skip);
    }

    #[test]
    fn failed_charge_is_a_charge_state() {
        let e = event(decode(r#"<ctl ret="fail" errno="8" error="already charging"/>"#, Some("Charge")).unwrap());
        assert_eq!(e.event_type, EventType::ChargeState);
        assert!(!e.success);
        assert_eq!(e.result_code.as_deref(), Some("8"));
    }

    #[test]
    fn other_failures_are_rejections() {
        let decoded = decode(r#"<ctl ret="fail" errno="3" error="busy"/>"#, Some("Clean")).unwrap();
        assert_eq!(
            decoded,
            Decoded::Rejected {
                code: Some("3".into()),
                message: "busy".into()
            }
        );
    }

    #[test]
    fn children_are_listed() {
        let e = event(
            decode(
                r#"<ctl ret="ok" tp="sa" msid="4"><m mid="0" p="1"/><m mid="1" p="1"/></ctl>"#,
                Some("GetMapSet"),
            )
            .unwrap(),
        );
        assert_eq!(e.event_type, EventType::MapSet);
        assert_eq!(e.data["tp"], "sa");
        assert_eq!(e.data["msid"], "4");
        assert_eq!(e.data["items"].as_array().unwrap().len(), 2);
        assert_eq!(e.data["items"][1]["mid"], "1");
    }
}
