//! Normalization of avatar service events.

use serde_json::Value;

/// An event reported by the avatar service, reduced to what the lesson
/// cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AvatarEvent {
    /// The avatar finished talking.
    SpeechEnded,
    /// The avatar went back to its idle loop.
    SwitchedIdle,
    /// Anything else.
    Unknown,
}

impl AvatarEvent {
    /// Reads an event from the shapes the avatar service is known to emit.
    ///
    /// The event name may sit in `Type`, `eventName` or `type`. A string
    /// `description` may carry a nested JSON event or the bare event name.
    /// A `WebRTCEvent` whose `event.eventType` is `EVENT_TYPE_TURN_END`
    /// counts as the end of speech.
    pub fn from_json(event: &Value) -> Self {
        let mut name = event_name(event).map(ToOwned::to_owned);

        if let Some(description) =
            event.get("description").and_then(Value::as_str)
        {
            match serde_json::from_str::<Value>(description) {
                Ok(nested) => {
                    if let Some(nested_name) = event_name(&nested) {
                        name = Some(nested_name.to_owned());
                    }
                }
                Err(_) => {
                    if description == "SwitchToIdle"
                        || description == "TalkingStopped"
                    {
                        name = Some(description.to_owned());
                    }
                }
            }
        }

        let turn_end = event.get("Type").and_then(Value::as_str)
            == Some("WebRTCEvent")
            && event.pointer("/event/eventType").and_then(Value::as_str)
                == Some("EVENT_TYPE_TURN_END");
        if turn_end {
            return AvatarEvent::SpeechEnded;
        }

        match name.as_deref() {
            Some("TalkingStopped" | "avatar_stop_talking") => {
                AvatarEvent::SpeechEnded
            }
            Some("SwitchToIdle") => AvatarEvent::SwitchedIdle,
            _ => {
                trace!("ignoring avatar event: {event}");
                AvatarEvent::Unknown
            }
        }
    }

    /// Returns `true` if the event means the current utterance is over.
    #[inline]
    pub fn ends_speech(self) -> bool {
        matches!(self, AvatarEvent::SpeechEnded | AvatarEvent::SwitchedIdle)
    }
}

fn event_name(event: &Value) -> Option<&str> {
    ["Type", "eventName", "type"]
        .into_iter()
        .find_map(|key| event.get(key).and_then(Value::as_str))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_event_shapes() {
        let cases = [
            (json!({ "Type": "TalkingStopped" }), AvatarEvent::SpeechEnded),
            (json!({ "eventName": "SwitchToIdle" }), AvatarEvent::SwitchedIdle),
            (json!({ "type": "avatar_stop_talking" }), AvatarEvent::SpeechEnded),
            (
                json!({ "description": "{\"Type\":\"TalkingStopped\"}" }),
                AvatarEvent::SpeechEnded,
            ),
            (
                json!({ "type": "message", "description": "SwitchToIdle" }),
                AvatarEvent::SwitchedIdle,
            ),
            (
                json!({
                    "Type": "WebRTCEvent",
                    "event": { "eventType": "EVENT_TYPE_TURN_END" }
                }),
                AvatarEvent::SpeechEnded,
            ),
            (
                json!({
                    "Type": "WebRTCEvent",
                    "event": { "eventType": "EVENT_TYPE_TURN_START" }
                }),
                AvatarEvent::Unknown,
            ),
            (json!({ "Type": "TalkingStarted" }), AvatarEvent::Unknown),
            (json!({ "description": "hello" }), AvatarEvent::Unknown),
            (json!(null), AvatarEvent::Unknown),
        ];
        for (event, expected) in cases {
            assert_eq!(AvatarEvent::from_json(&event), expected, "{event}");
        }
    }

    #[test]
    fn test_nested_description_wins() {
        let event = json!({
            "Type": "TalkingStarted",
            "description": "{\"eventName\":\"SwitchToIdle\"}"
        });
        assert_eq!(AvatarEvent::from_json(&event), AvatarEvent::SwitchedIdle);
        assert!(AvatarEvent::SwitchedIdle.ends_speech());
        assert!(!AvatarEvent::Unknown.ends_speech());
    }
}
