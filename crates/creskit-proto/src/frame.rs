// ── Frames and topics ──
//
// A frame is `category:id:command:value` terminated by `*`. The first
// three fields joined with `:` form the topic, which is the only
// correlation key the protocol has.

use std::fmt;

use serde::Serialize;

/// Separator between the four frame fields.
pub const FIELD_DELIMITER: char = ':';

/// Terminator closing every frame on the wire.
pub const FRAME_TERMINATOR: char = '*';

// ── Topic ───────────────────────────────────────────────────────────

/// Routing key `category:id:command`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    pub fn new(category: &str, id: &str, command: &str) -> Self {
        Self(format!(
            "{category}{FIELD_DELIMITER}{id}{FIELD_DELIMITER}{command}"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Frame> for Topic {
    fn from(frame: &Frame) -> Self {
        Self::new(&frame.category, &frame.id, &frame.command)
    }
}

// ── Frame ───────────────────────────────────────────────────────────

/// One decoded wire message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub category: String,
    pub id: String,
    pub command: String,
    /// `None` when the value field was absent, empty, or not an integer.
    pub value: Option<i64>,
}

impl Frame {
    pub fn new(
        category: impl Into<String>,
        id: impl Into<String>,
        command: impl Into<String>,
        value: Option<i64>,
    ) -> Self {
        Self {
            category: category.into(),
            id: id.into(),
            command: command.into(),
            value,
        }
    }

    /// Parse one unterminated fragment.
    ///
    /// Returns `None` for fragments with an empty category; those are
    /// dropped without error. Missing trailing fields become empty strings,
    /// fields past the fourth are ignored, and a malformed value becomes `None`.
    pub fn parse(fragment: &str) -> Option<Self> {
        let mut parts = fragment.split(FIELD_DELIMITER);
        let category = parts.next().unwrap_or_default();
        if category.is_empty() {
            return None;
        }
        let id = parts.next().unwrap_or_default();
        let command = parts.next().unwrap_or_default();
        let value = parts.next().and_then(|v| v.trim().parse::<i64>().ok());

        Some(Self::new(category, id, command, value))
    }

    pub fn topic(&self) -> Topic {
        Topic::from(self)
    }

    /// Render back into wire text, terminator included.
    pub fn to_wire(&self) -> String {
        encode(&self.category, &self.id, &self.command, self.value)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{} = {v}", self.topic()),
            None => write!(f, "{} = <none>", self.topic()),
        }
    }
}

/// Encode an outbound command.
///
/// The value segment is left empty for get requests, but the field
/// delimiter before it and the terminator are always written. Fields must
/// not contain `:` or `*`; nothing is escaped.
pub fn encode(category: &str, id: &str, command: &str, value: Option<i64>) -> String {
    let value = value.map(|v| v.to_string()).unwrap_or_default();
    format!(
        "{category}{FIELD_DELIMITER}{id}{FIELD_DELIMITER}{command}{FIELD_DELIMITER}{value}{FRAME_TERMINATOR}"
    )
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_get_leaves_value_empty() {
        assert_eq!(
            encode("MultiSpeedFan", "2", "getRotationSpeed", None),
            "MultiSpeedFan:2:getRotationSpeed:*"
        );
    }

    #[test]
    fn encode_set_carries_value() {
        assert_eq!(
            encode("Lightbulb", "5", "setPowerState", Some(1)),
            "Lightbulb:5:setPowerState:1*"
        );
    }

    #[test]
    fn parse_full_fragment() {
        let frame = Frame::parse("GarageDoorOpener:3:eventGarageDoorState:0").unwrap();
        assert_eq!(
            frame,
            Frame::new("GarageDoorOpener", "3", "eventGarageDoorState", Some(0))
        );
        assert_eq!(frame.topic().as_str(), "GarageDoorOpener:3:eventGarageDoorState");
    }

    #[test]
    fn parse_unparseable_value_yields_none() {
        let frame = Frame::parse("Lightbulb:5:getPowerState:on").unwrap();
        assert_eq!(frame.value, None);
        assert_eq!(frame.command, "getPowerState");
    }

    #[test]
    fn parse_missing_fields() {
        let frame = Frame::parse("Lightbulb:5").unwrap();
        assert_eq!(frame.id, "5");
        assert_eq!(frame.command, "");
        assert_eq!(frame.value, None);
    }

    #[test]
    fn parse_empty_category_is_discarded() {
        assert!(Frame::parse("").is_none());
        assert!(Frame::parse(":5:getPowerState:1").is_none());
    }

    #[test]
    fn parse_negative_and_padded_values() {
        assert_eq!(Frame::parse("Lock:1:eventLockCurrentState: 1 ").unwrap().value, Some(1));
        assert_eq!(Frame::parse("WindowCovering:1:x:-3").unwrap().value, Some(-3));
    }

    #[test]
    fn round_trip_through_wire() {
        let frame = Frame::new("SecuritySystem", "9", "setSecuritySystemTargetState", Some(3));
        let wire = frame.to_wire();
        let body = wire.strip_suffix(FRAME_TERMINATOR).unwrap();
        assert_eq!(Frame::parse(body).unwrap(), frame);
    }

    #[test]
    fn display_shows_topic_and_value() {
        let frame = Frame::new("Switch", "1", "eventPowerState", None);
        assert_eq!(frame.to_string(), "Switch:1:eventPowerState = <none>");
    }
}
