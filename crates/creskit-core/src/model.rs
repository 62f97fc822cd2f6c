// ── Point model ──
//
// Device kinds, the characteristics the host model sees, and the fixed
// per-kind table mapping characteristics onto wire commands.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use creskit_proto::Topic;

// ── PointKind ───────────────────────────────────────────────────────

/// Device category; doubles as the first wire field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum PointKind {
    Lightbulb,
    Switch,
    GarageDoorOpener,
    SecuritySystem,
    Lock,
    MultiSpeedFan,
    WindowCovering,
    BinarySensor,
}

impl PointKind {
    /// The characteristic table for this kind.
    pub fn profile(self) -> &'static KindProfile {
        match self {
            Self::Lightbulb | Self::Switch => &POWER_PROFILE,
            Self::GarageDoorOpener => &GARAGE_PROFILE,
            Self::SecuritySystem => &SECURITY_PROFILE,
            Self::Lock => &LOCK_PROFILE,
            Self::MultiSpeedFan => &FAN_PROFILE,
            Self::WindowCovering => &COVERING_PROFILE,
            Self::BinarySensor => &SENSOR_PROFILE,
        }
    }
}

// ── Characteristic ──────────────────────────────────────────────────

/// A host-visible attribute. Its name is the suffix of the
/// `get…`/`set…` wire commands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Characteristic {
    PowerState,
    CurrentDoorState,
    TargetDoorState,
    ObstructionDetected,
    SecuritySystemCurrentState,
    SecuritySystemTargetState,
    BinarySensorState,
    LockCurrentState,
    LockTargetState,
    RotationSpeed,
    CurrentPosition,
    TargetPosition,
}

/// Fan speed value the controller treats as "resume last speed".
pub const ROTATION_SPEED_RESUME: i64 = 999;

impl Characteristic {
    pub fn get_command(self) -> String {
        format!("get{self}")
    }

    pub fn set_command(self) -> String {
        format!("set{self}")
    }

    /// Whether `value` is in range for a set of this characteristic.
    pub fn accepts(self, value: i64) -> bool {
        match self {
            Self::PowerState | Self::TargetDoorState | Self::LockTargetState | Self::TargetPosition => {
                matches!(value, 0 | 1)
            }
            Self::SecuritySystemTargetState => (0..=4).contains(&value),
            Self::RotationSpeed => (0..=100).contains(&value) || value == ROTATION_SPEED_RESUME,
            Self::CurrentDoorState
            | Self::ObstructionDetected
            | Self::SecuritySystemCurrentState
            | Self::BinarySensorState
            | Self::LockCurrentState
            | Self::CurrentPosition => false,
        }
    }
}

// ── Kind profiles ───────────────────────────────────────────────────

/// An unsolicited `event…` command and the characteristics it refreshes.
#[derive(Debug)]
pub struct EventBinding {
    pub command: &'static str,
    pub updates: &'static [Characteristic],
}

/// Fixed characteristic table for one [`PointKind`].
#[derive(Debug)]
pub struct KindProfile {
    /// Characteristics read from the controller with `get…`.
    pub readable: &'static [Characteristic],
    /// Characteristics written with `set…`.
    pub writable: &'static [Characteristic],
    /// Characteristics answered locally with a constant.
    pub fixed: &'static [(Characteristic, i64)],
    pub event: Option<EventBinding>,
    /// Read once at startup and applied as if it were an event.
    pub prime: Option<Characteristic>,
}

impl KindProfile {
    pub fn can_read(&self, c: Characteristic) -> bool {
        self.readable.contains(&c) || self.fixed_value(c).is_some()
    }

    pub fn can_write(&self, c: Characteristic) -> bool {
        self.writable.contains(&c)
    }

    pub fn fixed_value(&self, c: Characteristic) -> Option<i64> {
        self.fixed.iter().find(|(fc, _)| *fc == c).map(|(_, v)| *v)
    }
}

static POWER_PROFILE: KindProfile = KindProfile {
    readable: &[Characteristic::PowerState],
    writable: &[Characteristic::PowerState],
    fixed: &[],
    event: Some(EventBinding {
        command: "eventPowerState",
        updates: &[Characteristic::PowerState],
    }),
    prime: None,
};

static GARAGE_PROFILE: KindProfile = KindProfile {
    readable: &[Characteristic::CurrentDoorState],
    writable: &[Characteristic::TargetDoorState],
    // No obstruction sensing on the controller side.
    fixed: &[(Characteristic::ObstructionDetected, 0)],
    event: Some(EventBinding {
        command: "eventGarageDoorState",
        updates: &[Characteristic::CurrentDoorState, Characteristic::TargetDoorState],
    }),
    prime: Some(Characteristic::CurrentDoorState),
};

static SECURITY_PROFILE: KindProfile = KindProfile {
    readable: &[Characteristic::SecuritySystemCurrentState],
    writable: &[Characteristic::SecuritySystemTargetState],
    fixed: &[],
    event: Some(EventBinding {
        command: "eventSecuritySystemCurrentState",
        updates: &[
            Characteristic::SecuritySystemCurrentState,
            Characteristic::SecuritySystemTargetState,
        ],
    }),
    prime: Some(Characteristic::SecuritySystemCurrentState),
};

static LOCK_PROFILE: KindProfile = KindProfile {
    readable: &[Characteristic::LockCurrentState],
    writable: &[Characteristic::LockTargetState],
    fixed: &[],
    event: Some(EventBinding {
        command: "eventLockCurrentState",
        updates: &[Characteristic::LockCurrentState, Characteristic::LockTargetState],
    }),
    prime: Some(Characteristic::LockCurrentState),
};

static FAN_PROFILE: KindProfile = KindProfile {
    readable: &[Characteristic::RotationSpeed],
    writable: &[Characteristic::RotationSpeed],
    fixed: &[],
    event: Some(EventBinding {
        command: "eventRotationSpeed",
        updates: &[Characteristic::RotationSpeed],
    }),
    prime: None,
};

static COVERING_PROFILE: KindProfile = KindProfile {
    readable: &[Characteristic::CurrentPosition],
    writable: &[Characteristic::TargetPosition],
    fixed: &[],
    event: Some(EventBinding {
        command: "eventCurrentPosition",
        updates: &[Characteristic::CurrentPosition, Characteristic::TargetPosition],
    }),
    prime: None,
};

static SENSOR_PROFILE: KindProfile = KindProfile {
    readable: &[Characteristic::BinarySensorState],
    writable: &[],
    fixed: &[],
    event: Some(EventBinding {
        command: "eventBinarySensorState",
        updates: &[Characteristic::BinarySensorState],
    }),
    prime: None,
};

// ── PointConfig ─────────────────────────────────────────────────────

/// One bridged device, as supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointConfig {
    pub kind: PointKind,
    /// Caller-assigned instance id, unique within `kind`.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl PointConfig {
    pub fn new(kind: PointKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn topic(&self, command: &str) -> Topic {
        Topic::new(&self.kind.to_string(), &self.id, command)
    }

    /// Identity block shown to the host (manufacturer, model, serial).
    pub fn info(&self) -> PointInfo {
        PointInfo {
            manufacturer: MANUFACTURER,
            model: MANUFACTURER,
            serial_number: format!("CK {} ID {}", self.kind, self.id),
        }
    }

    /// Topic of this point's unsolicited event, if its kind has one.
    pub fn event_topic(&self) -> Option<Topic> {
        self.kind
            .profile()
            .event
            .as_ref()
            .map(|binding| self.topic(binding.command))
    }
}

// ── PointInfo ───────────────────────────────────────────────────────

const MANUFACTURER: &str = "CresKit";

/// Static identity of a point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointInfo {
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub serial_number: String,
}

// ── PointUpdate ─────────────────────────────────────────────────────

/// A value pushed to the host model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointUpdate {
    pub kind: PointKind,
    pub id: String,
    pub name: String,
    pub characteristic: Characteristic,
    pub value: Option<i64>,
}

// ── Tests ────────────────────────────────────────────────────────────
