// ── Point façade ──
//
// Per-point get/set used by the host model. Gets go through the
// correlator and wait for the next frame on their topic; sets are
// fire-and-forget and consult the echo suppressor first.

use serde::Serialize;
use strum::Display;

use creskit_proto::encode;

use crate::bridge::Bridge;
use crate::error::CoreError;
use crate::model::{Characteristic, PointConfig, PointKind};

/// What a set did on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SetOutcome {
    /// Handed to the link.
    Sent,
    /// Would only have echoed a value the controller just reported.
    Suppressed,
}

/// Handle to one configured point on a [`Bridge`].
#[derive(Clone)]
pub struct Point {
    bridge: Bridge,
    config: PointConfig,
}

impl Point {
    pub(crate) fn new(bridge: Bridge, config: PointConfig) -> Self {
        Self { bridge, config }
    }

    pub fn config(&self) -> &PointConfig {
        &self.config
    }

    pub fn kind(&self) -> PointKind {
        self.config.kind
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    // ── Generic operations ───────────────────────────────────────────

    /// Read `characteristic` from the controller.
    ///
    /// Resolves with the value of the next frame on the `get…` topic,
    /// whether it is the reply or an unrelated report. Unanswered reads
    /// are re-sent on every retry tick and only fail if the bridge has a
    /// retry limit or is stopped.
    pub async fn get(&self, characteristic: Characteristic) -> Result<Option<i64>, CoreError> {
        let profile = self.config.kind.profile();
        if let Some(value) = profile.fixed_value(characteristic) {
            return Ok(Some(value));
        }
        if !profile.can_read(characteristic) {
            return Err(self.unsupported("read", characteristic));
        }

        let link = self.bridge.link()?;
        let command = characteristic.get_command();
        let wire = encode(&self.config.kind.to_string(), &self.config.id, &command, None);
        let rx = self
            .bridge
            .correlator()
            .request_once(link.as_ref(), self.config.topic(&command), wire);

        rx.await.map_err(|_| CoreError::Disconnected)?
    }

    /// Write `value` to `characteristic`.
    ///
    /// Returns as soon as the frame is handed to the link; the controller
    /// never acknowledges. A set that would only mirror the controller's
    /// last report back to it is skipped and reported as
    /// [`SetOutcome::Suppressed`].
    pub fn set(&self, characteristic: Characteristic, value: i64) -> Result<SetOutcome, CoreError> {
        if !self.config.kind.profile().can_write(characteristic) {
            return Err(self.unsupported("write", characteristic));
        }
        if !characteristic.accepts(value) {
            return Err(CoreError::ValidationFailed {
                message: format!("{value} is out of range for {characteristic}"),
            });
        }

        let link = self.bridge.link()?;
        if let Some(event) = self.config.event_topic() {
            if self.bridge.echo().would_echo(&event, Some(value)) {
                return Ok(SetOutcome::Suppressed);
            }
        }

        let wire = encode(
            &self.config.kind.to_string(),
            &self.config.id,
            &characteristic.set_command(),
            Some(value),
        );
        let sent = link.send(&wire);
        tracing::debug!(wire = %wire, sent, "set issued");
        Ok(SetOutcome::Sent)
    }

    /// Host "identify" request. The controller has no such command, so
    /// this only logs.
    pub fn identify(&self) {
        tracing::info!(kind = %self.config.kind, id = %self.config.id, name = %self.config.name, "identify");
    }

    fn unsupported(&self, verb: &str, characteristic: Characteristic) -> CoreError {
        CoreError::Unsupported {
            kind: self.config.kind.to_string(),
            operation: format!("{verb} {characteristic}"),
        }
    }

    // ── Typed conveniences ───────────────────────────────────────────

    pub async fn get_power_state(&self) -> Result<Option<i64>, CoreError> {
        self.get(Characteristic::PowerState).await
    }

    pub fn set_power_state(&self, on: bool) -> Result<SetOutcome, CoreError> {
        self.set(Characteristic::PowerState, i64::from(on))
    }

    pub async fn get_current_door_state(&self) -> Result<Option<i64>, CoreError> {
        self.get(Characteristic::CurrentDoorState).await
    }

    pub fn set_target_door_state(&self, value: i64) -> Result<SetOutcome, CoreError> {
        self.set(Characteristic::TargetDoorState, value)
    }

    /// Always `0`; answered without a round trip.
    pub async fn get_obstruction_detected(&self) -> Result<Option<i64>, CoreError> {
        self.get(Characteristic::ObstructionDetected).await
    }

    pub async fn get_security_system_current_state(&self) -> Result<Option<i64>, CoreError> {
        self.get(Characteristic::SecuritySystemCurrentState).await
    }

    pub fn set_security_system_target_state(&self, value: i64) -> Result<SetOutcome, CoreError> {
        self.set(Characteristic::SecuritySystemTargetState, value)
    }

    pub async fn get_binary_sensor_state(&self) -> Result<Option<i64>, CoreError> {
        self.get(Characteristic::BinarySensorState).await
    }

    pub async fn get_lock_current_state(&self) -> Result<Option<i64>, CoreError> {
        self.get(Characteristic::LockCurrentState).await
    }

    pub fn set_lock_target_state(&self, value: i64) -> Result<SetOutcome, CoreError> {
        self.set(Characteristic::LockTargetState, value)
    }

    pub async fn get_rotation_speed(&self) -> Result<Option<i64>, CoreError> {
        self.get(Characteristic::RotationSpeed).await
    }

    pub fn set_rotation_speed(&self, value: i64) -> Result<SetOutcome, CoreError> {
        self.set(Characteristic::RotationSpeed, value)
    }

    pub async fn get_current_position(&self) -> Result<Option<i64>, CoreError> {
        self.get(Characteristic::CurrentPosition).await
    }

    pub fn set_target_position(&self, value: i64) -> Result<SetOutcome, CoreError> {
        self.set(Characteristic::TargetPosition, value)
    }
}

impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Point").field("config", &self.config).finish_non_exhaustive()
    }
}
