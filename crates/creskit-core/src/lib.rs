// creskit-core: Point bridge between the CresKit link and a host model (CLI or embedding app).

pub mod bridge;
pub mod bus;
pub mod config;
pub mod correlator;
pub mod echo;
pub mod error;
pub mod model;
pub mod point;
pub mod sink;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::Bridge;
pub use config::{BridgeConfig, DEFAULT_RETRY_INTERVAL};
pub use error::CoreError;
pub use point::{Point, SetOutcome};
pub use sink::{NullSink, PointSink, TracingSink};

pub use model::{
    Characteristic, EventBinding, KindProfile, PointConfig, PointInfo, PointKind, PointUpdate,
    ROTATION_SPEED_RESUME,
};

// Link-layer types hosts need to configure and observe the bridge.
pub use creskit_proto::{ConnectionState, Frame, FrameSink, PeerConfig, Topic};
