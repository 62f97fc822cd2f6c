// creskit-proto: Wire format and TCP link for the CresKit controller protocol

pub mod codec;
pub mod connection;
pub mod error;
pub mod frame;

pub use codec::{FrameCodec, MAX_FRAME_LEN};
pub use connection::{ConnectionHandle, ConnectionState, FrameSink, PeerConfig};
pub use error::Error;
pub use frame::{FIELD_DELIMITER, FRAME_TERMINATOR, Frame, Topic, encode};
