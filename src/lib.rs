pub mod bus;
pub mod config;
pub mod detector;
pub mod egts;
pub mod frame;
pub mod handler;
pub mod logging;
pub mod position;
pub mod protocol;
pub mod replay;
pub mod server;
pub mod session;
pub mod sink;
pub mod wialonips;

pub use bus::{BusError, Event, EventBus, EventPayload, Subscriber};
pub use frame::{FrameError, FrameSplitter, Scanned};
pub use handler::ConnectionHandler;
pub use position::{Adapter, AttrValue, Attributes, Dimension, Location, Position};
pub use protocol::{Protocol, ProtocolError, RespondResult};
pub use server::{Server, ServerConfig};
pub use session::{Session, Value};

/// Error type for top-level binary glue code that crosses module boundaries.
///
/// Library code keeps concrete `thiserror` enums per module; this alias is
/// only used where a function genuinely needs to bubble up any of several
/// unrelated error kinds (e.g. the CLI entry points).
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;
