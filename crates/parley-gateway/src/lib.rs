pub mod connection;
pub mod dispatcher;
pub mod registry;

pub use dispatcher::{Delivery, DeliveryMode, DispatchError, Dispatcher};
pub use connection::HEARTBEAT_INTERVAL;
pub use registry::{ConnectionId, ConnectionRegistry, Identity};
