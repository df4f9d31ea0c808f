//! Client for the binary protocol spoken by Lightify lighting gateways.
//!
//! The gateway listens on TCP port 4000 and answers one request at a time.
//! This crate encodes the command frames, reads and decodes the replies,
//! and keeps an in-memory model of the lights and groups it has seen.
//!
//! # Layers
//!
//! - [`protocol`]: frame layout, command encoders and response decoders
//! - [`transport`]: reading one complete frame from a byte stream
//! - [`model`]: lights by address and groups by id, reconciled from replies
//! - [`session`]: sequencing of request/response exchanges on a connection
//!
//! # Example
//!
//! ```no_run
//! use lightify::{session, GroupId, Rgb};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut gateway = session::connect("192.168.1.20".parse()?)?;
//!
//!     for (id, name) in gateway.group_list()? {
//!         println!("group {}: {}", id, name);
//!     }
//!
//!     for light in gateway.update_all_light_status()?.values() {
//!         println!("{} {} on={}", light.address(), light, light.is_on());
//!     }
//!
//!     gateway.set_power(GroupId(1), true)?;
//!     gateway.set_color(GroupId(1), Rgb::new(255, 120, 0), 10)?;
//!     Ok(())
//! }
//! ```

mod error;
pub mod model;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
pub use model::DeviceModel;
pub use protocol::GATEWAY_PORT;
pub use session::{connect, connect_timeout, connect_with, Config, Session};
pub use transport::TimedRead;
pub use types::{Group, GroupId, Light, LightAddress, LightState, Rgb};
