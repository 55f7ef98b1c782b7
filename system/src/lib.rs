mod error;
pub mod message;
mod participant;
mod raster;
mod session_store;
mod snapshot;
mod surface;
mod tool;
mod types;
mod undo_history;

pub use error::*;
pub use message::*;
pub use participant::*;
pub use raster::*;
pub use session_store::*;
pub use snapshot::*;
pub use surface::*;
pub use tool::*;
pub use types::*;
pub use undo_history::*;

pub extern crate bincode;
pub extern crate euclid;
