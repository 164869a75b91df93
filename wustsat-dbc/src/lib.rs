//! The CAN database for messages between WUST-Sat modules
//!
//! Modules address each other with 29-bit frame IDs which pack the source module, the destination
//! module, and the message type (see [`frame_id`]). This crate holds the module table, the message
//! definitions, and a [`CanDatabase`] which encodes and decodes payloads and can be written out as a
//! `.dbc` file for bus analysis tools.
//!
//! ```
//! use wustsat_dbc::{heartbeat, CanDatabase};
//!
//! let db = CanDatabase::create(false).unwrap();
//! let frame_id = db.message_by_name("OBC_Heartbeat").unwrap().frame_id;
//! let payload = heartbeat::encode_payload(Some(1_700_000_000));
//! let data = heartbeat::decode_payload(&db, frame_id, &payload).unwrap();
//! assert_eq!(1_700_000_000, data.unix_timestamp);
//! ```
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod database;
mod error;
pub mod frame_id;
pub mod heartbeat;
mod message;
pub mod message_types;
pub mod modules;
pub mod signal;

pub use database::{CanDatabase, DatabaseInfo, DB_VERSION};
pub use error::{DatabaseError, DecodeError, EncodeError, FrameIdError};
pub use frame_id::{compute_frame_id, FrameIdFields};
pub use message::{MessageDef, SignalValues, DBC_EXTENDED_FLAG};
pub use message_types::MessageType;
pub use modules::{Module, MODULES};
