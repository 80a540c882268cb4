//! The custom RPC layer on top of the wire protocol.
//!
//! - [`writer`]: outbound writers and the outbox that sends them.
//! - [`schema`]: the field layout of each known call.
//! - [`dispatch`]: routing received frames to typed handlers.

pub mod dispatch;
pub mod schema;
pub mod writer;

pub use dispatch::{Delivery, RpcDispatchTable, RpcHost, on_receive};
pub use schema::{
    ClearSabotages, CleanDeadBody, Mark, NameArgs, RemoveMark, Revive, RoleAssignment, RpcCall,
    SetCustomRole, SetName, TagArgs,
};
pub use writer::{RpcOutbox, RpcWriter};
