//! Network layer: wire types, the reconnecting session, and typed dispatch.

pub mod dispatch;
pub mod session;
pub mod types;
