//! Room state owned by the client event loop.

pub mod presence;
pub mod room;
pub mod viewport;
