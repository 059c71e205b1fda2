//! Hand-written HTTP/1.1 surface: request reading, response assembly, and
//! the per-connection server loop.

pub mod request;
pub mod response;
pub mod server;
