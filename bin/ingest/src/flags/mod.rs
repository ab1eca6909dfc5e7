//! CLI flags.

mod globals;
pub use globals::GlobalArgs;

mod rpc;
pub use rpc::{IngestSource, RpcArgs};
