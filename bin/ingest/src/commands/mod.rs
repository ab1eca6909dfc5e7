//! Subcommands of the `ingest` binary.

mod stream;
pub use stream::StreamCommand;

mod backfill;
pub use backfill::BackfillCommand;

mod offline;
pub use offline::OfflineCommand;
