//! Client-side network boundary
//!
//! Every request returns an explicit `TransferResult`; transport failures are
//! classified here and retried by the upload coordinator.

mod transfer;

pub use transfer::{ChunkTransport, TransferClient, TransferError, TransferResult};
