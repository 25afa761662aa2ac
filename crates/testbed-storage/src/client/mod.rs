//! Per-account S3 client.
//!
//! Every configured account gets its own [`StorageClient`] so that each
//! request is signed with that account's credentials. Clients live for one
//! command invocation and are never shared between accounts.

mod storage_client;

pub use storage_client::StorageClient;
