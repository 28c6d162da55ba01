//! podgate-state: data the placement extension reads and writes.
//!
//! # Architecture
//!
//! - [`types`]: workloads, hosts, score records, label selectors.
//! - [`cycle`]: the per-cycle keyed store contract ([`CycleStore`]) and the
//!   reference in-process implementation ([`CycleState`]).
//! - [`lister`]: the read-only views the orchestrator lends the extension
//!   ([`WorkloadLister`], [`HostRegistry`]).
//! - [`store`]: [`ClusterStore`], a redb-backed cluster view implementing
//!   both read interfaces. Values are JSON-serialized into `&[u8]` columns
//!   under `{namespace}/{name}` and `{host_id}` keys.

pub mod cycle;
pub mod error;
pub mod lister;
pub mod store;
pub mod tables;
pub mod types;

pub use cycle::{CycleState, CycleStore, StateData, read_typed};
pub use error::{StateError, StateResult};
pub use lister::{HostRegistry, WorkloadLister};
pub use store::ClusterStore;
pub use types::*;
