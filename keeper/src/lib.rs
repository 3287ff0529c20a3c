//! Snapshot keeper for a GDP-linked market
//!
//! Polls the market, oracle and holder balances through a [`MarketSource`],
//! validates each round and publishes one consistent, versioned
//! [`Snapshot`]. A round that fails in any way leaves the previous snapshot
//! in place and marks it stale.

pub mod address;
pub mod error;
pub mod reconciler;
pub mod snapshot;
pub mod source;
pub mod view;

pub use address::Address;
pub use error::{ReadError, SyncError};
pub use reconciler::{Reconciler, RefreshTask, SnapshotView};
pub use snapshot::Snapshot;
pub use source::{
    FileSource, MarketReadout, MarketSource, OracleReadout, PositionReadout, ReadoutDocument,
    StaticSource,
};
pub use view::MarketView;
