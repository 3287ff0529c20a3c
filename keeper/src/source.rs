//! External read interface
//!
//! The keeper never talks to a chain itself. Whatever transport a caller
//! has (an RPC client, an indexer, a fixture file) is wrapped in a
//! [`MarketSource`] that answers the three read groups one refresh round
//! needs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::ReadError;
use crate::snapshot::RoundReadouts;

pub type ReadResult<T> = Result<T, ReadError>;

/// Read-only view of the authoritative market.
///
/// Every call is side-effect free. Futures are boxed so sources can be
/// used behind a trait object and spawned onto the runtime.
pub trait MarketSource: Send + Sync + 'static {
    fn read_market(&self) -> BoxFuture<'_, ReadResult<MarketReadout>>;

    fn read_oracle(&self) -> BoxFuture<'_, ReadResult<OracleReadout>>;

    fn read_position<'a>(&'a self, holder: &'a Address) -> BoxFuture<'a, ReadResult<PositionReadout>>;

    /// Everything one refresh round needs, with the three reads issued
    /// together. Sources that can answer from a single consistent read
    /// should override this.
    fn read_round<'a>(&'a self, holder: Option<&'a Address>) -> BoxFuture<'a, ReadResult<RoundReadouts>> {
        async move {
            let position = async {
                match holder {
                    Some(holder) => self.read_position(holder).await.map(|p| Some((*holder, p))),
                    None => Ok(None),
                }
            };
            let (market, oracle, position) =
                futures::try_join!(self.read_market(), self.read_oracle(), position)?;
            Ok(RoundReadouts {
                market,
                oracle,
                position,
            })
        }
        .boxed()
    }
}

/// Raw market fields as the contract reports them.
///
/// The phase is still an untrusted integer tag here; large amounts travel
/// as decimal strings so JSON producers without 128-bit integers can
/// write them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketReadout {
    pub phase: u64,
    pub close_at: u64,
    pub long_token: Address,
    pub short_token: Address,
    pub mint_fee_bps: u64,
    pub pair_redeem_fee_bps: u64,
    #[serde(with = "amount")]
    pub vault_balance: u128,
    #[serde(with = "amount", default)]
    pub long_pot: u128,
    #[serde(with = "amount", default)]
    pub short_pot: u128,
    #[serde(with = "amount", default)]
    pub long_redeem_numerator: u128,
    #[serde(with = "amount", default)]
    pub long_redeem_denominator: u128,
    #[serde(with = "amount", default)]
    pub short_redeem_numerator: u128,
    #[serde(with = "amount", default)]
    pub short_redeem_denominator: u128,
    /// Leverage constant `k` the market was deployed with
    pub leverage_k: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleReadout {
    pub g_ppm: i64,
    pub finalized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionReadout {
    #[serde(with = "amount")]
    pub long_balance: u128,
    #[serde(with = "amount")]
    pub short_balance: u128,
    #[serde(with = "amount")]
    pub usdc_balance: u128,
}

/// Everything one round reads, as a single document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadoutDocument {
    pub market: MarketReadout,
    pub oracle: OracleReadout,
    #[serde(default)]
    pub positions: BTreeMap<Address, PositionReadout>,
}

impl ReadoutDocument {
    fn position(&self, holder: &Address) -> ReadResult<PositionReadout> {
        self.positions
            .get(holder)
            .copied()
            .ok_or_else(|| ReadError::UnknownHolder(holder.to_string()))
    }

    fn into_round(self, holder: Option<&Address>) -> ReadResult<RoundReadouts> {
        let position = match holder {
            Some(holder) => Some((*holder, self.position(holder)?)),
            None => None,
        };
        Ok(RoundReadouts {
            market: self.market,
            oracle: self.oracle,
            position,
        })
    }
}

/// In-memory source, replaced wholesale by its owner
pub struct StaticSource {
    document: Mutex<ReadoutDocument>,
}

impl StaticSource {
    pub fn new(document: ReadoutDocument) -> Self {
        Self {
            document: Mutex::new(document),
        }
    }

    pub fn replace(&self, document: ReadoutDocument) {
        *self.lock() = document;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReadoutDocument> {
        self.document
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl MarketSource for StaticSource {
    fn read_market(&self) -> BoxFuture<'_, ReadResult<MarketReadout>> {
        let market = self.lock().market.clone();
        async move { Ok(market) }.boxed()
    }

    fn read_oracle(&self) -> BoxFuture<'_, ReadResult<OracleReadout>> {
        let oracle = self.lock().oracle;
        async move { Ok(oracle) }.boxed()
    }

    fn read_position<'a>(&'a self, holder: &'a Address) -> BoxFuture<'a, ReadResult<PositionReadout>> {
        let position = self.lock().position(holder);
        async move { position }.boxed()
    }

    fn read_round<'a>(&'a self, holder: Option<&'a Address>) -> BoxFuture<'a, ReadResult<RoundReadouts>> {
        let round = self.lock().clone().into_round(holder);
        async move { round }.boxed()
    }
}

/// JSON readout file, re-read on every call so edits show up on the next round
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> ReadResult<ReadoutDocument> {
        let data = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ReadError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_str(&data)
            .map_err(|e| ReadError::Decode(format!("{}: {}", self.path.display(), e)))
    }
}

impl MarketSource for FileSource {
    fn read_market(&self) -> BoxFuture<'_, ReadResult<MarketReadout>> {
        async move { Ok(self.load().await?.market) }.boxed()
    }

    fn read_oracle(&self) -> BoxFuture<'_, ReadResult<OracleReadout>> {
        async move { Ok(self.load().await?.oracle) }.boxed()
    }

    fn read_position<'a>(&'a self, holder: &'a Address) -> BoxFuture<'a, ReadResult<PositionReadout>> {
        async move { self.load().await?.position(holder) }.boxed()
    }

    /// One load per round, so all parts come from the same document
    fn read_round<'a>(&'a self, holder: Option<&'a Address>) -> BoxFuture<'a, ReadResult<RoundReadouts>> {
        async move { self.load().await?.into_round(holder) }.boxed()
    }
}

/// u128 amounts as decimal strings
mod amount {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.trim().parse().map_err(serde::de::Error::custom)
    }
}
