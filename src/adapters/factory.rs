//! Maps a protocol tag to an adapter (§4.3, §9 Design Notes).
//!
//! A single authoritative supported set — the teacher's source carried
//! multiple diverging lists of supported protocols across its V2/V3
//! syncers; this is the one place that decision is made now.

use super::{PoolAdapter, StableAdapter, V2Adapter, V3Adapter};
use crate::error::CollectError;
use std::sync::Arc;

pub struct AdapterFactory {
    v2: Arc<V2Adapter>,
    v3: Arc<V3Adapter>,
    stable: Arc<StableAdapter>,
}

impl Default for AdapterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterFactory {
    pub fn new() -> Self {
        Self {
            v2: Arc::new(V2Adapter),
            v3: Arc::new(V3Adapter),
            stable: Arc::new(StableAdapter),
        }
    }

    /// Resolves a protocol tag to its adapter. The empty tag aliases to
    /// V2 for backward compatibility (§4.2).
    pub fn for_protocol(&self, protocol_tag: &str) -> Result<Arc<dyn PoolAdapter>, CollectError> {
        match protocol_tag {
            "" | "uniswap_v2" | "sushiswap" | "pancakeswap_v2" | "quickswap_v2" | "apeswap" => {
                Ok(self.v2.clone())
            }
            "uniswap_v3" | "pancakeswap_v3" | "sushiswap_v3" | "quickswap_v3" => Ok(self.v3.clone()),
            "curve" | "balancer" => Ok(self.stable.clone()),
            other => Err(CollectError::UnsupportedProtocol(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tag_aliases_to_v2() {
        let factory = AdapterFactory::new();
        let adapter = factory.for_protocol("").unwrap();
        assert_eq!(adapter.name(), "v2");
    }

    #[test]
    fn unknown_tag_is_unsupported() {
        let factory = AdapterFactory::new();
        assert!(matches!(
            factory.for_protocol("orderbook_v9"),
            Err(CollectError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn recognized_tags_route_to_expected_adapter() {
        let factory = AdapterFactory::new();
        assert_eq!(factory.for_protocol("uniswap_v2").unwrap().name(), "v2");
        assert_eq!(factory.for_protocol("uniswap_v3").unwrap().name(), "v3");
        assert_eq!(factory.for_protocol("curve").unwrap().name(), "stable");
    }
}
