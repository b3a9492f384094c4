//! # Routes

use crate::codec::Record;
use serde::{Deserialize, Serialize};
use shared_types::{Address, ChannelId, ValidationError};

/// A usable next hop: the partner node and the channel shared with it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteState {
    /// Next-hop node.
    pub node_address: Address,
    /// Channel with that node.
    pub channel_identifier: ChannelId,
}

impl RouteState {
    /// Create a route.
    pub fn new(node_address: Address, channel_identifier: ChannelId) -> Self {
        Self {
            node_address,
            channel_identifier,
        }
    }
}

impl Record for RouteState {
    const TYPE_TAG: &'static str = "RouteState";

    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
