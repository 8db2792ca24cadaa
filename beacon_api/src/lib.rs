//! The beacon node as seen by the attacker: chain parameters, canonical roots, duties and rewards.

pub use crate::{
    beacon_client::{BeaconApiError, BeaconClient},
    beacon_node::{BeaconNode, ChainParameters},
};

mod beacon_client;
mod beacon_node;
mod responses;
