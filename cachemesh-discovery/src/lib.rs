//! # cachemesh Discovery
//!
//! Keeps the peer pool in step with the instances the platform reports as running.
//!
//! - [`MembershipRefresher`]: polls a [`StatsFetcher`] on an interval and hands the
//!   resulting instance list to a [`PeerSetter`]
//! - [`CapiClient`]: `StatsFetcher` over the platform's process stats endpoint
//!
//! [`StatsFetcher`]: cachemesh_core::traits::StatsFetcher
//! [`PeerSetter`]: cachemesh_core::traits::PeerSetter

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod capi;
mod refresher;

pub use capi::{CapiClient, CapiConfig};
pub use refresher::{MembershipRefresher, RefreshOutcome, RefreshState, RefresherConfig};
