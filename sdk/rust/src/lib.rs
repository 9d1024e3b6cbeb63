//! Client for the fan-out gateway's `/api` surface.

pub mod client;

pub use client::{
    BackendInfo, BackendResult, DispatchRequest, DispatchResponse, GatewayClient, SynthesisSpec,
};
