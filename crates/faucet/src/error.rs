//! Error types for the faucet service

use crate::rpc::RpcError;
use crate::transaction::SigningError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which identity made a claim ineligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitedKey {
    Address,
    Origin,
    /// Another claim for the same address or origin is still being dispatched.
    InFlight,
}

impl fmt::Display for LimitedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LimitedKey::Address => "this address has already claimed recently",
            LimitedKey::Origin => "this ip has already claimed recently",
            LimitedKey::InFlight => "a claim for this address or ip is already in progress",
        })
    }
}

/// Failure to move funds for one claim.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("remote calls exceeded the {0:?} deadline")]
    Timeout(Duration),

    #[error("failed to fetch pending nonce: {0}")]
    Nonce(#[source] RpcError),

    #[error("failed to sign transaction: {0}")]
    Signing(#[from] SigningError),

    #[error("failed to broadcast transaction: {0}")]
    Broadcast(#[source] RpcError),
}

/// Faucet service errors
#[derive(Error, Debug)]
pub enum FaucetError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("{0}")]
    RateLimited(LimitedKey),

    #[error("claim was not approved")]
    Unauthorized,

    #[error("dispatch failed: {0}")]
    DispatchFailed(#[from] DispatchError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("could not resolve chain id: {0}")]
    ChainId(String),
}

impl FaucetError {
    /// Metric label for claim-time errors.
    pub fn outcome(&self) -> &'static str {
        match self {
            FaucetError::InvalidAddress(_) => "invalid_address",
            FaucetError::RateLimited(_) => "rate_limited",
            FaucetError::Unauthorized => "unauthorized",
            _ => "dispatch_failed",
        }
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            FaucetError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, "invalid ethereum address".to_string()),
            FaucetError::RateLimited(key) => (StatusCode::TOO_MANY_REQUESTS, key.to_string()),
            FaucetError::Unauthorized => (StatusCode::FORBIDDEN, "claim requires approval".to_string()),
            FaucetError::DispatchFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "failed to claim".to_string()),
            FaucetError::Config(_) | FaucetError::InvalidKey(_) | FaucetError::ChainId(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, body).into_response()
    }
}

pub type FaucetResult<T> = Result<T, FaucetError>;
