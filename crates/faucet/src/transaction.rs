//! Legacy value-transfer transactions and EIP-155 signing.

use faucet_common::{Address, TxHash};
use k256::ecdsa::{RecoveryId, Signature, SigningKey};
use rlp::RlpStream;
use std::fmt;
use thiserror::Error;

/// Gas consumed by a plain value transfer with no calldata.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("private key is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("private key is not a valid secp256k1 scalar")]
    InvalidScalar,
}

#[derive(Error, Debug)]
pub enum SigningError {
    #[error("chain id {0} overflows the EIP-155 v value")]
    ChainIdOverflow(u64),

    #[error("ecdsa signing failed: {0}")]
    Ecdsa(#[from] k256::ecdsa::Error),
}

/// The faucet's signing key together with the address it controls.
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    address: Address,
}

impl Wallet {
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = signing_key.verifying_key().to_encoded_point(false);
        let address = Address::from_uncompressed_public_key(public_key.as_bytes());
        Self { signing_key, address }
    }

    /// Parses a 32-byte hex private key, with or without `0x`.
    pub fn from_hex(private_key: &str) -> Result<Self, KeyError> {
        let trimmed = private_key.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits)?;
        let signing_key = SigningKey::from_slice(&bytes).map_err(|_| KeyError::InvalidScalar)?;
        Ok(Self::from_signing_key(signing_key))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn sign_prehash(&self, prehash: &[u8; 32]) -> Result<(Signature, RecoveryId), k256::ecdsa::Error> {
        self.signing_key.sign_prehash_recoverable(prehash)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet").field("address", &self.address).finish_non_exhaustive()
    }
}

/// Pre-EIP-2718 transaction moving `value` to `to` with empty calldata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
}

impl LegacyTransaction {
    pub fn transfer(to: Address, value: u128, gas_price: u128, nonce: u64) -> Self {
        Self {
            nonce,
            gas_price,
            gas_limit: TRANSFER_GAS_LIMIT,
            to,
            value,
        }
    }

    fn append_body(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&trim_leading_zeros(&self.gas_price.to_be_bytes()));
        stream.append(&self.gas_limit);
        stream.append(&self.to.0.to_vec());
        stream.append(&trim_leading_zeros(&self.value.to_be_bytes()));
        stream.append_empty_data();
    }

    /// RLP preimage `[nonce, gasPrice, gas, to, value, data, chainId, 0, 0]`.
    pub fn signing_payload(&self, chain_id: u64) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
        stream.out().to_vec()
    }

    pub fn signing_hash(&self, chain_id: u64) -> [u8; 32] {
        keccak_hash::keccak(self.signing_payload(chain_id)).0
    }
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    transaction: LegacyTransaction,
    v: u64,
    r: [u8; 32],
    s: [u8; 32],
    raw: Vec<u8>,
    hash: TxHash,
}

impl SignedTransaction {
    pub fn transaction(&self) -> &LegacyTransaction {
        &self.transaction
    }

    pub fn v(&self) -> u64 {
        self.v
    }

    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// RLP encoding as sent over the wire.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn hash(&self) -> TxHash {
        self.hash
    }
}

/// Replay-protected signer bound to a single chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eip155Signer {
    chain_id: u64,
}

impl Eip155Signer {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn sign(&self, transaction: LegacyTransaction, wallet: &Wallet) -> Result<SignedTransaction, SigningError> {
        let v_base = self
            .chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35))
            .ok_or(SigningError::ChainIdOverflow(self.chain_id))?;

        let (signature, recovery_id) = wallet.sign_prehash(&transaction.signing_hash(self.chain_id))?;
        let v = v_base + u64::from(recovery_id.to_byte());

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);

        let mut stream = RlpStream::new_list(9);
        transaction.append_body(&mut stream);
        stream.append(&v);
        stream.append(&trim_leading_zeros(&r));
        stream.append(&trim_leading_zeros(&s));
        let raw = stream.out().to_vec();
        let hash = TxHash::keccak(&raw);

        Ok(SignedTransaction {
            transaction,
            v,
            r,
            s,
            raw,
            hash,
        })
    }
}

/// RLP integers are minimal big-endian byte strings; zero is the empty string.
fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}
