//! Boundary types: scripts, outputs and transactions as handed in by callers.

use core::fmt;

use bitcoin::{consensus, Txid};

use crate::error::TransactionDecodeError;

/// Raw locking script of an output.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct ScriptPubkey(Vec<u8>);

impl ScriptPubkey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for ScriptPubkey {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<Vec<u8>> for ScriptPubkey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for ScriptPubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ScriptPubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptPubkey(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// An output being spent: its value in satoshis and its locking script.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionOutput {
    amount: u64,
    script_pubkey: ScriptPubkey,
}

impl TransactionOutput {
    pub fn new(amount: u64, script_pubkey: ScriptPubkey) -> Self {
        Self {
            amount,
            script_pubkey,
        }
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn script_pubkey(&self) -> &ScriptPubkey {
        &self.script_pubkey
    }
}

impl From<&bitcoin::TxOut> for TransactionOutput {
    fn from(txout: &bitcoin::TxOut) -> Self {
        Self::new(
            txout.value.to_sat(),
            ScriptPubkey::new(txout.script_pubkey.as_bytes()),
        )
    }
}

/// A decoded transaction together with the exact bytes it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    tx: bitcoin::Transaction,
    raw: Vec<u8>,
}

impl Transaction {
    /// Decodes the network serialization, with or without witness data.
    ///
    /// The whole buffer must be consumed and must round-trip byte for byte.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionDecodeError> {
        let (tx, consumed): (bitcoin::Transaction, usize) =
            consensus::deserialize_partial(bytes).map_err(|_| TransactionDecodeError::Malformed)?;
        if consumed != bytes.len() {
            return Err(TransactionDecodeError::TrailingBytes(bytes.len() - consumed));
        }
        if consensus::serialize(&tx).len() != bytes.len() {
            return Err(TransactionDecodeError::NonCanonical(bytes.len()));
        }

        Ok(Self {
            tx,
            raw: bytes.to_vec(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn input_count(&self) -> usize {
        self.tx.input.len()
    }

    pub fn output_count(&self) -> usize {
        self.tx.output.len()
    }

    pub fn output(&self, index: usize) -> Option<TransactionOutput> {
        self.tx.output.get(index).map(TransactionOutput::from)
    }

    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }

    pub(crate) fn inner(&self) -> &bitcoin::Transaction {
        &self.tx
    }
}

impl TryFrom<&[u8]> for Transaction {
    type Error = TransactionDecodeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl From<bitcoin::Transaction> for Transaction {
    fn from(tx: bitcoin::Transaction) -> Self {
        let raw = consensus::serialize(&tx);
        Self { tx, raw }
    }
}
