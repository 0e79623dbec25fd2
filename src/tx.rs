//! Per-transaction hashes shared by every signature check of one verification.
//!
//! Mirrors Bitcoin Core's `PrecomputedTransactionData`: BIP143 needs the
//! double-SHA256 of the prevouts, sequences and outputs, while BIP341 needs
//! their single-SHA256 plus the hashes of every spent amount and script.

use bitcoin::{
    consensus,
    hashes::{sha256, sha256d, Hash, HashEngine},
    Transaction,
};

use crate::{codec::write_var_bytes, types::TransactionOutput};

#[derive(Debug, Clone, Default)]
pub(crate) struct PrecomputedTransactionData {
    pub prevouts_single_hash: Option<sha256::Hash>,
    pub sequences_single_hash: Option<sha256::Hash>,
    pub outputs_single_hash: Option<sha256::Hash>,
    pub spent_amounts_single_hash: Option<sha256::Hash>,
    pub spent_scripts_single_hash: Option<sha256::Hash>,
    pub hash_prevouts: Option<sha256d::Hash>,
    pub hash_sequence: Option<sha256d::Hash>,
    pub hash_outputs: Option<sha256d::Hash>,
    pub bip143_segwit_ready: bool,
    pub bip341_taproot_ready: bool,
}

impl PrecomputedTransactionData {
    /// Computes the hashes the given transaction can need.
    ///
    /// BIP143 data is prepared whenever any input carries a witness (or `force`
    /// is set); BIP341 data whenever the full spent-output set is known.
    pub fn new(
        tx: &Transaction,
        spent_outputs: Option<&[TransactionOutput]>,
        force: bool,
    ) -> PrecomputedTransactionData {
        let mut data = PrecomputedTransactionData::default();

        let spent_outputs = spent_outputs.filter(|spent| spent.len() == tx.input.len());
        let uses_bip143 = force || tx.input.iter().any(|input| !input.witness.is_empty());
        let uses_bip341 = spent_outputs.is_some();

        if uses_bip143 || uses_bip341 {
            data.prevouts_single_hash =
                Some(hash_serialized(tx.input.iter().map(|input| &input.previous_output)));
            data.sequences_single_hash =
                Some(hash_serialized(tx.input.iter().map(|input| &input.sequence)));
            data.outputs_single_hash = Some(hash_serialized(&tx.output));
        }

        if uses_bip143 {
            data.hash_prevouts = data.prevouts_single_hash.map(rehash);
            data.hash_sequence = data.sequences_single_hash.map(rehash);
            data.hash_outputs = data.outputs_single_hash.map(rehash);
            data.bip143_segwit_ready = true;
        }

        if let Some(spent) = spent_outputs {
            let mut amounts = sha256::Hash::engine();
            let mut scripts = sha256::Hash::engine();
            for output in spent {
                amounts.input(&output.amount().to_le_bytes());
                write_var_bytes(&mut scripts, output.script_pubkey().as_bytes());
            }
            data.spent_amounts_single_hash = Some(sha256::Hash::from_engine(amounts));
            data.spent_scripts_single_hash = Some(sha256::Hash::from_engine(scripts));
            data.bip341_taproot_ready = true;
        }

        data
    }
}

/// BIP143 hashes are the BIP341 ones hashed once more.
fn rehash(single: sha256::Hash) -> sha256d::Hash {
    sha256d::Hash::from_byte_array(sha256::Hash::hash(single.as_byte_array()).to_byte_array())
}

pub(crate) fn hash_serialized<'a, I, T>(items: I) -> sha256::Hash
where
    I: IntoIterator<Item = &'a T>,
    T: consensus::Encodable + 'a,
{
    let mut engine = sha256::Hash::engine();
    for item in items {
        engine.input(&consensus::serialize(item));
    }
    sha256::Hash::from_engine(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScriptPubkey;
    use bitcoin::{
        absolute::LockTime, transaction::Version, Amount, OutPoint, ScriptBuf, Sequence, TxIn,
        TxOut, Txid, Witness,
    };

    fn tx_with_witness(witness: Witness) -> Transaction {
        Transaction {
            version: Version(2),
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: Txid::from_byte_array([1u8; 32]),
                    vout: 0,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness,
            }],
            output: vec![TxOut {
                value: Amount::from_sat(42),
                script_pubkey: ScriptBuf::new(),
            }],
        }
    }

    #[test]
    fn legacy_only_transaction_skips_segwit_hashes() {
        let pre = PrecomputedTransactionData::new(&tx_with_witness(Witness::new()), None, false);
        assert!(!pre.bip143_segwit_ready);
        assert!(!pre.bip341_taproot_ready);
        assert!(pre.hash_prevouts.is_none());
    }

    #[test]
    fn forced_bip143_matches_manual_hashes() {
        let tx = tx_with_witness(Witness::new());
        let pre = PrecomputedTransactionData::new(&tx, None, true);
        assert!(pre.bip143_segwit_ready);

        let mut prevout = Vec::new();
        prevout.extend_from_slice(&[1u8; 32]);
        prevout.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(pre.hash_prevouts, Some(sha256d::Hash::hash(&prevout)));
        assert_eq!(
            pre.hash_sequence,
            Some(sha256d::Hash::hash(&u32::MAX.to_le_bytes()))
        );
    }

    #[test]
    fn taproot_ready_when_spent_outputs_known() {
        let tx = tx_with_witness(Witness::from_slice(&[vec![0x01]]));
        let spent = [TransactionOutput::new(
            50,
            ScriptPubkey::new([&[0x51u8, 0x20][..], &[0u8; 32]].concat()),
        )];
        let pre = PrecomputedTransactionData::new(&tx, Some(&spent), false);
        assert!(pre.bip341_taproot_ready);
        assert!(pre.bip143_segwit_ready);
        assert_eq!(
            pre.spent_amounts_single_hash,
            Some(sha256::Hash::hash(&50u64.to_le_bytes()))
        );
        assert!(pre.spent_scripts_single_hash.is_some());
    }

    #[test]
    fn mismatched_spent_outputs_are_ignored() {
        let tx = tx_with_witness(Witness::new());
        let pre = PrecomputedTransactionData::new(&tx, Some(&[]), false);
        assert!(!pre.bip341_taproot_ready);
    }
}
