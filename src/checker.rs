//! Transaction-bound signature and lock-time checks used by the interpreter.

#[cfg(not(feature = "global-context"))]
use std::sync::OnceLock;

use bitcoin::{
    hashes::Hash,
    secp256k1::{
        self, schnorr::Signature as SchnorrSignature, Message, Parity, PublicKey, Secp256k1,
        XOnlyPublicKey,
    },
    taproot::{TapNodeHash, TapTweakHash},
    Transaction,
};
use tracing::trace;

use crate::{
    codec::parse_ecdsa_signature_lax,
    error::ScriptError,
    limits::{
        LOCKTIME_THRESHOLD, SEQUENCE_FINAL, SEQUENCE_LOCKTIME_DISABLE_FLAG,
        SEQUENCE_LOCKTIME_MASK, SEQUENCE_LOCKTIME_TYPE_FLAG,
    },
    sighash::{legacy_sighash, segwit_v0_sighash, taproot_sighash, ExecutionData, SigVersion},
    tx::PrecomputedTransactionData,
    types::TransactionOutput,
};

#[cfg(feature = "global-context")]
type SecpContext = Secp256k1<secp256k1::All>;
#[cfg(not(feature = "global-context"))]
type SecpContext = Secp256k1<secp256k1::VerifyOnly>;

#[cfg(not(feature = "global-context"))]
static SECP256K1: OnceLock<SecpContext> = OnceLock::new();

fn with_verification_ctx<R>(f: impl FnOnce(&SecpContext) -> R) -> R {
    #[cfg(feature = "global-context")]
    {
        f(&*bitcoin::secp256k1::global::SECP256K1)
    }
    #[cfg(not(feature = "global-context"))]
    {
        f(SECP256K1.get_or_init(Secp256k1::verification_only))
    }
}

/// True when `output_key` is `internal_key` tweaked by `merkle_root` with
/// the given parity bit (BIP341 commitment check).
pub(crate) fn check_tap_tweak(
    internal_key: &[u8],
    output_key: &[u8],
    merkle_root: TapNodeHash,
    parity: u8,
) -> bool {
    let (Ok(internal_key), Ok(output_key)) = (
        XOnlyPublicKey::from_slice(internal_key),
        XOnlyPublicKey::from_slice(output_key),
    ) else {
        return false;
    };
    let parity = if parity & 1 == 1 { Parity::Odd } else { Parity::Even };
    let tweak = TapTweakHash::from_key_and_tweak(internal_key, Some(merkle_root)).to_scalar();
    with_verification_ctx(|secp| internal_key.tweak_add_check(secp, &output_key, parity, tweak))
}

/// Everything a signature in one input can commit to.
pub(crate) struct TransactionChecker<'a> {
    tx: &'a Transaction,
    input_index: usize,
    amount: u64,
    spent_outputs: Option<&'a [TransactionOutput]>,
    precomputed: PrecomputedTransactionData,
}

impl<'a> TransactionChecker<'a> {
    pub fn new(
        tx: &'a Transaction,
        input_index: usize,
        amount: u64,
        spent_outputs: Option<&'a [TransactionOutput]>,
    ) -> Self {
        let precomputed = PrecomputedTransactionData::new(tx, spent_outputs, false);
        Self {
            tx,
            input_index,
            amount,
            spent_outputs,
            precomputed,
        }
    }

    /// Verifies an ECDSA signature (hash-type byte included) against `pubkey`.
    ///
    /// Encoding problems the active flags did not already reject simply make
    /// the check fail.
    pub fn check_ecdsa_signature(
        &self,
        sig: &[u8],
        pubkey: &[u8],
        script_code: &[u8],
        sigversion: SigVersion,
    ) -> bool {
        let Ok(pubkey) = PublicKey::from_slice(pubkey) else {
            return false;
        };
        let Some((&hash_type, der)) = sig.split_last() else {
            return false;
        };
        let Some(mut signature) = parse_ecdsa_signature_lax(der) else {
            return false;
        };
        signature.normalize_s();

        let hash_type = i32::from(hash_type);
        let digest = match sigversion {
            SigVersion::Base => legacy_sighash(self.tx, self.input_index, script_code, hash_type),
            SigVersion::WitnessV0 => match segwit_v0_sighash(
                self.tx,
                self.input_index,
                script_code,
                self.amount,
                hash_type,
                &self.precomputed,
            ) {
                Ok(digest) => digest,
                Err(err) => {
                    trace!(%err, "segwit v0 sighash unavailable");
                    return false;
                }
            },
            SigVersion::Taproot | SigVersion::Tapscript => return false,
        };

        let message = Message::from_digest(digest.to_byte_array());
        with_verification_ctx(|secp| secp.verify_ecdsa(&message, &signature, &pubkey).is_ok())
    }

    /// Verifies a BIP340 signature, optionally suffixed by a hash-type byte.
    pub fn check_schnorr_signature(
        &self,
        sig: &[u8],
        pubkey: &[u8],
        sigversion: SigVersion,
        exec: &ExecutionData,
    ) -> Result<(), ScriptError> {
        let (sig, hash_type) = match sig {
            [sig @ .., hash_type] if sig.len() == 64 => {
                if *hash_type == 0x00 {
                    return Err(ScriptError::SchnorrSigHashType);
                }
                (sig, *hash_type)
            }
            _ if sig.len() == 64 => (sig, 0x00),
            _ => return Err(ScriptError::SchnorrSigSize),
        };

        let digest = taproot_sighash(
            self.tx,
            self.input_index,
            self.spent_outputs,
            hash_type,
            sigversion,
            exec,
            &self.precomputed,
        )?;

        let signature = SchnorrSignature::from_slice(sig).map_err(|_| ScriptError::SchnorrSig)?;
        let pubkey = XOnlyPublicKey::from_slice(pubkey).map_err(|_| ScriptError::SchnorrSig)?;
        let message = Message::from_digest(digest.to_byte_array());
        with_verification_ctx(|secp| secp.verify_schnorr(&signature, &message, &pubkey))
            .map_err(|_| ScriptError::SchnorrSig)
    }

    /// BIP65: the transaction lock time must have reached `lock_time`.
    pub fn check_lock_time(&self, lock_time: i64) -> bool {
        let tx_lock_time = i64::from(self.tx.lock_time.to_consensus_u32());
        if (tx_lock_time < LOCKTIME_THRESHOLD) != (lock_time < LOCKTIME_THRESHOLD) {
            return false;
        }
        if lock_time > tx_lock_time {
            return false;
        }
        // A final input disables the transaction lock time altogether.
        match self.tx.input.get(self.input_index) {
            Some(input) => input.sequence.0 != SEQUENCE_FINAL,
            None => false,
        }
    }

    /// BIP112: the input's relative lock must have reached `sequence`.
    pub fn check_sequence(&self, sequence: i64) -> bool {
        let Some(input) = self.tx.input.get(self.input_index) else {
            return false;
        };
        let tx_sequence = i64::from(input.sequence.0);

        if (self.tx.version.0 as u32) < 2 {
            return false;
        }
        if tx_sequence & i64::from(SEQUENCE_LOCKTIME_DISABLE_FLAG) != 0 {
            return false;
        }

        let mask = i64::from(SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK);
        let tx_masked = tx_sequence & mask;
        let script_masked = sequence & mask;
        let type_flag = i64::from(SEQUENCE_LOCKTIME_TYPE_FLAG);
        if (tx_masked < type_flag) != (script_masked < type_flag) {
            return false;
        }
        script_masked <= tx_masked
    }
}
