//! Pure-Rust Bitcoin script verification.
//!
//! [`verify`] decides whether one input of a transaction is authorized to
//! spend the output it references, following Bitcoin Core's consensus and
//! policy rules for legacy, P2SH, segwit v0 and taproot spends.
//!
//! ```
//! use script_verify::{verify, ScriptPubkey, Transaction, VerificationFlags};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let raw = hex_decode("02000000013f7cebd65c27431a90bba7f796914fe8cc2ddfc3f2cbd6f7e5f2fc854534da95000000006b483045022100de1ac3bcdfb0332207c4a91f3832bd2c2915840165f876ab47c5f8996b971c3602201c6c053d750fadde599e6f5c4e1963df0f01fc0d97815e8157e3d59fe09ca30d012103699b464d1d8bc9e47d4fb1cdaa89a1c5783d68363c4dbc4b524ed3d857148617feffffff02836d3c01000000001976a914fc25d6d5c94003bf5b0c7b640a248e2c637fcfb088ac7ada8202000000001976a914fbed3d9b11183209a57999d54d59f67c019e756c88ac6acb0700");
//! let tx = Transaction::from_bytes(&raw)?;
//! let spent = ScriptPubkey::new(hex_decode("76a9144bfbaf6afb76cc5771bc6404810d1cc041a6933988ac"));
//!
//! let flags = VerificationFlags::ALL & !VerificationFlags::TAPROOT;
//! assert!(verify(&spent, 0, &tx, None, 0, flags)?);
//! # Ok(())
//! # }
//! # fn hex_decode(s: &str) -> Vec<u8> {
//! #     (0..s.len()).step_by(2).map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap()).collect()
//! # }
//! ```

mod checker;
mod classify;
mod codec;
pub mod error;
pub mod flags;
mod interpreter;
pub mod limits;
mod sighash;
mod stack;
mod tx;
pub mod types;
mod verify;

use tracing::debug;

pub use crate::{
    error::{
        DecodeError, ParseFlagsError, ScriptError, TransactionDecodeError, VerificationError,
        VerifyFailure,
    },
    flags::VerificationFlags,
    types::{ScriptPubkey, Transaction, TransactionOutput},
};

use crate::verify::VerificationContext;

/// Verifies input `input_index` of `transaction` against `script_pubkey`.
///
/// `amount` is the value of the spent output in satoshis; segwit and taproot
/// signatures commit to it. `spent_outputs` lists the output spent by every
/// input, in input order, and is required when `flags` contains
/// [`VerificationFlags::TAPROOT`].
///
/// Returns `Ok(false)` when the scripts do not authorize the spend and `Err`
/// only when the call itself is misconfigured.
pub fn verify(
    script_pubkey: &ScriptPubkey,
    amount: u64,
    transaction: &Transaction,
    spent_outputs: Option<&[TransactionOutput]>,
    input_index: usize,
    flags: VerificationFlags,
) -> Result<bool, VerificationError> {
    match verify_detailed(
        script_pubkey,
        amount,
        transaction,
        spent_outputs,
        input_index,
        flags,
    ) {
        Ok(()) => Ok(true),
        Err(VerifyFailure::Script(_)) => Ok(false),
        Err(VerifyFailure::Precondition(err)) => Err(err),
    }
}

/// Same as [`verify`] but reports why a spend was rejected.
pub fn verify_detailed(
    script_pubkey: &ScriptPubkey,
    amount: u64,
    transaction: &Transaction,
    spent_outputs: Option<&[TransactionOutput]>,
    input_index: usize,
    flags: VerificationFlags,
) -> Result<(), VerifyFailure> {
    let ctx = VerificationContext::new(
        transaction.inner(),
        input_index,
        amount,
        flags,
        spent_outputs,
    )
    .map_err(|err| {
        debug!(%err, input = input_index, %flags, "rejected verification call");
        VerifyFailure::Precondition(err)
    })?;

    ctx.verify(script_pubkey.as_bytes()).map_err(|err| {
        debug!(%err, input = input_index, txid = %transaction.txid(), "script rejected spend");
        VerifyFailure::Script(err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hex::FromHex;

    const P2PKH_SPENT: &str = "76a9144bfbaf6afb76cc5771bc6404810d1cc041a6933988ac";
    const P2PKH_TX: &str = "02000000013f7cebd65c27431a90bba7f796914fe8cc2ddfc3f2cbd6f7e5f2fc854534da95000000006b483045022100de1ac3bcdfb0332207c4a91f3832bd2c2915840165f876ab47c5f8996b971c3602201c6c053d750fadde599e6f5c4e1963df0f01fc0d97815e8157e3d59fe09ca30d012103699b464d1d8bc9e47d4fb1cdaa89a1c5783d68363c4dbc4b524ed3d857148617feffffff02836d3c01000000001976a914fc25d6d5c94003bf5b0c7b640a248e2c637fcfb088ac7ada8202000000001976a914fbed3d9b11183209a57999d54d59f67c019e756c88ac6acb0700";

    fn script(hex: &str) -> ScriptPubkey {
        ScriptPubkey::new(Vec::from_hex(hex).expect("valid hex"))
    }

    fn tx(hex: &str) -> Transaction {
        Transaction::from_bytes(&Vec::from_hex(hex).expect("valid hex")).expect("valid tx")
    }

    fn legacy_flags() -> VerificationFlags {
        VerificationFlags::ALL & !VerificationFlags::TAPROOT
    }

    #[test]
    fn legacy_p2pkh_spend() {
        let tx = tx(P2PKH_TX);
        assert_eq!(verify(&script(P2PKH_SPENT), 0, &tx, None, 0, legacy_flags()), Ok(true));
    }

    #[test]
    fn altered_locking_script_is_not_authorized() {
        let tx = tx(P2PKH_TX);
        let altered = script("76a9144bfbaf6afb76cc5771bc6404810d1cc041a6933988ff");
        assert_eq!(verify(&altered, 0, &tx, None, 0, legacy_flags()), Ok(false));
        assert!(matches!(
            verify_detailed(&altered, 0, &tx, None, 0, legacy_flags()),
            Err(VerifyFailure::Script(_))
        ));
    }

    #[test]
    fn taproot_requires_spent_outputs() {
        let tx = tx(P2PKH_TX);
        let err = verify(&script(P2PKH_SPENT), 0, &tx, None, 0, VerificationFlags::ALL)
            .expect_err("taproot without spent outputs");
        assert_eq!(err, VerificationError::SpentOutputsRequired);
        assert_eq!(
            err.to_string(),
            "The taproot flag was set, so valid spent_outputs have to be provided."
        );

        // An empty set is no better than none.
        assert_eq!(
            verify(&script(P2PKH_SPENT), 0, &tx, Some(&[][..]), 0, VerificationFlags::ALL),
            Err(VerificationError::SpentOutputsRequired)
        );
    }

    #[test]
    fn spent_outputs_must_cover_every_input() {
        let tx = tx(P2PKH_TX);
        let output = TransactionOutput::new(0, script(P2PKH_SPENT));
        let two = [output.clone(), output.clone()];
        assert_eq!(
            verify(&script(P2PKH_SPENT), 0, &tx, Some(&two[..]), 0, legacy_flags()),
            Err(VerificationError::SpentOutputsMismatch)
        );

        let one = [output];
        assert_eq!(
            verify(&script(P2PKH_SPENT), 0, &tx, Some(&one[..]), 0, VerificationFlags::ALL),
            Ok(true)
        );
    }

    #[test]
    fn precondition_order() {
        let tx = tx(P2PKH_TX);
        let spent = script(P2PKH_SPENT);
        let unknown_bit = VerificationFlags::from_bits_retain(1 << 30);

        // Invalid bits win over everything else.
        assert_eq!(
            verify(&spent, 0, &tx, None, 5, unknown_bit | VerificationFlags::TAPROOT),
            Err(VerificationError::InvalidFlags)
        );
        assert_eq!(
            verify(&spent, 0, &tx, None, 5, VerificationFlags::WITNESS | VerificationFlags::TAPROOT),
            Err(VerificationError::InvalidFlagsCombination)
        );
        assert_eq!(
            verify(&spent, 0, &tx, None, 5, VerificationFlags::TAPROOT),
            Err(VerificationError::SpentOutputsRequired)
        );
        assert_eq!(
            verify(&spent, 0, &tx, None, 1, VerificationFlags::NONE),
            Err(VerificationError::TxInputIndex)
        );
    }

    #[test]
    fn detailed_reports_the_script_error() {
        let tx = tx(P2PKH_TX);
        // OP_RETURN as the locking script.
        let failure = verify_detailed(&script("6a"), 0, &tx, None, 0, legacy_flags())
            .expect_err("OP_RETURN never succeeds");
        assert_eq!(failure, VerifyFailure::Script(ScriptError::OpReturn));
    }

    #[test]
    fn repeated_calls_agree() {
        let tx = tx(P2PKH_TX);
        let spent = script(P2PKH_SPENT);
        let first = verify(&spent, 0, &tx, None, 0, legacy_flags());
        for _ in 0..3 {
            assert_eq!(verify(&spent, 0, &tx, None, 0, legacy_flags()), first);
        }
    }
}
