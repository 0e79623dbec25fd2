//! Error types surfaced by the verification API.

use thiserror::Error;

/// Caller-configuration errors detected before any script runs.
///
/// These never describe a property of the transaction itself; a spend that is
/// simply not authorized is reported as `Ok(false)` by [`crate::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum VerificationError {
    #[error("The provided input index is out of range of the actual number of inputs of the transaction.")]
    TxInputIndex,
    #[error("The provided bitfield for the flags was invalid.")]
    InvalidFlags,
    #[error("The flags were combined in an invalid way.")]
    InvalidFlagsCombination,
    #[error("The taproot flag was set, so valid spent_outputs have to be provided.")]
    SpentOutputsRequired,
    #[error("The number of spent outputs does not match the number of inputs of the tx.")]
    SpentOutputsMismatch,
}

/// Reason a script did not authorize a spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ScriptError {
    #[error("Script evaluated without error but finished with a false/empty top stack element")]
    EvalFalse,
    #[error("OP_RETURN was encountered")]
    OpReturn,

    // Resource limits
    #[error("Script is too big")]
    ScriptSize,
    #[error("Push value size limit exceeded")]
    PushSize,
    #[error("Operation limit exceeded")]
    OpCount,
    #[error("Stack size limit exceeded")]
    StackSize,
    #[error("Signature count negative or greater than pubkey count")]
    SigCount,
    #[error("Pubkey count negative or limit exceeded")]
    PubkeyCount,

    // Failed verify operations
    #[error("Script failed an OP_VERIFY operation")]
    Verify,
    #[error("Script failed an OP_EQUALVERIFY operation")]
    EqualVerify,
    #[error("Script failed an OP_CHECKSIGVERIFY operation")]
    CheckSigVerify,
    #[error("Script failed an OP_CHECKMULTISIGVERIFY operation")]
    CheckMultiSigVerify,
    #[error("Script failed an OP_NUMEQUALVERIFY operation")]
    NumEqualVerify,

    // Logical and encoding errors
    #[error("Opcode missing or not understood")]
    BadOpcode,
    #[error("Attempted to use a disabled opcode")]
    DisabledOpcode,
    #[error("Operation not valid with the current stack size")]
    InvalidStackOperation,
    #[error("Operation not valid with the current altstack size")]
    InvalidAltstackOperation,
    #[error("Invalid OP_IF construction")]
    UnbalancedConditional,
    #[error("Script number longer than the permitted width")]
    NumberOverflow,
    #[error("Script number not minimally encoded")]
    NonMinimalNumber,

    // Lock times
    #[error("Negative locktime")]
    NegativeLockTime,
    #[error("Locktime requirement not satisfied")]
    UnsatisfiedLockTime,

    // Malleability and policy
    #[error("Signature hash type missing or not understood")]
    SigHashType,
    #[error("Non-canonical DER signature")]
    SigDer,
    #[error("Data push larger than necessary")]
    MinimalData,
    #[error("Only push operators allowed in signatures")]
    SigPushOnly,
    #[error("Non-canonical signature: S value is unnecessarily high")]
    SigHighS,
    #[error("Dummy CHECKMULTISIG argument must be zero")]
    SigNullDummy,
    #[error("Public key is neither compressed or uncompressed")]
    PubkeyType,
    #[error("Stack size must be exactly one after execution")]
    CleanStack,
    #[error("OP_IF/NOTIF argument must be minimal")]
    MinimalIf,
    #[error("Signature must be zero for failed CHECK(MULTI)SIG operation")]
    NullFail,

    // Soft-fork safeness
    #[error("NOPx reserved for soft-fork upgrades")]
    DiscourageUpgradableNops,
    #[error("Witness version reserved for soft-fork upgrades")]
    DiscourageUpgradableWitnessProgram,
    #[error("Taproot version reserved for soft-fork upgrades")]
    DiscourageUpgradableTaprootVersion,
    #[error("OP_SUCCESSx reserved for soft-fork upgrades")]
    DiscourageOpSuccess,
    #[error("Public key version reserved for soft-fork upgrades")]
    DiscourageUpgradablePubkeyType,

    // Segregated witness
    #[error("Witness program has incorrect length")]
    WitnessProgramWrongLength,
    #[error("Witness program was passed an empty witness")]
    WitnessProgramWitnessEmpty,
    #[error("Witness program hash mismatch")]
    WitnessProgramMismatch,
    #[error("Witness requires empty scriptSig")]
    WitnessMalleated,
    #[error("Witness requires only-redeemscript scriptSig")]
    WitnessMalleatedP2sh,
    #[error("Witness provided for non-witness script")]
    WitnessUnexpected,
    #[error("Using non-compressed keys in segwit")]
    WitnessPubkeyType,

    // Taproot
    #[error("Invalid Schnorr signature size")]
    SchnorrSigSize,
    #[error("Invalid Schnorr signature hash type")]
    SchnorrSigHashType,
    #[error("Invalid Schnorr signature")]
    SchnorrSig,
    #[error("Invalid Taproot control block size")]
    TaprootWrongControlSize,
    #[error("Too much signature validation relative to witness weight")]
    TapscriptValidationWeight,
    #[error("OP_CHECKMULTISIG(VERIFY) is not available in tapscript")]
    TapscriptCheckMultiSig,
    #[error("OP_IF/NOTIF argument must be minimal in tapscript")]
    TapscriptMinimalIf,
    #[error("Empty public key in tapscript")]
    TapscriptEmptyPubkey,

    // Constant scriptCode
    #[error("Using OP_CODESEPARATOR in non-witness script")]
    OpCodeSeparator,
    #[error("Signature is found in scriptCode")]
    SigFindAndDelete,

    #[error("Signature hash requires transaction data that was not supplied")]
    MissingPrecomputedData,
}

/// Any reason [`crate::verify_detailed`] can reject a spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum VerifyFailure {
    #[error(transparent)]
    Precondition(#[from] VerificationError),
    #[error("script verification failed: {0}")]
    Script(#[from] ScriptError),
}

/// Malformed push inside a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DecodeError {
    #[error("push length prefix at byte {position} is truncated")]
    MissingLength { position: usize },
    #[error("push at byte {position} needs {needed} bytes but only {available} remain")]
    TruncatedPush {
        position: usize,
        needed: usize,
        available: usize,
    },
}

impl From<DecodeError> for ScriptError {
    fn from(_: DecodeError) -> Self {
        ScriptError::BadOpcode
    }
}

/// Raw transaction bytes that are not a canonical transaction encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum TransactionDecodeError {
    #[error("transaction bytes could not be deserialized")]
    Malformed,
    #[error("transaction is followed by {0} unexpected bytes")]
    TrailingBytes(usize),
    #[error("transaction does not re-serialize to its {0}-byte encoding")]
    NonCanonical(usize),
}

/// Unknown name in a textual flag list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown verification flag `{name}`")]
pub struct ParseFlagsError {
    name: String,
}

impl ParseFlagsError {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
