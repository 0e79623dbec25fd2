//! Output-script templates that change how a spend is evaluated.

use bitcoin::opcodes::all;

use crate::limits::{WITNESS_V0_KEYHASH_SIZE, WITNESS_V0_SCRIPTHASH_SIZE, WITNESS_V1_TAPROOT_SIZE};

/// A version byte plus 2 to 40 bytes of program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WitnessProgram<'a> {
    pub version: u8,
    pub program: &'a [u8],
}

/// Execution shape selected by a locking script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScriptKind<'a> {
    /// `DUP HASH160 <20> EQUALVERIFY CHECKSIG`; evaluated like any bare script.
    PayToPubkeyHash,
    /// `HASH160 <20> EQUAL` (BIP16).
    PayToScriptHash,
    WitnessV0KeyHash(&'a [u8]),
    WitnessV0ScriptHash(&'a [u8]),
    /// Version 0 with a program that is neither 20 nor 32 bytes.
    WitnessV0Invalid(&'a [u8]),
    Taproot(&'a [u8]),
    /// Any other version or length, reserved for future soft forks.
    WitnessUnknown(WitnessProgram<'a>),
    Bare,
}

impl<'a> ScriptKind<'a> {
    /// Picks the template of a locking script; the dispatcher matches on it.
    pub fn classify(script: &'a [u8]) -> Self {
        if is_p2sh(script) {
            return ScriptKind::PayToScriptHash;
        }
        if let Some(witness) = witness_program(script) {
            return ScriptKind::from_witness_program(witness);
        }
        if is_p2pkh(script) {
            return ScriptKind::PayToPubkeyHash;
        }
        ScriptKind::Bare
    }

    fn from_witness_program(witness: WitnessProgram<'a>) -> Self {
        match (witness.version, witness.program.len()) {
            (0, WITNESS_V0_KEYHASH_SIZE) => ScriptKind::WitnessV0KeyHash(witness.program),
            (0, WITNESS_V0_SCRIPTHASH_SIZE) => ScriptKind::WitnessV0ScriptHash(witness.program),
            (0, _) => ScriptKind::WitnessV0Invalid(witness.program),
            (1, WITNESS_V1_TAPROOT_SIZE) => ScriptKind::Taproot(witness.program),
            _ => ScriptKind::WitnessUnknown(witness),
        }
    }

    /// True for every kind that is spent through the witness.
    pub fn is_witness_program(&self) -> bool {
        matches!(
            self,
            ScriptKind::WitnessV0KeyHash(_)
                | ScriptKind::WitnessV0ScriptHash(_)
                | ScriptKind::WitnessV0Invalid(_)
                | ScriptKind::Taproot(_)
                | ScriptKind::WitnessUnknown(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScriptKind::PayToPubkeyHash => "p2pkh",
            ScriptKind::PayToScriptHash => "p2sh",
            ScriptKind::WitnessV0KeyHash(_) => "p2wpkh",
            ScriptKind::WitnessV0ScriptHash(_) => "p2wsh",
            ScriptKind::WitnessV0Invalid(_) => "witness_v0_invalid",
            ScriptKind::Taproot(_) => "p2tr",
            ScriptKind::WitnessUnknown(_) => "witness_unknown",
            ScriptKind::Bare => "bare",
        }
    }
}

/// Splits a witness program into version and program (BIP141 template).
fn witness_program(script: &[u8]) -> Option<WitnessProgram<'_>> {
    if !(4..=42).contains(&script.len()) {
        return None;
    }
    let version = match script[0] {
        0x00 => 0,
        op @ 0x51..=0x60 => op - 0x50,
        _ => return None,
    };
    if usize::from(script[1]) + 2 != script.len() {
        return None;
    }
    Some(WitnessProgram {
        version,
        program: &script[2..],
    })
}

fn is_p2sh(script: &[u8]) -> bool {
    script.len() == 23
        && script[0] == all::OP_HASH160.to_u8()
        && script[1] == 0x14
        && script[22] == all::OP_EQUAL.to_u8()
}

fn is_p2pkh(script: &[u8]) -> bool {
    script.len() == 25
        && script[0] == all::OP_DUP.to_u8()
        && script[1] == all::OP_HASH160.to_u8()
        && script[2] == 0x14
        && script[23] == all::OP_EQUALVERIFY.to_u8()
        && script[24] == all::OP_CHECKSIG.to_u8()
}
