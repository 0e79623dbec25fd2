//! Signature message digests for every script era.
//!
//! * legacy: the modified-transaction serialization hashed with double SHA256,
//! * witness v0: the BIP143 fixed-layout preimage,
//! * taproot: the BIP341 `TapSighash` tagged hash, extended by BIP342 for
//!   tapscript.

use bitcoin::{
    consensus,
    hashes::{sha256, sha256d, Hash, HashEngine},
    opcodes::all::OP_CODESEPARATOR,
    sighash::TapSighash,
    taproot::TapLeafHash,
    Transaction,
};

use crate::{
    codec::{write_compact_size, write_var_bytes, Instructions},
    error::ScriptError,
    tx::PrecomputedTransactionData,
    types::TransactionOutput,
};

pub(crate) const SIGHASH_DEFAULT: u8 = 0x00;
pub(crate) const SIGHASH_ALL: u8 = 0x01;
pub(crate) const SIGHASH_NONE: u8 = 0x02;
pub(crate) const SIGHASH_SINGLE: u8 = 0x03;
pub(crate) const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// Which rules a script (and the signatures inside it) is evaluated under.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum SigVersion {
    /// Bare scripts and P2SH redeem scripts.
    Base,
    /// P2WPKH and P2WSH.
    WitnessV0,
    /// Taproot key-path spends.
    Taproot,
    /// Leaf scripts of taproot script-path spends.
    Tapscript,
}

/// Taproot state a signature commits to, filled in while dispatching a spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExecutionData {
    pub tapleaf_hash: Option<TapLeafHash>,
    /// Opcode index of the last executed `OP_CODESEPARATOR`, or `u32::MAX`.
    pub code_separator_pos: u32,
    /// SHA256 of the compact-size-prefixed annex, if one was supplied.
    pub annex_hash: Option<sha256::Hash>,
    pub validation_weight_left: Option<i64>,
}

impl Default for ExecutionData {
    fn default() -> Self {
        Self {
            tapleaf_hash: None,
            code_separator_pos: u32::MAX,
            annex_hash: None,
            validation_weight_left: None,
        }
    }
}

/// Digest signed by a legacy (pre-segwit) signature.
///
/// `script_code` is the executed script from the last `OP_CODESEPARATOR`
/// onwards with the signatures already removed; remaining separators are
/// dropped during serialization.
pub(crate) fn legacy_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    hash_type: i32,
) -> sha256d::Hash {
    let base_type = (hash_type & 0x1f) as u8;
    let anyone_can_pay = hash_type & i32::from(SIGHASH_ANYONECANPAY) != 0;
    let hash_single = base_type == SIGHASH_SINGLE;
    let hash_none = base_type == SIGHASH_NONE;

    if input_index >= tx.input.len() || (hash_single && input_index >= tx.output.len()) {
        // Historical quirk: the message is the integer one.
        let mut one = [0u8; 32];
        one[0] = 1;
        return sha256d::Hash::from_byte_array(one);
    }

    let mut engine = sha256d::Hash::engine();
    engine.input(&tx.version.0.to_le_bytes());

    let inputs: Vec<usize> = if anyone_can_pay {
        vec![input_index]
    } else {
        (0..tx.input.len()).collect()
    };
    write_compact_size(&mut engine, inputs.len() as u64);
    for index in inputs {
        let input = &tx.input[index];
        engine.input(&consensus::serialize(&input.previous_output));
        if index == input_index {
            write_script_code(&mut engine, script_code);
        } else {
            write_compact_size(&mut engine, 0);
        }
        let sequence = if index != input_index && (hash_single || hash_none) {
            0
        } else {
            input.sequence.0
        };
        engine.input(&sequence.to_le_bytes());
    }

    let output_count = if hash_none {
        0
    } else if hash_single {
        input_index + 1
    } else {
        tx.output.len()
    };
    write_compact_size(&mut engine, output_count as u64);
    for (index, output) in tx.output.iter().take(output_count).enumerate() {
        if hash_single && index != input_index {
            engine.input(&(-1i64).to_le_bytes());
            write_compact_size(&mut engine, 0);
        } else {
            engine.input(&consensus::serialize(output));
        }
    }

    engine.input(&tx.lock_time.to_consensus_u32().to_le_bytes());
    engine.input(&hash_type.to_le_bytes());
    sha256d::Hash::from_engine(engine)
}

/// Serializes a legacy script code without its `OP_CODESEPARATOR`s.
///
/// The length prefix counts every byte except the separators even when a
/// malformed tail stops the copy early.
fn write_script_code<E: HashEngine>(engine: &mut E, script_code: &[u8]) {
    let mut pieces = Vec::new();
    let mut separators = 0usize;
    let mut piece_start = 0usize;

    let mut ops = Instructions::new(script_code);
    let mut parsed_to = 0usize;
    while let Some(op) = ops.next() {
        parsed_to = ops.cursor();
        match op {
            Ok(instruction) if instruction.opcode == OP_CODESEPARATOR => {
                pieces.push(&script_code[piece_start..instruction.position]);
                piece_start = parsed_to;
                separators += 1;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    if piece_start != script_code.len() {
        pieces.push(&script_code[piece_start..parsed_to.max(piece_start)]);
    }

    write_compact_size(engine, (script_code.len() - separators) as u64);
    for piece in pieces {
        engine.input(piece);
    }
}

/// BIP143 digest for witness v0 signatures.
pub(crate) fn segwit_v0_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    amount: u64,
    hash_type: i32,
    precomputed: &PrecomputedTransactionData,
) -> Result<sha256d::Hash, ScriptError> {
    let (Some(hash_prevouts), Some(hash_sequence), Some(hash_outputs)) = (
        precomputed.hash_prevouts,
        precomputed.hash_sequence,
        precomputed.hash_outputs,
    ) else {
        return Err(ScriptError::MissingPrecomputedData);
    };
    let input = tx
        .input
        .get(input_index)
        .ok_or(ScriptError::MissingPrecomputedData)?;

    let base_type = (hash_type & 0x1f) as u8;
    let anyone_can_pay = hash_type & i32::from(SIGHASH_ANYONECANPAY) != 0;
    let zero = [0u8; 32];

    let mut engine = sha256d::Hash::engine();
    engine.input(&tx.version.0.to_le_bytes());
    if anyone_can_pay {
        engine.input(&zero);
    } else {
        engine.input(hash_prevouts.as_byte_array());
    }
    if anyone_can_pay || base_type == SIGHASH_SINGLE || base_type == SIGHASH_NONE {
        engine.input(&zero);
    } else {
        engine.input(hash_sequence.as_byte_array());
    }

    engine.input(&consensus::serialize(&input.previous_output));
    write_var_bytes(&mut engine, script_code);
    engine.input(&amount.to_le_bytes());
    engine.input(&input.sequence.0.to_le_bytes());

    if base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        engine.input(hash_outputs.as_byte_array());
    } else if base_type == SIGHASH_SINGLE && input_index < tx.output.len() {
        let single = sha256d::Hash::hash(&consensus::serialize(&tx.output[input_index]));
        engine.input(single.as_byte_array());
    } else {
        engine.input(&zero);
    }

    engine.input(&tx.lock_time.to_consensus_u32().to_le_bytes());
    engine.input(&hash_type.to_le_bytes());
    Ok(sha256d::Hash::from_engine(engine))
}

/// BIP341/BIP342 digest for Schnorr signatures.
///
/// Fails with `SchnorrSigHashType` for undefined hash types and for
/// SIGHASH_SINGLE without a matching output.
pub(crate) fn taproot_sighash(
    tx: &Transaction,
    input_index: usize,
    spent_outputs: Option<&[TransactionOutput]>,
    hash_type: u8,
    sigversion: SigVersion,
    exec: &ExecutionData,
    precomputed: &PrecomputedTransactionData,
) -> Result<TapSighash, ScriptError> {
    let ext_flag: u8 = match sigversion {
        SigVersion::Taproot => 0,
        SigVersion::Tapscript => 1,
        SigVersion::Base | SigVersion::WitnessV0 => return Err(ScriptError::SchnorrSigHashType),
    };
    if !matches!(hash_type, 0x00..=0x03 | 0x81..=0x83) {
        return Err(ScriptError::SchnorrSigHashType);
    }
    if !precomputed.bip341_taproot_ready {
        return Err(ScriptError::MissingPrecomputedData);
    }
    let (
        Some(spent_outputs),
        Some(prevouts),
        Some(amounts),
        Some(scripts),
        Some(sequences),
        Some(outputs),
    ) = (
        spent_outputs,
        precomputed.prevouts_single_hash,
        precomputed.spent_amounts_single_hash,
        precomputed.spent_scripts_single_hash,
        precomputed.sequences_single_hash,
        precomputed.outputs_single_hash,
    )
    else {
        return Err(ScriptError::MissingPrecomputedData);
    };
    let (Some(input), Some(spent)) = (tx.input.get(input_index), spent_outputs.get(input_index))
    else {
        return Err(ScriptError::MissingPrecomputedData);
    };

    let output_type = if hash_type == SIGHASH_DEFAULT {
        SIGHASH_ALL
    } else {
        hash_type & 0x03
    };
    let anyone_can_pay = hash_type & SIGHASH_ANYONECANPAY != 0;

    let mut engine = TapSighash::engine();
    engine.input(&[0x00]);
    engine.input(&[hash_type]);
    engine.input(&tx.version.0.to_le_bytes());
    engine.input(&tx.lock_time.to_consensus_u32().to_le_bytes());
    if !anyone_can_pay {
        engine.input(prevouts.as_byte_array());
        engine.input(amounts.as_byte_array());
        engine.input(scripts.as_byte_array());
        engine.input(sequences.as_byte_array());
    }
    if output_type == SIGHASH_ALL {
        engine.input(outputs.as_byte_array());
    }

    let spend_type = (ext_flag << 1) | u8::from(exec.annex_hash.is_some());
    engine.input(&[spend_type]);
    if anyone_can_pay {
        engine.input(&consensus::serialize(&input.previous_output));
        engine.input(&spent.amount().to_le_bytes());
        write_var_bytes(&mut engine, spent.script_pubkey().as_bytes());
        engine.input(&input.sequence.0.to_le_bytes());
    } else {
        engine.input(&(input_index as u32).to_le_bytes());
    }
    if let Some(annex_hash) = exec.annex_hash {
        engine.input(annex_hash.as_byte_array());
    }

    if output_type == SIGHASH_SINGLE {
        let output = tx
            .output
            .get(input_index)
            .ok_or(ScriptError::SchnorrSigHashType)?;
        let single = sha256::Hash::hash(&consensus::serialize(output));
        engine.input(single.as_byte_array());
    }

    if ext_flag == 1 {
        let tapleaf_hash = exec
            .tapleaf_hash
            .ok_or(ScriptError::MissingPrecomputedData)?;
        engine.input(tapleaf_hash.as_byte_array());
        engine.input(&[0x00]);
        engine.input(&exec.code_separator_pos.to_le_bytes());
    }

    Ok(TapSighash::from_engine(engine))
}
