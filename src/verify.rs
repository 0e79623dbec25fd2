//! Spend dispatch: scriptSig, scriptPubKey, P2SH redeem scripts and witness
//! programs of every known version.

use bitcoin::{
    hashes::{sha256, Hash, HashEngine},
    taproot::{TapLeafHash, TapNodeHash},
    Witness,
};
use tracing::trace;

use crate::{
    checker::{check_tap_tweak, TransactionChecker},
    classify::{ScriptKind, WitnessProgram},
    codec::{cast_to_bool, compact_size_len, is_push_only, push_data_script, write_var_bytes},
    error::{ScriptError, VerificationError},
    flags::VerificationFlags,
    interpreter::{eval_script, prescan_tapscript, Step},
    limits::{
        ANNEX_TAG, MAX_SCRIPT_ELEMENT_SIZE, MAX_STACK_SIZE, TAPROOT_CONTROL_BASE_SIZE,
        TAPROOT_CONTROL_MAX_SIZE, TAPROOT_CONTROL_NODE_SIZE, TAPROOT_LEAF_MASK,
        TAPROOT_LEAF_TAPSCRIPT, VALIDATION_WEIGHT_OFFSET,
    },
    sighash::{ExecutionData, SigVersion},
    stack::ScriptStack,
    types::TransactionOutput,
};

/// Everything one verification call reads, owned by that call alone.
pub(crate) struct VerificationContext<'a> {
    pub tx: &'a bitcoin::Transaction,
    pub input_index: usize,
    pub amount: u64,
    pub flags: VerificationFlags,
    pub spent_outputs: Option<&'a [TransactionOutput]>,
}

impl<'a> VerificationContext<'a> {
    /// Checks the caller-supplied configuration, in a fixed order, before
    /// any script runs. An empty spent-output set counts as absent.
    pub fn new(
        tx: &'a bitcoin::Transaction,
        input_index: usize,
        amount: u64,
        flags: VerificationFlags,
        spent_outputs: Option<&'a [TransactionOutput]>,
    ) -> Result<Self, VerificationError> {
        flags.validate()?;

        let spent_outputs = spent_outputs.filter(|spent| !spent.is_empty());
        if flags.contains(VerificationFlags::TAPROOT) && spent_outputs.is_none() {
            return Err(VerificationError::SpentOutputsRequired);
        }
        if spent_outputs.is_some_and(|spent| spent.len() != tx.input.len()) {
            return Err(VerificationError::SpentOutputsMismatch);
        }
        if input_index >= tx.input.len() {
            return Err(VerificationError::TxInputIndex);
        }

        Ok(Self {
            tx,
            input_index,
            amount,
            flags,
            spent_outputs,
        })
    }

    /// Runs the input under test against `script_pubkey`.
    pub fn verify(&self, script_pubkey: &[u8]) -> Result<(), ScriptError> {
        let input = &self.tx.input[self.input_index];
        let checker =
            TransactionChecker::new(self.tx, self.input_index, self.amount, self.spent_outputs);
        trace!(input = self.input_index, flags = %self.flags, "verifying input");
        verify_script(
            input.script_sig.as_bytes(),
            script_pubkey,
            &input.witness,
            self.flags,
            &checker,
        )
    }
}

/// Decides whether `script_sig` and `witness` unlock `script_pubkey`.
///
/// `flags` must already have passed [`VerificationFlags::validate`].
pub(crate) fn verify_script(
    script_sig: &[u8],
    script_pubkey: &[u8],
    witness: &Witness,
    flags: VerificationFlags,
    checker: &TransactionChecker<'_>,
) -> Result<(), ScriptError> {
    let mut exec = ExecutionData::default();

    if flags.contains(VerificationFlags::SIGPUSHONLY) && !is_push_only(script_sig) {
        return Err(ScriptError::SigPushOnly);
    }

    let mut stack = ScriptStack::new();
    eval_script(&mut stack, script_sig, flags, checker, SigVersion::Base, &mut exec)?;
    let stack_copy = flags
        .contains(VerificationFlags::P2SH)
        .then(|| stack.clone());

    eval_script(&mut stack, script_pubkey, flags, checker, SigVersion::Base, &mut exec)?;
    require_true_top(&stack)?;

    let kind = ScriptKind::classify(script_pubkey);
    trace!(kind = kind.name(), "dispatching on locking script");
    let mut had_witness = false;

    match kind {
        ScriptKind::PayToScriptHash => {
            if let Some(mut redeem_stack) = stack_copy {
                if !is_push_only(script_sig) {
                    return Err(ScriptError::SigPushOnly);
                }

                // The scriptPubKey consumed one element, so the copy is never empty.
                let redeem_script = redeem_stack.pop()?;
                trace!(len = redeem_script.len(), "evaluating p2sh redeem script");
                eval_script(
                    &mut redeem_stack,
                    &redeem_script,
                    flags,
                    checker,
                    SigVersion::Base,
                    &mut exec,
                )?;
                require_true_top(&redeem_stack)?;

                let redeem_kind = ScriptKind::classify(&redeem_script);
                if flags.contains(VerificationFlags::WITNESS) && redeem_kind.is_witness_program() {
                    had_witness = true;
                    if script_sig != push_data_script(&redeem_script).as_slice() {
                        return Err(ScriptError::WitnessMalleatedP2sh);
                    }
                    verify_witness_program(witness, redeem_kind, flags, checker, true)?;
                    redeem_stack.truncate(1);
                }
                stack = redeem_stack;
            }
        }
        kind if flags.contains(VerificationFlags::WITNESS) && kind.is_witness_program() => {
            had_witness = true;
            if !script_sig.is_empty() {
                return Err(ScriptError::WitnessMalleated);
            }
            verify_witness_program(witness, kind, flags, checker, false)?;
            // Keep a single element so a later CLEANSTACK check passes.
            stack.truncate(1);
        }
        _ => {}
    }

    if flags.contains(VerificationFlags::CLEANSTACK) && stack.len() != 1 {
        return Err(ScriptError::CleanStack);
    }

    if flags.contains(VerificationFlags::WITNESS) && !had_witness && !witness.is_empty() {
        return Err(ScriptError::WitnessUnexpected);
    }

    Ok(())
}

fn require_true_top(stack: &ScriptStack) -> Result<(), ScriptError> {
    match stack.last() {
        Some(top) if cast_to_bool(top) => Ok(()),
        _ => Err(ScriptError::EvalFalse),
    }
}

/// Runs the witness against a segwit `kind`; other kinds never reach here.
fn verify_witness_program(
    witness: &Witness,
    kind: ScriptKind<'_>,
    flags: VerificationFlags,
    checker: &TransactionChecker<'_>,
    is_p2sh: bool,
) -> Result<(), ScriptError> {
    let mut stack = ScriptStack::from_items(witness.iter().map(<[u8]>::to_vec).collect());
    let kind = match kind {
        // Taproot is only defined for outputs that are not wrapped in P2SH.
        ScriptKind::Taproot(program) if is_p2sh => {
            ScriptKind::WitnessUnknown(WitnessProgram { version: 1, program })
        }
        kind => kind,
    };
    trace!(kind = kind.name(), items = stack.len(), "verifying witness program");

    match kind {
        ScriptKind::WitnessV0ScriptHash(program) => {
            let witness_script = stack
                .pop()
                .map_err(|_| ScriptError::WitnessProgramWitnessEmpty)?;
            if sha256::Hash::hash(&witness_script).as_byte_array()[..] != program[..] {
                return Err(ScriptError::WitnessProgramMismatch);
            }
            let mut exec = ExecutionData::default();
            execute_witness_script(
                stack,
                &witness_script,
                flags,
                checker,
                SigVersion::WitnessV0,
                &mut exec,
            )
        }
        ScriptKind::WitnessV0KeyHash(program) => {
            if stack.len() != 2 {
                return Err(ScriptError::WitnessProgramMismatch);
            }
            let mut exec = ExecutionData::default();
            execute_witness_script(
                stack,
                &p2pkh_script_code(program),
                flags,
                checker,
                SigVersion::WitnessV0,
                &mut exec,
            )
        }
        ScriptKind::WitnessV0Invalid(_) => Err(ScriptError::WitnessProgramWrongLength),
        ScriptKind::Taproot(program) => {
            if !flags.contains(VerificationFlags::TAPROOT) {
                return Ok(());
            }
            verify_taproot_spend(stack, witness, program, flags, checker)
        }
        _ => {
            if flags.contains(VerificationFlags::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM) {
                Err(ScriptError::DiscourageUpgradableWitnessProgram)
            } else {
                Ok(())
            }
        }
    }
}

fn verify_taproot_spend(
    mut stack: ScriptStack,
    witness: &Witness,
    program: &[u8],
    flags: VerificationFlags,
    checker: &TransactionChecker<'_>,
) -> Result<(), ScriptError> {
    if stack.is_empty() {
        return Err(ScriptError::WitnessProgramWitnessEmpty);
    }

    let mut exec = ExecutionData::default();
    if stack.len() >= 2 && stack.last().and_then(<[u8]>::first) == Some(&ANNEX_TAG) {
        let annex = stack.pop()?;
        let mut engine = sha256::Hash::engine();
        write_var_bytes(&mut engine, &annex);
        exec.annex_hash = Some(sha256::Hash::from_engine(engine));
    }

    if stack.len() == 1 {
        let signature = stack.pop()?;
        trace!("taproot key path spend");
        return checker.check_schnorr_signature(&signature, program, SigVersion::Taproot, &exec);
    }

    let control = stack.pop()?;
    let script = stack.pop()?;
    if control.len() < TAPROOT_CONTROL_BASE_SIZE
        || control.len() > TAPROOT_CONTROL_MAX_SIZE
        || (control.len() - TAPROOT_CONTROL_BASE_SIZE) % TAPROOT_CONTROL_NODE_SIZE != 0
    {
        return Err(ScriptError::TaprootWrongControlSize);
    }

    let leaf_version = control[0] & TAPROOT_LEAF_MASK;
    let tapleaf_hash = compute_tapleaf_hash(leaf_version, &script);
    if !verify_taproot_commitment(&control, program, tapleaf_hash) {
        return Err(ScriptError::WitnessProgramMismatch);
    }
    exec.tapleaf_hash = Some(tapleaf_hash);
    trace!(
        leaf_version,
        depth = (control.len() - TAPROOT_CONTROL_BASE_SIZE) / TAPROOT_CONTROL_NODE_SIZE,
        "taproot script path spend"
    );

    if leaf_version == TAPROOT_LEAF_TAPSCRIPT {
        exec.validation_weight_left =
            Some(serialized_witness_size(witness) as i64 + VALIDATION_WEIGHT_OFFSET);
        return execute_witness_script(
            stack,
            &script,
            flags,
            checker,
            SigVersion::Tapscript,
            &mut exec,
        );
    }

    if flags.contains(VerificationFlags::DISCOURAGE_UPGRADABLE_TAPROOT_VERSION) {
        return Err(ScriptError::DiscourageUpgradableTaprootVersion);
    }
    Ok(())
}

/// Runs a witness script over the remaining witness items.
fn execute_witness_script(
    mut stack: ScriptStack,
    script: &[u8],
    flags: VerificationFlags,
    checker: &TransactionChecker<'_>,
    sigversion: SigVersion,
    exec: &mut ExecutionData,
) -> Result<(), ScriptError> {
    if sigversion == SigVersion::Tapscript {
        match prescan_tapscript(script, flags) {
            Step::Continue => {}
            Step::Succeed => {
                trace!("tapscript contains OP_SUCCESSx");
                return Ok(());
            }
            Step::Fail(err) => return Err(err),
        }
        if stack.len() > MAX_STACK_SIZE {
            return Err(ScriptError::StackSize);
        }
    }

    if stack.iter().any(|item| item.len() > MAX_SCRIPT_ELEMENT_SIZE) {
        return Err(ScriptError::PushSize);
    }

    eval_script(&mut stack, script, flags, checker, sigversion, exec)?;

    if stack.len() != 1 {
        return Err(ScriptError::CleanStack);
    }
    require_true_top(&stack)
}

/// `DUP HASH160 <program> EQUALVERIFY CHECKSIG`, the implied P2WPKH script.
fn p2pkh_script_code(key_hash: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[0x76, 0xa9, 0x14]);
    script.extend_from_slice(key_hash);
    script.extend_from_slice(&[0x88, 0xac]);
    script
}

fn compute_tapleaf_hash(leaf_version: u8, script: &[u8]) -> TapLeafHash {
    let mut engine = TapLeafHash::engine();
    engine.input(&[leaf_version]);
    write_var_bytes(&mut engine, script);
    TapLeafHash::from_engine(engine)
}

/// Folds the control block path into a merkle root and checks it against
/// the output key.
fn verify_taproot_commitment(control: &[u8], program: &[u8], tapleaf_hash: TapLeafHash) -> bool {
    let mut root = TapNodeHash::from(tapleaf_hash);
    for node in control[TAPROOT_CONTROL_BASE_SIZE..].chunks_exact(TAPROOT_CONTROL_NODE_SIZE) {
        let Ok(node) = <[u8; 32]>::try_from(node) else {
            return false;
        };
        root = TapNodeHash::from_node_hashes(root, TapNodeHash::from_byte_array(node));
    }
    check_tap_tweak(&control[1..TAPROOT_CONTROL_BASE_SIZE], program, root, control[0] & 1)
}

/// Size of the witness stack in its network serialization.
fn serialized_witness_size(witness: &Witness) -> usize {
    witness.iter().fold(compact_size_len(witness.len() as u64), |size, item| {
        size + compact_size_len(item.len() as u64) + item.len()
    })
}
