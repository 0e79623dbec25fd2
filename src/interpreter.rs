//! The script stack machine.
//!
//! [`eval_script`] runs one script over a caller-owned stack. Every failure
//! is a [`ScriptError`] returned by value; the dispatcher in `verify` decides
//! what the final stack means.

use bitcoin::{
    hashes::{hash160, ripemd160, sha1, sha256, sha256d, Hash},
    opcodes::{all, Opcode},
};

use crate::{
    checker::TransactionChecker,
    codec::{
        cast_to_bool, check_low_der_signature, classify_pubkey, decode_script_num,
        find_and_delete, is_defined_hashtype_signature, is_minimal_push,
        is_valid_signature_encoding, push_data_script, Instruction, Instructions, PubkeyEncoding,
    },
    error::ScriptError,
    flags::VerificationFlags,
    limits::{
        DEFAULT_SCRIPT_NUM_SIZE, LOCKTIME_SCRIPT_NUM_SIZE, MAX_OPS_PER_SCRIPT,
        MAX_PUBKEYS_PER_MULTISIG, MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPT_SIZE, MAX_STACK_SIZE,
        SEQUENCE_LOCKTIME_DISABLE_FLAG, VALIDATION_WEIGHT_PER_SIGOP_PASSED,
    },
    sighash::{ExecutionData, SigVersion},
    stack::ScriptStack,
};

/// Outcome of a stage that may end script execution early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    Succeed,
    Fail(ScriptError),
}

/// Scans a tapscript for OP_SUCCESSx before anything else runs.
///
/// Any OP_SUCCESSx makes the spend valid unconditionally (or fails it when
/// discouraged); an undecodable script fails with `BadOpcode`.
pub(crate) fn prescan_tapscript(script: &[u8], flags: VerificationFlags) -> Step {
    for instruction in Instructions::new(script) {
        match instruction {
            Err(_) => return Step::Fail(ScriptError::BadOpcode),
            Ok(instruction) if is_op_success(instruction.opcode.to_u8()) => {
                return if flags.contains(VerificationFlags::DISCOURAGE_OP_SUCCESS) {
                    Step::Fail(ScriptError::DiscourageOpSuccess)
                } else {
                    Step::Succeed
                };
            }
            Ok(_) => {}
        }
    }
    Step::Continue
}

fn is_op_success(opcode: u8) -> bool {
    matches!(
        opcode,
        80 | 98 | 126..=129 | 131..=134 | 137..=138 | 141..=142 | 149..=153 | 187..=254
    )
}

fn is_disabled(opcode: Opcode) -> bool {
    use all::*;
    matches!(
        opcode,
        OP_CAT
            | OP_SUBSTR
            | OP_LEFT
            | OP_RIGHT
            | OP_INVERT
            | OP_AND
            | OP_OR
            | OP_XOR
            | OP_2MUL
            | OP_2DIV
            | OP_MUL
            | OP_DIV
            | OP_MOD
            | OP_LSHIFT
            | OP_RSHIFT
    )
}

/// Tracks nested IF/ELSE branches without storing every boolean.
#[derive(Debug, Default)]
struct ConditionStack {
    size: usize,
    first_false: Option<usize>,
}

impl ConditionStack {
    fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn all_true(&self) -> bool {
        self.first_false.is_none()
    }

    fn push(&mut self, value: bool) {
        if self.first_false.is_none() && !value {
            self.first_false = Some(self.size);
        }
        self.size += 1;
    }

    fn pop(&mut self) -> Result<(), ScriptError> {
        if self.size == 0 {
            return Err(ScriptError::UnbalancedConditional);
        }
        self.size -= 1;
        if self.first_false == Some(self.size) {
            self.first_false = None;
        }
        Ok(())
    }

    fn toggle_top(&mut self) -> Result<(), ScriptError> {
        if self.size == 0 {
            return Err(ScriptError::UnbalancedConditional);
        }
        let top = self.size - 1;
        match self.first_false {
            None => self.first_false = Some(top),
            Some(pos) if pos == top => self.first_false = None,
            // An outer branch is false; toggling this one changes nothing.
            Some(_) => {}
        }
        Ok(())
    }
}

/// Runs `script` over `stack`.
pub(crate) fn eval_script(
    stack: &mut ScriptStack,
    script: &[u8],
    flags: VerificationFlags,
    checker: &TransactionChecker<'_>,
    sigversion: SigVersion,
    exec: &mut ExecutionData,
) -> Result<(), ScriptError> {
    if matches!(sigversion, SigVersion::Base | SigVersion::WitnessV0) && script.len() > MAX_SCRIPT_SIZE {
        return Err(ScriptError::ScriptSize);
    }
    exec.code_separator_pos = u32::MAX;

    let mut interpreter = Interpreter {
        stack,
        altstack: Vec::new(),
        conditions: ConditionStack::default(),
        script,
        code_start: 0,
        op_count: 0,
        flags,
        checker,
        sigversion,
        exec,
    };
    interpreter.run()
}

struct Interpreter<'s, 'c, 'tx> {
    stack: &'s mut ScriptStack,
    altstack: Vec<Vec<u8>>,
    conditions: ConditionStack,
    script: &'s [u8],
    /// Byte offset just past the last executed OP_CODESEPARATOR.
    code_start: usize,
    op_count: usize,
    flags: VerificationFlags,
    checker: &'c TransactionChecker<'tx>,
    sigversion: SigVersion,
    exec: &'s mut ExecutionData,
}

impl Interpreter<'_, '_, '_> {
    fn run(&mut self) -> Result<(), ScriptError> {
        let mut ops = Instructions::new(self.script);
        let mut opcode_pos: u32 = 0;
        while let Some(instruction) = ops.next() {
            self.step(instruction?, ops.cursor(), opcode_pos)?;
            if self.stack.len() + self.altstack.len() > MAX_STACK_SIZE {
                return Err(ScriptError::StackSize);
            }
            opcode_pos = opcode_pos.wrapping_add(1);
        }

        if self.conditions.is_empty() {
            Ok(())
        } else {
            Err(ScriptError::UnbalancedConditional)
        }
    }

    fn has(&self, flag: VerificationFlags) -> bool {
        self.flags.contains(flag)
    }

    fn require_minimal(&self) -> bool {
        self.has(VerificationFlags::MINIMALDATA)
    }

    fn is_legacy_or_v0(&self) -> bool {
        matches!(self.sigversion, SigVersion::Base | SigVersion::WitnessV0)
    }

    fn step(
        &mut self,
        instruction: Instruction<'_>,
        next_cursor: usize,
        opcode_pos: u32,
    ) -> Result<(), ScriptError> {
        let executing = self.conditions.all_true();
        let opcode = instruction.opcode;
        let byte = opcode.to_u8();

        if let Some(data) = instruction.data {
            if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
                return Err(ScriptError::PushSize);
            }
        }
        // OP_RESERVED and the small integers do not count.
        if self.is_legacy_or_v0() && byte > all::OP_PUSHNUM_16.to_u8() {
            self.op_count += 1;
            if self.op_count > MAX_OPS_PER_SCRIPT {
                return Err(ScriptError::OpCount);
            }
        }
        if is_disabled(opcode) {
            return Err(ScriptError::DisabledOpcode);
        }
        if opcode == all::OP_CODESEPARATOR
            && self.sigversion == SigVersion::Base
            && self.has(VerificationFlags::CONST_SCRIPTCODE)
        {
            return Err(ScriptError::OpCodeSeparator);
        }

        if let Some(data) = instruction.data {
            if executing {
                if self.require_minimal() && !is_minimal_push(opcode, data) {
                    return Err(ScriptError::MinimalData);
                }
                self.stack.push(data.to_vec());
            }
            return Ok(());
        }

        let is_conditional = (all::OP_IF.to_u8()..=all::OP_ENDIF.to_u8()).contains(&byte);
        if !executing && !is_conditional {
            return Ok(());
        }
        self.execute(opcode, executing, next_cursor, opcode_pos)
    }

    fn execute(
        &mut self,
        opcode: Opcode,
        executing: bool,
        next_cursor: usize,
        opcode_pos: u32,
    ) -> Result<(), ScriptError> {
        use all::*;

        let byte = opcode.to_u8();
        if opcode == OP_PUSHNUM_NEG1
            || (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&byte)
        {
            self.stack.push_num(i64::from(byte) - i64::from(OP_PUSHNUM_1.to_u8() - 1));
            return Ok(());
        }

        match opcode {
            // Control
            OP_NOP => {}
            OP_CLTV => {
                if self.has(VerificationFlags::CHECKLOCKTIMEVERIFY) {
                    let lock_time = self.peek_num(LOCKTIME_SCRIPT_NUM_SIZE)?;
                    if lock_time < 0 {
                        return Err(ScriptError::NegativeLockTime);
                    }
                    if !self.checker.check_lock_time(lock_time) {
                        return Err(ScriptError::UnsatisfiedLockTime);
                    }
                }
            }
            OP_CSV => {
                if self.has(VerificationFlags::CHECKSEQUENCEVERIFY) {
                    let sequence = self.peek_num(LOCKTIME_SCRIPT_NUM_SIZE)?;
                    if sequence < 0 {
                        return Err(ScriptError::NegativeLockTime);
                    }
                    if sequence & i64::from(SEQUENCE_LOCKTIME_DISABLE_FLAG) == 0
                        && !self.checker.check_sequence(sequence)
                    {
                        return Err(ScriptError::UnsatisfiedLockTime);
                    }
                }
            }
            OP_NOP1 | OP_NOP4 | OP_NOP5 | OP_NOP6 | OP_NOP7 | OP_NOP8 | OP_NOP9 | OP_NOP10 => {
                if self.has(VerificationFlags::DISCOURAGE_UPGRADABLE_NOPS) {
                    return Err(ScriptError::DiscourageUpgradableNops);
                }
            }
            OP_IF | OP_NOTIF => {
                let mut value = false;
                if executing {
                    let condition = self
                        .stack
                        .pop()
                        .map_err(|_| ScriptError::UnbalancedConditional)?;
                    self.check_minimal_if(&condition)?;
                    value = cast_to_bool(&condition);
                    if opcode == OP_NOTIF {
                        value = !value;
                    }
                }
                self.conditions.push(value);
            }
            OP_ELSE => self.conditions.toggle_top()?,
            OP_ENDIF => self.conditions.pop()?,
            OP_VERIFY => self.verify_top(ScriptError::Verify)?,
            OP_RETURN => return Err(ScriptError::OpReturn),

            // Stack
            OP_TOALTSTACK => {
                let value = self.stack.pop()?;
                self.altstack.push(value);
            }
            OP_FROMALTSTACK => {
                let value = self
                    .altstack
                    .pop()
                    .ok_or(ScriptError::InvalidAltstackOperation)?;
                self.stack.push(value);
            }
            OP_2DROP => {
                self.stack.require(2)?;
                self.stack.truncate(self.stack.len() - 2);
            }
            OP_2DUP => self.stack.copy_range(1, 2)?,
            OP_3DUP => self.stack.copy_range(2, 3)?,
            OP_2OVER => self.stack.copy_range(3, 2)?,
            OP_2ROT => {
                self.stack.require(6)?;
                let first = self.stack.remove(5)?;
                let second = self.stack.remove(4)?;
                self.stack.push(first);
                self.stack.push(second);
            }
            OP_2SWAP => {
                self.stack.swap(3, 1)?;
                self.stack.swap(2, 0)?;
            }
            OP_IFDUP => {
                let top = self.stack.top(0)?;
                if cast_to_bool(top) {
                    self.stack.copy_range(0, 1)?;
                }
            }
            OP_DEPTH => self.stack.push_num(self.stack.len() as i64),
            OP_DROP => {
                self.stack.pop()?;
            }
            OP_DUP => self.stack.copy_range(0, 1)?,
            OP_NIP => {
                self.stack.remove(1)?;
            }
            OP_OVER => self.stack.copy_range(1, 1)?,
            OP_PICK | OP_ROLL => {
                self.stack.require(2)?;
                let depth = self.pop_num()?;
                if depth < 0 || depth as usize >= self.stack.len() {
                    return Err(ScriptError::InvalidStackOperation);
                }
                let depth = depth as usize;
                if opcode == OP_ROLL {
                    let value = self.stack.remove(depth)?;
                    self.stack.push(value);
                } else {
                    self.stack.copy_range(depth, 1)?;
                }
            }
            OP_ROT => {
                self.stack.swap(2, 1)?;
                self.stack.swap(1, 0)?;
            }
            OP_SWAP => self.stack.swap(1, 0)?,
            OP_TUCK => {
                self.stack.require(2)?;
                let top = self.stack.pop()?;
                let second = self.stack.pop()?;
                self.stack.push(top.clone());
                self.stack.push(second);
                self.stack.push(top);
            }
            OP_SIZE => {
                let size = self.stack.top(0)?.len();
                self.stack.push_num(size as i64);
            }

            // Bitwise logic
            OP_EQUAL | OP_EQUALVERIFY => {
                self.stack.require(2)?;
                let b = self.stack.pop()?;
                let a = self.stack.pop()?;
                self.stack.push_bool(a == b);
                if opcode == OP_EQUALVERIFY {
                    self.verify_top(ScriptError::EqualVerify)?;
                }
            }

            // Arithmetic
            OP_1ADD | OP_1SUB | OP_NEGATE | OP_ABS | OP_NOT | OP_0NOTEQUAL => {
                self.stack.require(1)?;
                let n = self.pop_num()?;
                let result = match opcode {
                    OP_1ADD => n + 1,
                    OP_1SUB => n - 1,
                    OP_NEGATE => -n,
                    OP_ABS => n.abs(),
                    OP_NOT => i64::from(n == 0),
                    _ => i64::from(n != 0),
                };
                self.stack.push_num(result);
            }
            OP_ADD | OP_SUB | OP_BOOLAND | OP_BOOLOR | OP_NUMEQUAL | OP_NUMEQUALVERIFY
            | OP_NUMNOTEQUAL | OP_LESSTHAN | OP_GREATERTHAN | OP_LESSTHANOREQUAL
            | OP_GREATERTHANOREQUAL | OP_MIN | OP_MAX => {
                self.stack.require(2)?;
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                let result = match opcode {
                    OP_ADD => a + b,
                    OP_SUB => a - b,
                    OP_BOOLAND => i64::from(a != 0 && b != 0),
                    OP_BOOLOR => i64::from(a != 0 || b != 0),
                    OP_NUMEQUAL | OP_NUMEQUALVERIFY => i64::from(a == b),
                    OP_NUMNOTEQUAL => i64::from(a != b),
                    OP_LESSTHAN => i64::from(a < b),
                    OP_GREATERTHAN => i64::from(a > b),
                    OP_LESSTHANOREQUAL => i64::from(a <= b),
                    OP_GREATERTHANOREQUAL => i64::from(a >= b),
                    OP_MIN => a.min(b),
                    _ => a.max(b),
                };
                self.stack.push_num(result);
                if opcode == OP_NUMEQUALVERIFY {
                    self.verify_top(ScriptError::NumEqualVerify)?;
                }
            }
            OP_WITHIN => {
                self.stack.require(3)?;
                let max = self.pop_num()?;
                let min = self.pop_num()?;
                let value = self.pop_num()?;
                self.stack.push_bool(min <= value && value < max);
            }

            // Crypto
            OP_RIPEMD160 => self.hash_top(|data| ripemd160::Hash::hash(data).to_byte_array().to_vec())?,
            OP_SHA1 => self.hash_top(|data| sha1::Hash::hash(data).to_byte_array().to_vec())?,
            OP_SHA256 => self.hash_top(|data| sha256::Hash::hash(data).to_byte_array().to_vec())?,
            OP_HASH160 => self.hash_top(|data| hash160::Hash::hash(data).to_byte_array().to_vec())?,
            OP_HASH256 => self.hash_top(|data| sha256d::Hash::hash(data).to_byte_array().to_vec())?,
            OP_CODESEPARATOR => {
                self.code_start = next_cursor;
                self.exec.code_separator_pos = opcode_pos;
            }
            OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                self.stack.require(2)?;
                let pubkey = self.stack.pop()?;
                let sig = self.stack.pop()?;
                let success = self.eval_checksig(&sig, &pubkey)?;
                self.stack.push_bool(success);
                if opcode == OP_CHECKSIGVERIFY {
                    self.verify_top(ScriptError::CheckSigVerify)?;
                }
            }
            OP_CHECKSIGADD => {
                if self.is_legacy_or_v0() {
                    return Err(ScriptError::BadOpcode);
                }
                self.stack.require(3)?;
                let pubkey = self.stack.top(0)?.to_vec();
                let n = decode_script_num(
                    self.stack.top(1)?,
                    self.require_minimal(),
                    DEFAULT_SCRIPT_NUM_SIZE,
                )?;
                let sig = self.stack.top(2)?.to_vec();
                let success = self.eval_checksig(&sig, &pubkey)?;
                self.stack.truncate(self.stack.len() - 3);
                self.stack.push_num(if success { n + 1 } else { n });
            }
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                let success = self.check_multisig()?;
                self.stack.push_bool(success);
                if opcode == OP_CHECKMULTISIGVERIFY {
                    self.verify_top(ScriptError::CheckMultiSigVerify)?;
                }
            }

            _ => return Err(ScriptError::BadOpcode),
        }

        Ok(())
    }

    fn check_minimal_if(&self, condition: &[u8]) -> Result<(), ScriptError> {
        let minimal = condition.is_empty() || condition == [1];
        match self.sigversion {
            SigVersion::Tapscript if !minimal => Err(ScriptError::TapscriptMinimalIf),
            SigVersion::WitnessV0 if !minimal && self.has(VerificationFlags::MINIMALIF) => {
                Err(ScriptError::MinimalIf)
            }
            _ => Ok(()),
        }
    }

    /// Pops the top element if it is true, otherwise fails with `error`.
    fn verify_top(&mut self, error: ScriptError) -> Result<(), ScriptError> {
        if cast_to_bool(self.stack.top(0)?) {
            self.stack.pop()?;
            Ok(())
        } else {
            Err(error)
        }
    }

    fn pop_num(&mut self) -> Result<i64, ScriptError> {
        let value = decode_script_num(
            self.stack.top(0)?,
            self.require_minimal(),
            DEFAULT_SCRIPT_NUM_SIZE,
        )?;
        self.stack.pop()?;
        Ok(value)
    }

    fn peek_num(&self, max_len: usize) -> Result<i64, ScriptError> {
        decode_script_num(self.stack.top(0)?, self.require_minimal(), max_len)
    }

    fn hash_top(&mut self, hash: impl FnOnce(&[u8]) -> Vec<u8>) -> Result<(), ScriptError> {
        let data = self.stack.pop()?;
        self.stack.push(hash(&data));
        Ok(())
    }

    fn check_signature_encoding(&self, sig: &[u8]) -> Result<(), ScriptError> {
        // An empty signature is the compact way to fail a check on purpose.
        if sig.is_empty() {
            return Ok(());
        }
        let strict = VerificationFlags::DERSIG | VerificationFlags::LOW_S | VerificationFlags::STRICTENC;
        if self.flags.intersects(strict) && !is_valid_signature_encoding(sig) {
            return Err(ScriptError::SigDer);
        }
        if self.has(VerificationFlags::LOW_S) {
            check_low_der_signature(sig)?;
        }
        if self.has(VerificationFlags::STRICTENC) && !is_defined_hashtype_signature(sig) {
            return Err(ScriptError::SigHashType);
        }
        Ok(())
    }

    fn check_pubkey_encoding(&self, pubkey: &[u8]) -> Result<(), ScriptError> {
        let encoding = classify_pubkey(pubkey);
        if self.has(VerificationFlags::STRICTENC)
            && !matches!(encoding, PubkeyEncoding::Compressed | PubkeyEncoding::Uncompressed)
        {
            return Err(ScriptError::PubkeyType);
        }
        if self.has(VerificationFlags::WITNESS_PUBKEYTYPE)
            && self.sigversion == SigVersion::WitnessV0
            && encoding != PubkeyEncoding::Compressed
        {
            return Err(ScriptError::WitnessPubkeyType);
        }
        Ok(())
    }

    /// Script code for ECDSA checks: everything after the last executed
    /// OP_CODESEPARATOR, with `sigs` removed in legacy scripts.
    fn script_code<'a>(&self, sigs: impl IntoIterator<Item = &'a [u8]>) -> Result<Vec<u8>, ScriptError> {
        let mut script_code = self.script[self.code_start..].to_vec();
        if self.sigversion != SigVersion::Base {
            return Ok(script_code);
        }
        for sig in sigs {
            let (rewritten, found) = find_and_delete(&script_code, &push_data_script(sig));
            if found > 0 {
                if self.has(VerificationFlags::CONST_SCRIPTCODE) {
                    return Err(ScriptError::SigFindAndDelete);
                }
                script_code = rewritten;
            }
        }
        Ok(script_code)
    }

    fn eval_checksig(&mut self, sig: &[u8], pubkey: &[u8]) -> Result<bool, ScriptError> {
        match self.sigversion {
            SigVersion::Base | SigVersion::WitnessV0 => {
                let script_code = self.script_code([sig])?;
                self.check_signature_encoding(sig)?;
                self.check_pubkey_encoding(pubkey)?;
                let success =
                    self.checker
                        .check_ecdsa_signature(sig, pubkey, &script_code, self.sigversion);
                if !success && self.has(VerificationFlags::NULLFAIL) && !sig.is_empty() {
                    return Err(ScriptError::NullFail);
                }
                Ok(success)
            }
            SigVersion::Tapscript => self.eval_checksig_tapscript(sig, pubkey),
            // Key-path spends never execute a script.
            SigVersion::Taproot => Err(ScriptError::BadOpcode),
        }
    }

    fn eval_checksig_tapscript(&mut self, sig: &[u8], pubkey: &[u8]) -> Result<bool, ScriptError> {
        let success = !sig.is_empty();
        if success {
            let weight = self
                .exec
                .validation_weight_left
                .as_mut()
                .ok_or(ScriptError::TapscriptValidationWeight)?;
            *weight -= VALIDATION_WEIGHT_PER_SIGOP_PASSED;
            if *weight < 0 {
                return Err(ScriptError::TapscriptValidationWeight);
            }
        }

        match pubkey.len() {
            0 => return Err(ScriptError::TapscriptEmptyPubkey),
            32 => {
                if success {
                    self.checker
                        .check_schnorr_signature(sig, pubkey, self.sigversion, &*self.exec)?;
                }
            }
            _ => {
                if self.has(VerificationFlags::DISCOURAGE_UPGRADABLE_PUBKEYTYPE) {
                    return Err(ScriptError::DiscourageUpgradablePubkeyType);
                }
            }
        }
        Ok(success)
    }

    fn check_multisig(&mut self) -> Result<bool, ScriptError> {
        if self.sigversion == SigVersion::Tapscript {
            return Err(ScriptError::TapscriptCheckMultiSig);
        }
        let minimal = self.require_minimal();

        // Positions count from the top, starting at 1 for the key count.
        let mut i = 1usize;
        self.stack.require(i)?;
        let key_count = decode_script_num(self.stack.top(i - 1)?, minimal, DEFAULT_SCRIPT_NUM_SIZE)?;
        if !(0..=MAX_PUBKEYS_PER_MULTISIG as i64).contains(&key_count) {
            return Err(ScriptError::PubkeyCount);
        }
        let mut keys_left = key_count as usize;
        self.op_count += keys_left;
        if self.op_count > MAX_OPS_PER_SCRIPT {
            return Err(ScriptError::OpCount);
        }
        i += 1;
        let mut ikey = i;
        // Items above this position are keys and counts, never signatures.
        let mut ikey2 = keys_left + 2;
        i += keys_left;
        self.stack.require(i)?;

        let sig_count = decode_script_num(self.stack.top(i - 1)?, minimal, DEFAULT_SCRIPT_NUM_SIZE)?;
        if sig_count < 0 || sig_count > key_count {
            return Err(ScriptError::SigCount);
        }
        let mut sigs_left = sig_count as usize;
        i += 1;
        let mut isig = i;
        i += sigs_left;
        self.stack.require(i)?;

        let sigs = (0..sigs_left)
            .map(|k| self.stack.top(isig + k - 1).map(<[u8]>::to_vec))
            .collect::<Result<Vec<_>, _>>()?;
        let script_code = self.script_code(sigs.iter().map(Vec::as_slice))?;

        let mut success = true;
        while success && sigs_left > 0 {
            let sig = self.stack.top(isig - 1)?.to_vec();
            let pubkey = self.stack.top(ikey - 1)?.to_vec();
            // Encoding is checked pair by pair, so the evaluation order is observable.
            self.check_signature_encoding(&sig)?;
            self.check_pubkey_encoding(&pubkey)?;
            if self
                .checker
                .check_ecdsa_signature(&sig, &pubkey, &script_code, self.sigversion)
            {
                isig += 1;
                sigs_left -= 1;
            }
            ikey += 1;
            keys_left -= 1;
            if sigs_left > keys_left {
                success = false;
            }
        }

        while i > 1 {
            i -= 1;
            if !success
                && self.has(VerificationFlags::NULLFAIL)
                && ikey2 == 0
                && !self.stack.top(0)?.is_empty()
            {
                return Err(ScriptError::NullFail);
            }
            ikey2 = ikey2.saturating_sub(1);
            self.stack.pop()?;
        }

        // The historical extra argument.
        let dummy = self.stack.pop()?;
        if self.has(VerificationFlags::NULLDUMMY) && !dummy.is_empty() {
            return Err(ScriptError::SigNullDummy);
        }
        Ok(success)
    }
}
