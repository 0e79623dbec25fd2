//! Byte-level codecs shared by the interpreter and the sighash code.
//!
//! Everything in here operates on untrusted input and reports malformed data
//! through return values; nothing indexes past the end of a slice.

use bitcoin::{
    hashes::HashEngine,
    opcodes::{all, Opcode},
    secp256k1::ecdsa::Signature as EcdsaSignature,
};

use crate::error::{DecodeError, ScriptError};

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;

/// Number of bytes the compact-size encoding of `n` occupies.
pub(crate) fn compact_size_len(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Feeds the compact-size encoding of `n` into a hash engine.
pub(crate) fn write_compact_size<E: HashEngine>(engine: &mut E, n: u64) {
    match n {
        0..=0xfc => engine.input(&[n as u8]),
        0xfd..=0xffff => {
            engine.input(&[0xfd]);
            engine.input(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            engine.input(&[0xfe]);
            engine.input(&(n as u32).to_le_bytes());
        }
        _ => {
            engine.input(&[0xff]);
            engine.input(&n.to_le_bytes());
        }
    }
}

/// Feeds a length-prefixed byte string (script or witness item) into a hash engine.
pub(crate) fn write_var_bytes<E: HashEngine>(engine: &mut E, bytes: &[u8]) {
    write_compact_size(engine, bytes.len() as u64);
    engine.input(bytes);
}

/// One decoded script operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Instruction<'a> {
    /// Byte offset of the opcode within the script.
    pub position: usize,
    pub opcode: Opcode,
    /// Payload of `OP_0` through `OP_PUSHDATA4`; `None` for every other opcode.
    pub data: Option<&'a [u8]>,
}

/// Iterator over the operations of a raw script.
///
/// Stops after the first malformed push, yielding its error once.
#[derive(Debug, Clone)]
pub(crate) struct Instructions<'a> {
    script: &'a [u8],
    cursor: usize,
    failed: bool,
}

impl<'a> Instructions<'a> {
    pub(crate) fn new(script: &'a [u8]) -> Self {
        Self {
            script,
            cursor: 0,
            failed: false,
        }
    }

    /// Offset of the first byte not yet consumed.
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    fn read_push_len(&mut self, position: usize, width: usize) -> Result<usize, DecodeError> {
        let bytes = self
            .script
            .get(self.cursor..self.cursor + width)
            .ok_or(DecodeError::MissingLength { position })?;
        self.cursor += width;
        let mut le = [0u8; 4];
        le[..width].copy_from_slice(bytes);
        Ok(u32::from_le_bytes(le) as usize)
    }

    fn decode_next(&mut self) -> Result<Instruction<'a>, DecodeError> {
        let position = self.cursor;
        let byte = self.script[position];
        self.cursor += 1;

        let len = match byte {
            0x00..=0x4b => byte as usize,
            OP_PUSHDATA1 => self.read_push_len(position, 1)?,
            OP_PUSHDATA2 => self.read_push_len(position, 2)?,
            OP_PUSHDATA4 => self.read_push_len(position, 4)?,
            _ => {
                return Ok(Instruction {
                    position,
                    opcode: Opcode::from(byte),
                    data: None,
                })
            }
        };

        let available = self.script.len() - self.cursor;
        if len > available {
            return Err(DecodeError::TruncatedPush {
                position,
                needed: len,
                available,
            });
        }
        let data = &self.script[self.cursor..self.cursor + len];
        self.cursor += len;

        Ok(Instruction {
            position,
            opcode: Opcode::from(byte),
            data: Some(data),
        })
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor >= self.script.len() {
            return None;
        }
        let result = self.decode_next();
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// True when the script consists solely of data pushes and small integers.
///
/// `OP_RESERVED` counts as a push here, matching the historical rule.
pub(crate) fn is_push_only(script: &[u8]) -> bool {
    Instructions::new(script).all(|instruction| match instruction {
        Ok(instruction) => instruction.opcode.to_u8() <= all::OP_PUSHNUM_16.to_u8(),
        Err(_) => false,
    })
}

/// True when `data` is pushed with the shortest possible opcode.
pub(crate) fn is_minimal_push(opcode: Opcode, data: &[u8]) -> bool {
    let opcode = opcode.to_u8();
    match data {
        [] => opcode == all::OP_PUSHBYTES_0.to_u8(),
        [value @ 1..=16] => opcode == all::OP_PUSHNUM_1.to_u8() + value - 1,
        [0x81] => opcode == all::OP_PUSHNUM_NEG1.to_u8(),
        _ if data.len() <= 75 => usize::from(opcode) == data.len(),
        _ if data.len() <= 0xff => opcode == OP_PUSHDATA1,
        _ if data.len() <= 0xffff => opcode == OP_PUSHDATA2,
        _ => true,
    }
}

/// Encodes `data` as a single push operation.
///
/// Uses a direct push or the narrowest `OP_PUSHDATA`, never the small-integer
/// opcodes, so an empty slice becomes `OP_0`.
pub(crate) fn push_data_script(data: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(data.len() + 5);
    match data.len() {
        len @ 0..=0x4b => script.push(len as u8),
        len @ 0x4c..=0xff => {
            script.push(OP_PUSHDATA1);
            script.push(len as u8);
        }
        len @ 0x100..=0xffff => {
            script.push(OP_PUSHDATA2);
            script.extend_from_slice(&(len as u16).to_le_bytes());
        }
        len => {
            script.push(OP_PUSHDATA4);
            script.extend_from_slice(&(len as u32).to_le_bytes());
        }
    }
    script.extend_from_slice(data);
    script
}

/// Removes every occurrence of `pattern` that starts on an opcode boundary.
///
/// Returns the rewritten script and the number of removed occurrences. A
/// malformed tail is kept verbatim.
pub(crate) fn find_and_delete(script: &[u8], pattern: &[u8]) -> (Vec<u8>, usize) {
    if pattern.is_empty() {
        return (script.to_vec(), 0);
    }

    let mut result = Vec::with_capacity(script.len());
    let mut found = 0;
    let mut cursor = 0;
    let mut kept_from = 0;
    loop {
        result.extend_from_slice(&script[kept_from..cursor]);
        while script[cursor..].starts_with(pattern) {
            cursor += pattern.len();
            found += 1;
        }
        kept_from = cursor;

        if cursor >= script.len() {
            break;
        }
        let mut ops = Instructions::new(&script[cursor..]);
        match ops.next() {
            Some(Ok(_)) => cursor += ops.cursor(),
            _ => break,
        }
    }

    if found == 0 {
        return (script.to_vec(), 0);
    }
    result.extend_from_slice(&script[kept_from..]);
    (result, found)
}

/// Interprets a stack element as a boolean; negative zero is false.
pub(crate) fn cast_to_bool(data: &[u8]) -> bool {
    for (index, &byte) in data.iter().enumerate() {
        if byte != 0 {
            // The sign bit alone in the last byte is negative zero.
            return !(index == data.len() - 1 && byte == 0x80);
        }
    }
    false
}

/// Minimal little-endian sign-magnitude encoding of a script number.
pub(crate) fn encode_script_num(value: i64) -> Vec<u8> {
    let mut result = Vec::new();
    let mut magnitude = value.unsigned_abs();
    while magnitude > 0 {
        result.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }

    if let Some(last) = result.last_mut() {
        if *last & 0x80 != 0 {
            result.push(if value < 0 { 0x80 } else { 0x00 });
        } else if value < 0 {
            *last |= 0x80;
        }
    }
    result
}

/// Decodes a script number of at most `max_len` bytes.
pub(crate) fn decode_script_num(
    bytes: &[u8],
    require_minimal: bool,
    max_len: usize,
) -> Result<i64, ScriptError> {
    debug_assert!(max_len <= 8);
    if bytes.len() > max_len {
        return Err(ScriptError::NumberOverflow);
    }
    if require_minimal && !is_minimally_encoded(bytes) {
        return Err(ScriptError::NonMinimalNumber);
    }

    let Some((&last, _)) = bytes.split_last() else {
        return Ok(0);
    };
    let mut magnitude: i64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        magnitude |= i64::from(byte) << (8 * i);
    }
    if last & 0x80 != 0 {
        magnitude &= !(0x80i64 << (8 * (bytes.len() - 1)));
        Ok(-magnitude)
    } else {
        Ok(magnitude)
    }
}

fn is_minimally_encoded(bytes: &[u8]) -> bool {
    match bytes {
        [] => true,
        [.., last] if last & 0x7f != 0 => true,
        [_] => false,
        [.., penultimate, _] => penultimate & 0x80 != 0,
    }
}

/// Strict DER check (BIP66) on a signature that still carries its hash-type byte.
pub(crate) fn is_valid_signature_encoding(sig: &[u8]) -> bool {
    // 0x30 [total-length] 0x02 [R-length] [R] 0x02 [S-length] [S] [sighash]
    if sig.len() < 9 || sig.len() > 73 {
        return false;
    }
    if sig[0] != 0x30 || usize::from(sig[1]) != sig.len() - 3 {
        return false;
    }

    let len_r = usize::from(sig[3]);
    if 5 + len_r >= sig.len() {
        return false;
    }
    let len_s = usize::from(sig[5 + len_r]);
    if len_r + len_s + 7 != sig.len() {
        return false;
    }

    if sig[2] != 0x02 || len_r == 0 || sig[4] & 0x80 != 0 {
        return false;
    }
    if len_r > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
        return false;
    }

    if sig[len_r + 4] != 0x02 || len_s == 0 || sig[len_r + 6] & 0x80 != 0 {
        return false;
    }
    if len_s > 1 && sig[len_r + 6] == 0x00 && sig[len_r + 7] & 0x80 == 0 {
        return false;
    }

    true
}

/// Fails with `SigDer` on bad encodings and `SigHighS` when S is above half the order.
pub(crate) fn check_low_der_signature(sig: &[u8]) -> Result<(), ScriptError> {
    if !is_valid_signature_encoding(sig) {
        return Err(ScriptError::SigDer);
    }
    let Some(signature) = parse_ecdsa_signature_lax(&sig[..sig.len() - 1]) else {
        return Err(ScriptError::SigHighS);
    };
    let mut normalized = signature;
    normalized.normalize_s();
    if normalized.serialize_compact() != signature.serialize_compact() {
        return Err(ScriptError::SigHighS);
    }
    Ok(())
}

/// True for SIGHASH_ALL, NONE or SINGLE, optionally with ANYONECANPAY.
pub(crate) fn is_defined_hashtype_signature(sig: &[u8]) -> bool {
    match sig.last() {
        Some(&hash_type) => matches!(hash_type & !0x80, 0x01..=0x03),
        None => false,
    }
}

/// Permissive DER parser used for the actual verification, like OpenSSL-era nodes.
pub(crate) fn parse_ecdsa_signature_lax(der: &[u8]) -> Option<EcdsaSignature> {
    EcdsaSignature::from_der_lax(der).ok()
}

/// Serialized public key shapes the interpreter distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PubkeyEncoding {
    Compressed,
    Uncompressed,
    XOnly,
    Unknown,
}

pub(crate) fn classify_pubkey(pubkey: &[u8]) -> PubkeyEncoding {
    match pubkey {
        [0x02 | 0x03, rest @ ..] if rest.len() == 32 => PubkeyEncoding::Compressed,
        [0x04, rest @ ..] if rest.len() == 64 => PubkeyEncoding::Uncompressed,
        _ if pubkey.len() == 32 => PubkeyEncoding::XOnly,
        _ => PubkeyEncoding::Unknown,
    }
}
