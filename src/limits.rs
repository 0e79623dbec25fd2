//! Protocol ceilings and BIP constants enforced by the interpreter.
//!
//! The values match Bitcoin Core's `script/script.h`, `script/interpreter.h` and
//! `primitives/transaction.h`.

/// Maximum serialized size of a legacy or witness v0 script.
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum size of a single stack element, including pushes and witness items.
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum number of non-push opcodes per legacy or witness v0 script.
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// Maximum combined depth of the main stack and the alt-stack.
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of public keys accepted by `OP_CHECKMULTISIG`.
pub const MAX_PUBKEYS_PER_MULTISIG: usize = 20;

/// Byte width of script numbers consumed by arithmetic opcodes.
pub const DEFAULT_SCRIPT_NUM_SIZE: usize = 4;

/// Byte width of script numbers consumed by `OP_CHECKLOCKTIMEVERIFY` and
/// `OP_CHECKSEQUENCEVERIFY`.
pub const LOCKTIME_SCRIPT_NUM_SIZE: usize = 5;

/// Lock times below this value are block heights, at or above it UNIX timestamps.
pub const LOCKTIME_THRESHOLD: i64 = 500_000_000;

pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_ffff;

/// Tapscript budget consumed by every executed non-empty signature (BIP342).
pub const VALIDATION_WEIGHT_PER_SIGOP_PASSED: i64 = 50;

/// Tapscript budget granted on top of the serialized witness size (BIP342).
pub const VALIDATION_WEIGHT_OFFSET: i64 = 50;

pub const TAPROOT_CONTROL_BASE_SIZE: usize = 33;
pub const TAPROOT_CONTROL_NODE_SIZE: usize = 32;
pub const TAPROOT_CONTROL_MAX_NODE_COUNT: usize = 128;
pub const TAPROOT_CONTROL_MAX_SIZE: usize =
    TAPROOT_CONTROL_BASE_SIZE + TAPROOT_CONTROL_NODE_SIZE * TAPROOT_CONTROL_MAX_NODE_COUNT;
pub const TAPROOT_LEAF_MASK: u8 = 0xfe;
pub const TAPROOT_LEAF_TAPSCRIPT: u8 = 0xc0;

/// First byte of an optional trailing taproot witness element (BIP341 annex).
pub const ANNEX_TAG: u8 = 0x50;

pub const WITNESS_V0_KEYHASH_SIZE: usize = 20;
pub const WITNESS_V0_SCRIPTHASH_SIZE: usize = 32;
pub const WITNESS_V1_TAPROOT_SIZE: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_block_ceiling_matches_bip341() {
        assert_eq!(TAPROOT_CONTROL_MAX_SIZE, 4129);
        assert_eq!(
            TAPROOT_CONTROL_MAX_SIZE,
            bitcoin::taproot::TAPROOT_CONTROL_MAX_SIZE
        );
        assert_eq!(TAPROOT_LEAF_TAPSCRIPT, bitcoin::taproot::TAPROOT_LEAF_TAPSCRIPT);
        assert_eq!(ANNEX_TAG, bitcoin::taproot::TAPROOT_ANNEX_PREFIX);
    }

    #[test]
    fn locktime_threshold_matches_bitcoin() {
        assert_eq!(
            LOCKTIME_THRESHOLD,
            i64::from(bitcoin::absolute::LOCK_TIME_THRESHOLD)
        );
    }
}
