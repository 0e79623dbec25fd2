//! Script verification flags.
//!
//! Bit positions follow Bitcoin Core's `SCRIPT_VERIFY_*` constants so flag
//! values can be exchanged with other implementations unchanged.

use core::{fmt, str::FromStr};

use crate::error::{ParseFlagsError, VerificationError};

bitflags::bitflags! {
    /// Independently toggleable rule sets applied while verifying an input.
    ///
    /// `!` complements within the defined bits, so `ALL & !X` removes exactly
    /// the rules in `X`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct VerificationFlags: u32 {
        /// Evaluate P2SH subscripts (BIP16).
        const P2SH = 1 << 0;

        /// Non-strict-DER signatures, undefined hash types and pubkeys that are
        /// neither compressed nor uncompressed fail the script.
        const STRICTENC = 1 << 1;

        /// Enforce strict DER signature encoding (BIP66).
        const DERSIG = 1 << 2;

        /// Signatures with S above half the curve order fail (BIP62 rule 5).
        const LOW_S = 1 << 3;

        /// The dummy element consumed by CHECKMULTISIG must be empty (BIP147).
        const NULLDUMMY = 1 << 4;

        /// The scriptSig may only contain push operations.
        const SIGPUSHONLY = 1 << 5;

        /// Pushes and script numbers must use their minimal encoding.
        const MINIMALDATA = 1 << 6;

        /// Executing NOP1 or NOP4..NOP10 fails the script.
        const DISCOURAGE_UPGRADABLE_NOPS = 1 << 7;

        /// Exactly one element must remain on the stack after evaluation.
        const CLEANSTACK = 1 << 8;

        /// Enable OP_CHECKLOCKTIMEVERIFY (BIP65).
        const CHECKLOCKTIMEVERIFY = 1 << 9;

        /// Enable OP_CHECKSEQUENCEVERIFY (BIP112).
        const CHECKSEQUENCEVERIFY = 1 << 10;

        /// Enable segregated witness programs (BIP141/BIP143).
        const WITNESS = 1 << 11;

        /// Spending witness versions 2..16 or non-standard program sizes fails.
        const DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM = 1 << 12;

        /// IF/NOTIF arguments in witness v0 scripts must be empty or `0x01`.
        const MINIMALIF = 1 << 13;

        /// A failed signature check requires an empty signature.
        const NULLFAIL = 1 << 14;

        /// Witness v0 scripts only accept compressed public keys.
        const WITNESS_PUBKEYTYPE = 1 << 15;

        /// OP_CODESEPARATOR and signature self-deletion fail legacy scripts.
        const CONST_SCRIPTCODE = 1 << 16;

        /// Enable taproot and tapscript (BIP341/BIP342).
        const TAPROOT = 1 << 17;

        /// Spending unknown taproot leaf versions fails.
        const DISCOURAGE_UPGRADABLE_TAPROOT_VERSION = 1 << 18;

        /// Tapscripts containing OP_SUCCESSx fail instead of succeeding.
        const DISCOURAGE_OP_SUCCESS = 1 << 19;

        /// Tapscript signature checks against unknown pubkey types fail.
        const DISCOURAGE_UPGRADABLE_PUBKEYTYPE = 1 << 20;
    }
}

impl VerificationFlags {
    /// No rules beyond the base script semantics.
    pub const NONE: Self = Self::empty();

    /// The soft-fork rules enforced by consensus on mainnet today.
    pub const ALL: Self = Self::P2SH
        .union(Self::DERSIG)
        .union(Self::NULLDUMMY)
        .union(Self::CHECKLOCKTIMEVERIFY)
        .union(Self::CHECKSEQUENCEVERIFY)
        .union(Self::WITNESS)
        .union(Self::TAPROOT);

    /// `ALL` plus Bitcoin Core's relay policy rules.
    ///
    /// Scripts failing only these rules are still valid in blocks.
    pub const STANDARD: Self = Self::ALL
        .union(Self::STRICTENC)
        .union(Self::LOW_S)
        .union(Self::MINIMALDATA)
        .union(Self::DISCOURAGE_UPGRADABLE_NOPS)
        .union(Self::CLEANSTACK)
        .union(Self::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM)
        .union(Self::MINIMALIF)
        .union(Self::NULLFAIL)
        .union(Self::WITNESS_PUBKEYTYPE)
        .union(Self::CONST_SCRIPTCODE)
        .union(Self::DISCOURAGE_UPGRADABLE_TAPROOT_VERSION)
        .union(Self::DISCOURAGE_OP_SUCCESS)
        .union(Self::DISCOURAGE_UPGRADABLE_PUBKEYTYPE);

    /// Rejects bit patterns the interpreter cannot honour.
    ///
    /// Unknown bits are invalid. Witness evaluation is layered on top of P2SH
    /// evaluation, and the clean-stack rule needs at least one of them to be
    /// meaningful.
    pub fn validate(self) -> Result<(), VerificationError> {
        if !Self::all().contains(self) {
            return Err(VerificationError::InvalidFlags);
        }

        let cleanstack_alone = self.contains(Self::CLEANSTACK)
            && !self.intersects(Self::P2SH | Self::WITNESS);
        let witness_without_p2sh = self.contains(Self::WITNESS) && !self.contains(Self::P2SH);
        if cleanstack_alone || witness_without_p2sh {
            return Err(VerificationError::InvalidFlagsCombination);
        }

        Ok(())
    }

    /// Consensus flags active on Bitcoin mainnet at `height`.
    pub fn for_height(height: u32) -> Self {
        let mut flags = Self::NONE;

        if height >= 173_805 {
            flags |= Self::P2SH;
        }
        if height >= 363_725 {
            flags |= Self::DERSIG;
        }
        if height >= 388_381 {
            flags |= Self::CHECKLOCKTIMEVERIFY;
        }
        if height >= 419_328 {
            flags |= Self::CHECKSEQUENCEVERIFY;
        }
        if height >= 481_824 {
            flags |= Self::NULLDUMMY | Self::WITNESS;
        }
        if height >= 709_632 {
            flags |= Self::TAPROOT;
        }

        flags
    }
}

impl Default for VerificationFlags {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for VerificationFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        if *self == Self::ALL {
            return f.write_str("ALL");
        }

        let mut separator = "";
        for (name, _) in self.iter_names() {
            write!(f, "{separator}{name}")?;
            separator = " | ";
        }

        let unknown = self.bits() & !Self::all().bits();
        if unknown != 0 {
            write!(f, "{separator}{unknown:#x}")?;
        }
        Ok(())
    }
}

impl FromStr for VerificationFlags {
    type Err = ParseFlagsError;

    /// Parses `NONE`, `ALL`, `STANDARD`, or flag names separated by `|` or `,`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = Self::NONE;
        for token in s.split(['|', ',']) {
            let name = token.trim();
            flags |= match name {
                "" | "NONE" => Self::NONE,
                "ALL" => Self::ALL,
                "STANDARD" => Self::STANDARD,
                _ => Self::from_name(name).ok_or_else(|| ParseFlagsError::new(name))?,
            };
        }
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_positions_match_core() {
        assert_eq!(VerificationFlags::P2SH.bits(), 1);
        assert_eq!(VerificationFlags::DERSIG.bits(), 4);
        assert_eq!(VerificationFlags::WITNESS.bits(), 1 << 11);
        assert_eq!(VerificationFlags::TAPROOT.bits(), 1 << 17);
        assert_eq!(VerificationFlags::all().bits(), (1 << 21) - 1);
        assert_eq!(VerificationFlags::ALL.bits(), 0x20e15);
    }

    #[test]
    fn complement_stays_within_defined_bits() {
        let without_taproot = VerificationFlags::ALL & !VerificationFlags::TAPROOT;
        assert!(!without_taproot.contains(VerificationFlags::TAPROOT));
        assert_eq!(without_taproot | VerificationFlags::TAPROOT, VerificationFlags::ALL);
        assert_eq!(
            (!VerificationFlags::TAPROOT).bits(),
            VerificationFlags::all().bits() & !VerificationFlags::TAPROOT.bits()
        );
    }

    #[test]
    fn all_is_the_consensus_set() {
        let policy = VerificationFlags::STANDARD - VerificationFlags::ALL;
        assert!(!policy.intersects(VerificationFlags::ALL));
        assert!(policy.contains(VerificationFlags::LOW_S | VerificationFlags::NULLFAIL));
        assert!(!VerificationFlags::STANDARD.contains(VerificationFlags::SIGPUSHONLY));
    }

    #[test]
    fn display_renders_names() {
        assert_eq!(VerificationFlags::NONE.to_string(), "NONE");
        assert_eq!(VerificationFlags::ALL.to_string(), "ALL");
        assert_eq!(
            (VerificationFlags::P2SH | VerificationFlags::WITNESS).to_string(),
            "P2SH | WITNESS"
        );
        assert_eq!(
            VerificationFlags::from_bits_retain(1 << 30).to_string(),
            "0x40000000"
        );
    }

    #[test]
    fn parses_core_test_vector_notation() {
        let flags: VerificationFlags = "P2SH,STRICTENC".parse().expect("known names");
        assert_eq!(flags, VerificationFlags::P2SH | VerificationFlags::STRICTENC);

        let flags: VerificationFlags = "DERSIG | LOW_S".parse().expect("known names");
        assert_eq!(flags, VerificationFlags::DERSIG | VerificationFlags::LOW_S);

        assert_eq!("".parse::<VerificationFlags>(), Ok(VerificationFlags::NONE));
        assert_eq!("ALL".parse::<VerificationFlags>(), Ok(VerificationFlags::ALL));
        assert_eq!(
            "STANDARD".parse::<VerificationFlags>(),
            Ok(VerificationFlags::STANDARD)
        );

        let err = "P2SH,BOGUS".parse::<VerificationFlags>().expect_err("unknown name");
        assert_eq!(err.name(), "BOGUS");
    }

    #[test]
    fn display_parses_back() {
        let flags = VerificationFlags::ALL | VerificationFlags::NULLFAIL;
        assert_eq!(flags.to_string().parse::<VerificationFlags>(), Ok(flags));
    }

    #[test]
    fn validate_rejects_unknown_bits_and_bad_combinations() {
        assert_eq!(
            VerificationFlags::from_bits_retain(1 << 25).validate(),
            Err(VerificationError::InvalidFlags)
        );
        assert_eq!(
            VerificationFlags::WITNESS.validate(),
            Err(VerificationError::InvalidFlagsCombination)
        );
        assert_eq!(
            VerificationFlags::CLEANSTACK.validate(),
            Err(VerificationError::InvalidFlagsCombination)
        );
        assert_eq!(
            (VerificationFlags::CLEANSTACK | VerificationFlags::P2SH).validate(),
            Ok(())
        );
        assert_eq!(VerificationFlags::ALL.validate(), Ok(()));
        assert_eq!(VerificationFlags::STANDARD.validate(), Ok(()));
        assert_eq!(VerificationFlags::all().validate(), Ok(()));
        assert_eq!(VerificationFlags::NONE.validate(), Ok(()));
    }

    #[test]
    fn activation_schedule() {
        assert_eq!(VerificationFlags::for_height(0), VerificationFlags::NONE);
        assert_eq!(VerificationFlags::for_height(173_805), VerificationFlags::P2SH);
        assert!(!VerificationFlags::for_height(709_631).contains(VerificationFlags::TAPROOT));
        assert_eq!(
            VerificationFlags::for_height(800_000),
            VerificationFlags::ALL
        );
    }
}
