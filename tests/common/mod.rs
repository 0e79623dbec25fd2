//! Transaction builders and signers shared by the integration tests.

#![allow(dead_code)]

use bitcoin::{
    absolute::LockTime,
    hashes::Hash,
    key::{TapTweak, UntweakedPublicKey},
    secp256k1::{self, Keypair, Message, Secp256k1, SecretKey},
    sighash::{Annex, EcdsaSighashType, Prevouts, SighashCache, TapSighashType},
    taproot::{LeafVersion, TapLeafHash, TapNodeHash, TaprootBuilder, TaprootSpendInfo},
    transaction::Version,
    Amount, CompressedPublicKey, OutPoint, PublicKey, ScriptBuf, Sequence, Transaction, TxIn,
    TxOut, Txid, Witness, XOnlyPublicKey,
};
use script_verify::{
    verify_detailed, ScriptError, ScriptPubkey, TransactionOutput, VerificationFlags,
    VerifyFailure,
};

pub type Secp = Secp256k1<secp256k1::All>;

pub fn secp() -> Secp {
    Secp256k1::new()
}

/// Deterministic key pair for test `seed`.
pub fn key(secp: &Secp, seed: u8) -> (SecretKey, PublicKey) {
    let secret = SecretKey::from_slice(&[seed; 32]).expect("seed is a valid scalar");
    let public = PublicKey::new(secp256k1::PublicKey::from_secret_key(secp, &secret));
    (secret, public)
}

pub fn keypair(secp: &Secp, seed: u8) -> Keypair {
    Keypair::from_seckey_slice(secp, &[seed; 32]).expect("seed is a valid scalar")
}

/// One input spending `txid:0`, one output paying `value` to an empty script.
pub fn spending_tx(version: i32, lock_time: u32, sequence: u32) -> Transaction {
    Transaction {
        version: Version(version),
        lock_time: LockTime::from_consensus(lock_time),
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: Txid::from_byte_array([0x5a; 32]),
                vout: 0,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence(sequence),
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(1_000),
            script_pubkey: ScriptBuf::new(),
        }],
    }
}

pub fn simple_spend() -> Transaction {
    spending_tx(2, 0, Sequence::MAX.0)
}

/// Runs the public entry point with `bitcoin` types.
pub fn check(
    spent: &ScriptBuf,
    amount: u64,
    tx: &Transaction,
    prevouts: Option<&[TxOut]>,
    flags: VerificationFlags,
) -> Result<(), VerifyFailure> {
    let spent_outputs: Option<Vec<TransactionOutput>> =
        prevouts.map(|outs| outs.iter().map(TransactionOutput::from).collect());
    verify_detailed(
        &ScriptPubkey::new(spent.as_bytes()),
        amount,
        &script_verify::Transaction::from(tx.clone()),
        spent_outputs.as_deref(),
        0,
        flags,
    )
}

pub fn script_error(result: Result<(), VerifyFailure>) -> ScriptError {
    match result {
        Err(VerifyFailure::Script(err)) => err,
        other => panic!("expected a script failure, got {other:?}"),
    }
}

pub fn standard_flags() -> VerificationFlags {
    VerificationFlags::STANDARD & !VerificationFlags::TAPROOT
}

pub fn sign_legacy(
    secp: &Secp,
    tx: &Transaction,
    script_code: &ScriptBuf,
    secret: &SecretKey,
    hash_type: EcdsaSighashType,
) -> Vec<u8> {
    let sighash = SighashCache::new(tx)
        .legacy_signature_hash(0, script_code, hash_type.to_u32())
        .expect("input 0 exists");
    ecdsa_with_hash_type(secp, sighash.to_byte_array(), secret, hash_type)
}

pub fn sign_p2wsh(
    secp: &Secp,
    tx: &Transaction,
    witness_script: &ScriptBuf,
    amount: u64,
    secret: &SecretKey,
) -> Vec<u8> {
    let sighash = SighashCache::new(tx)
        .p2wsh_signature_hash(0, witness_script, Amount::from_sat(amount), EcdsaSighashType::All)
        .expect("input 0 exists");
    ecdsa_with_hash_type(secp, sighash.to_byte_array(), secret, EcdsaSighashType::All)
}

pub fn sign_p2wpkh(
    secp: &Secp,
    tx: &Transaction,
    program_script: &ScriptBuf,
    amount: u64,
    secret: &SecretKey,
) -> Vec<u8> {
    let sighash = SighashCache::new(tx)
        .p2wpkh_signature_hash(0, program_script, Amount::from_sat(amount), EcdsaSighashType::All)
        .expect("p2wpkh script code");
    ecdsa_with_hash_type(secp, sighash.to_byte_array(), secret, EcdsaSighashType::All)
}

fn ecdsa_with_hash_type(
    secp: &Secp,
    digest: [u8; 32],
    secret: &SecretKey,
    hash_type: EcdsaSighashType,
) -> Vec<u8> {
    let signature = secp.sign_ecdsa(&Message::from_digest(digest), secret);
    let mut bytes = signature.serialize_der().to_vec();
    bytes.push(hash_type.to_u32() as u8);
    bytes
}

pub fn p2wpkh_script(public: &PublicKey) -> ScriptBuf {
    let compressed = CompressedPublicKey::try_from(*public).expect("compressed key");
    ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash())
}

/// Taproot output committing to `leaves` (all at depth `log2(len)`).
pub fn taproot_tree(secp: &Secp, internal: UntweakedPublicKey, leaves: &[ScriptBuf]) -> TaprootSpendInfo {
    let depth = match leaves.len() {
        1 => 0,
        2 => 1,
        4 => 2,
        n => panic!("unsupported leaf count {n}"),
    };
    let mut builder = TaprootBuilder::new();
    for leaf in leaves {
        builder = builder
            .add_leaf(depth, leaf.clone())
            .expect("balanced tree");
    }
    builder
        .finalize(secp, internal)
        .expect("complete tree")
}

pub fn p2tr_script(info: &TaprootSpendInfo) -> ScriptBuf {
    ScriptBuf::new_p2tr_tweaked(info.output_key())
}

pub fn control_block(info: &TaprootSpendInfo, leaf: &ScriptBuf) -> Vec<u8> {
    info.control_block(&(leaf.clone(), LeafVersion::TapScript))
        .expect("leaf is in the tree")
        .serialize()
}

pub fn sign_taproot_key_path(
    secp: &Secp,
    tx: &Transaction,
    prevouts: &[TxOut],
    keypair: &Keypair,
    merkle_root: Option<TapNodeHash>,
    hash_type: TapSighashType,
    annex: Option<&[u8]>,
) -> Vec<u8> {
    let annex = annex.map(|bytes| Annex::new(bytes).expect("annex starts with 0x50"));
    let sighash = SighashCache::new(tx)
        .taproot_signature_hash(0, &Prevouts::All(prevouts), annex, None, hash_type)
        .expect("taproot sighash");
    let tweaked = keypair.tap_tweak(secp, merkle_root);
    let signature = secp.sign_schnorr_no_aux_rand(&Message::from(sighash), &tweaked.to_keypair());
    schnorr_with_hash_type(&signature.serialize(), hash_type)
}

pub fn sign_tapscript(
    secp: &Secp,
    tx: &Transaction,
    prevouts: &[TxOut],
    keypair: &Keypair,
    leaf: &ScriptBuf,
) -> Vec<u8> {
    let leaf_hash = TapLeafHash::from_script(leaf, LeafVersion::TapScript);
    let sighash = SighashCache::new(tx)
        .taproot_script_spend_signature_hash(
            0,
            &Prevouts::All(prevouts),
            leaf_hash,
            TapSighashType::Default,
        )
        .expect("tapscript sighash");
    secp.sign_schnorr_no_aux_rand(&Message::from(sighash), keypair)
        .serialize()
        .to_vec()
}

fn schnorr_with_hash_type(signature: &[u8], hash_type: TapSighashType) -> Vec<u8> {
    let mut bytes = signature.to_vec();
    if hash_type != TapSighashType::Default {
        bytes.push(hash_type as u8);
    }
    bytes
}

pub fn xonly(keypair: &Keypair) -> XOnlyPublicKey {
    keypair.x_only_public_key().0
}
