use bitcoin::{
    absolute::LockTime,
    blockdata::script::Builder,
    hex::FromHex,
    key::{Secp256k1, UntweakedPublicKey},
    opcodes::all,
    taproot::{LeafVersion, TaprootBuilder},
    transaction::Version,
    Amount, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Witness,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use script_verify::{
    verify, ScriptPubkey, Transaction, TransactionOutput, VerificationFlags,
};

struct BenchCase {
    name: &'static str,
    script_pubkey: ScriptPubkey,
    amount: u64,
    tx: Transaction,
    spent_outputs: Option<Vec<TransactionOutput>>,
    flags: VerificationFlags,
}

fn pre_taproot() -> VerificationFlags {
    VerificationFlags::ALL & !VerificationFlags::TAPROOT
}

pub fn verification_bench(c: &mut Criterion) {
    let cases = vec![
        mainnet_case(
            "legacy_p2pkh",
            "76a9144bfbaf6afb76cc5771bc6404810d1cc041a6933988ac",
            0,
            "02000000013f7cebd65c27431a90bba7f796914fe8cc2ddfc3f2cbd6f7e5f2fc854534da95000000006b483045022100de1ac3bcdfb0332207c4a91f3832bd2c2915840165f876ab47c5f8996b971c3602201c6c053d750fadde599e6f5c4e1963df0f01fc0d97815e8157e3d59fe09ca30d012103699b464d1d8bc9e47d4fb1cdaa89a1c5783d68363c4dbc4b524ed3d857148617feffffff02836d3c01000000001976a914fc25d6d5c94003bf5b0c7b640a248e2c637fcfb088ac7ada8202000000001976a914fbed3d9b11183209a57999d54d59f67c019e756c88ac6acb0700",
        ),
        mainnet_case(
            "p2sh_p2wpkh",
            "a91434c06f8c87e355e123bdc6dda4ffabc64b6989ef87",
            1_900_000,
            "01000000000101d9fd94d0ff0026d307c994d0003180a5f248146efb6371d040c5973f5f66d9df0400000017160014b31b31a6cb654cfab3c50567bcf124f48a0beaecffffffff012cbd1c000000000017a914233b74bf0823fa58bbbd26dfc3bb4ae715547167870247304402206f60569cac136c114a58aedd80f6fa1c51b49093e7af883e605c212bdafcd8d202200e91a55f408a021ad2631bc29a67bd6915b2d7e9ef0265627eabd7f7234455f6012103e7e802f50344303c76d12c089c8724c1b230e3b745693bbe16aad536293d15e300000000",
        ),
        mainnet_case(
            "p2wsh_multisig",
            "0020701a8d401c84fb13e6baf169d59684e17abd9fa216c8cc5b9fc63d622ff8c58d",
            18_393_430,
            "010000000001011f97548fbbe7a0db7588a66e18d803d0089315aa7d4cc28360b6ec50ef36718a0100000000ffffffff02df1776000000000017a9146c002a686959067f4866b8fb493ad7970290ab728757d29f0000000000220020701a8d401c84fb13e6baf169d59684e17abd9fa216c8cc5b9fc63d622ff8c58d04004730440220565d170eed95ff95027a69b313758450ba84a01224e1f7f130dda46e94d13f8602207bdd20e307f062594022f12ed5017bbf4a055a06aea91c10110a0e3bb23117fc014730440220647d2dc5b15f60bc37dc42618a370b2a1490293f9e5c8464f53ec4fe1dfe067302203598773895b4b16d37485cbe21b337f4e4b650739880098c592553add7dd4355016952210375e00eb72e29da82b89367947f29ef34afb75e8654f6ea368e0acdfd92976b7c2103a1b26313f430c4b15bb1fdce663207659d8cac749a0e53d70eff01874496feff2103c96d495bfdd5ba4145e3e046fee45e84a8a48ad05bd8dbb395c011a32cf9f88053ae00000000",
        ),
        taproot_script_case(),
    ];

    let mut group = c.benchmark_group("verify");
    for case in &cases {
        group.bench_with_input(BenchmarkId::from_parameter(case.name), case, |b, case| {
            b.iter(|| run_case(black_box(case)));
        });
    }
    group.finish();

    let mut group = c.benchmark_group("decode");
    for case in &cases {
        let raw = case.tx.as_bytes().to_vec();
        group.bench_with_input(BenchmarkId::from_parameter(case.name), &raw, |b, raw| {
            b.iter(|| Transaction::from_bytes(black_box(raw)).expect("bench transaction decodes"));
        });
    }
    group.finish();
}

fn run_case(case: &BenchCase) {
    let authorized = verify(
        &case.script_pubkey,
        case.amount,
        &case.tx,
        case.spent_outputs.as_deref(),
        0,
        case.flags,
    )
    .expect("bench call is well formed");
    assert!(authorized, "{} must verify", case.name);
}

fn mainnet_case(name: &'static str, spent: &str, amount: u64, tx: &str) -> BenchCase {
    let raw = Vec::from_hex(tx).expect("bench tx hex");
    BenchCase {
        name,
        script_pubkey: ScriptPubkey::new(Vec::from_hex(spent).expect("bench script hex")),
        amount,
        tx: Transaction::from_bytes(&raw).expect("bench transaction decodes"),
        spent_outputs: None,
        flags: pre_taproot(),
    }
}

fn taproot_script_case() -> BenchCase {
    let leaf = Builder::new()
        .push_int(1)
        .push_int(1)
        .push_opcode(all::OP_ADD)
        .push_int(2)
        .push_opcode(all::OP_EQUAL)
        .into_script();

    // Generator point x coordinate.
    let internal_key = UntweakedPublicKey::from_slice(
        &Vec::from_hex("79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")
            .expect("generator x"),
    )
    .expect("valid x-only key");
    let secp = Secp256k1::verification_only();
    let info = TaprootBuilder::new()
        .add_leaf(0, leaf.clone())
        .expect("single leaf")
        .finalize(&secp, internal_key)
        .expect("complete tree");
    let control = info
        .control_block(&(leaf.clone(), LeafVersion::TapScript))
        .expect("leaf is committed");
    let script_pubkey = ScriptBuf::new_p2tr_tweaked(info.output_key());

    let tx = bitcoin::Transaction {
        version: Version(2),
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::default(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::from_slice(&[leaf.to_bytes(), control.serialize()]),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(0),
            script_pubkey: ScriptBuf::new(),
        }],
    };

    let spent = ScriptPubkey::new(script_pubkey.to_bytes());
    BenchCase {
        name: "taproot_script",
        script_pubkey: spent.clone(),
        amount: 75_000,
        tx: Transaction::from(tx),
        spent_outputs: Some(vec![TransactionOutput::new(75_000, spent)]),
        flags: VerificationFlags::ALL,
    }
}

criterion_group!(benches, verification_bench);
criterion_main!(benches);
