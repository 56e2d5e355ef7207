#![cfg(test)]

use rand::{rngs::StdRng, RngCore, SeedableRng};
use serde::Deserialize;

use crate::{
    backend::{generic, FieldElement},
    block_mul, update, Block, Key, KeyPowers, Polyval, BLOCK_SIZE,
};

/// x^128 mod P, the Montgomery representation of 1.
const MONT_ONE: Block = {
    let mut b = [0u8; BLOCK_SIZE];
    b[0] = 0x01;
    b[15] = 0xc2;
    b
};

fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s).expect("should be valid hex")
}

fn fe(s: &str) -> FieldElement {
    let b: Block = unhex(s)
        .as_slice()
        .try_into()
        .expect("should be `BLOCK_SIZE` bytes");
    FieldElement::from_le_bytes(&b)
}

fn rand_block(rng: &mut StdRng) -> Block {
    let mut b = [0u8; BLOCK_SIZE];
    rng.fill_bytes(&mut b);
    b
}

fn rand_blocks(rng: &mut StdRng, n: usize) -> Vec<Block> {
    (0..n).map(|_| rand_block(rng)).collect()
}

fn rand_key_bytes(rng: &mut StdRng) -> Block {
    loop {
        let b = rand_block(rng);
        if b != [0u8; BLOCK_SIZE] {
            return b;
        }
    }
}

fn xor_into(acc: &mut Block, m: &Block) {
    for (a, b) in acc.iter_mut().zip(m) {
        *a ^= b;
    }
}

/// Evaluates POLYVAL one multiply at a time: for each block,
/// `acc = (acc ^ m) * h`.
fn horner(mut acc: Block, h: &Block, blocks: &[Block]) -> Block {
    for m in blocks {
        xor_into(&mut acc, m);
        block_mul(&mut acc, h);
    }
    acc
}

#[test]
fn test_field_element_ops() {
    let a = fe("66e94bd4ef8a2c3b884cfa59ca342b2e");
    let b = fe("ff000000000000000000000000000000");

    let want = fe("99e94bd4ef8a2c3b884cfa59ca342b2e");
    assert_eq!(a ^ b, want);
    assert_eq!(b ^ a, want);

    let want = fe("ebe563401e7e91ea3ad6426b8140c394");
    assert_eq!(a * b, want);
    assert_eq!(b * a, want);
}

#[test]
fn test_rfc_vectors() {
    struct TestCase {
        h: &'static str,
        x: Vec<&'static str>,
        r: &'static str,
    }
    let cases = [
        TestCase {
            h: "25629347589242761d31f826ba4b757b",
            x: vec!["4f4f95668c83dfb6401762bb2d01a262"],
            r: "cedac64537ff50989c16011551086d77",
        },
        TestCase {
            h: "25629347589242761d31f826ba4b757b",
            x: vec![
                "4f4f95668c83dfb6401762bb2d01a262",
                "d1a24ddd2721d006bbe45f20d3c9f362",
            ],
            r: "f7a3b47b846119fae5b7866cf5e5b77e",
        },
    ];

    for (i, tc) in cases.iter().enumerate() {
        let h: Block = unhex(tc.h).as_slice().try_into().expect("16 bytes");
        let blocks: Vec<Block> = tc
            .x
            .iter()
            .map(|s| unhex(s).as_slice().try_into().expect("16 bytes"))
            .collect();
        let want = unhex(tc.r);

        let key = Key::new(&h).expect("should not be all zero");
        let mut p = Polyval::new(&key);
        p.update(&blocks);
        let got: [u8; 16] = p.tag().into();
        assert_eq!(got, &want[..], "#{i} (wrapper)");

        let keys = KeyPowers::new(&key);
        let mut acc = [0u8; BLOCK_SIZE];
        update(&mut acc, &keys, &blocks);
        assert_eq!(acc, &want[..], "#{i} (update)");

        // P6: one call per block must match the batched call.
        let mut acc = [0u8; BLOCK_SIZE];
        for block in &blocks {
            update(&mut acc, &keys, core::slice::from_ref(block));
        }
        assert_eq!(acc, &want[..], "#{i} (split)");
    }
}

#[test]
fn test_vectors() {
    #[derive(Deserialize)]
    struct Input {
        #[serde(with = "hex::serde")]
        key_hex: Vec<u8>,
        #[serde(with = "hex::serde")]
        message_hex: Vec<u8>,
    }

    #[derive(Deserialize)]
    struct TestVector {
        description: String,
        input: Input,
        #[serde(with = "hex::serde")]
        hash_hex: Vec<u8>,
    }

    const DATA: &str = include_str!("testdata/polyval.json");
    let tests: Vec<TestVector> = serde_json::from_str(DATA).expect("should be valid JSON");
    for (i, tc) in tests.iter().enumerate() {
        let b: Block = (&*tc.input.key_hex).try_into().unwrap_or_else(|_| {
            panic!(
                "#{i}: {} should be `KEY_SIZE` all non-zero bytes",
                tc.description
            )
        });
        let key = Key::new_unchecked(&b);
        let mut p = Polyval::new(&key);
        p.update_padded(&tc.input.message_hex);
        let got: [u8; 16] = p.tag().into();
        let want = &tc.hash_hex[..];
        assert_eq!(got, want, "#{i}: {}", tc.description);
    }
}

#[test]
fn test_block_mul_commutative() {
    let mut rng = StdRng::from_entropy();
    for _ in 0..1000 {
        let a = rand_block(&mut rng);
        let b = rand_block(&mut rng);

        let mut ab = a;
        block_mul(&mut ab, &b);
        let mut ba = b;
        block_mul(&mut ba, &a);
        assert_eq!(ab, ba, "{}*{}", hex::encode(a), hex::encode(b));
    }
}

#[test]
fn test_block_mul_associative() {
    let mut rng = StdRng::from_entropy();
    for _ in 0..1000 {
        let a = rand_block(&mut rng);
        let b = rand_block(&mut rng);
        let c = rand_block(&mut rng);

        // (a*b)*c
        let mut abc = a;
        block_mul(&mut abc, &b);
        block_mul(&mut abc, &c);

        // a*(b*c)
        let mut bc = b;
        block_mul(&mut bc, &c);
        let mut want = a;
        block_mul(&mut want, &bc);

        assert_eq!(abc, want);
    }
}

#[test]
fn test_block_mul_identity() {
    let mut rng = StdRng::from_entropy();
    for _ in 0..1000 {
        let a = rand_block(&mut rng);
        let mut got = a;
        block_mul(&mut got, &MONT_ONE);
        assert_eq!(got, a, "{}", hex::encode(a));
    }
}

#[test]
fn test_block_mul_distributive() {
    let mut rng = StdRng::from_entropy();
    for _ in 0..1000 {
        let a = rand_block(&mut rng);
        let b = rand_block(&mut rng);
        let c = rand_block(&mut rng);

        // a*(b^c)
        let mut bc = b;
        xor_into(&mut bc, &c);
        let mut lhs = a;
        block_mul(&mut lhs, &bc);

        // (a*b)^(a*c)
        let mut ab = a;
        block_mul(&mut ab, &b);
        let mut ac = a;
        block_mul(&mut ac, &c);
        let mut rhs = ab;
        xor_into(&mut rhs, &ac);

        assert_eq!(lhs, rhs);
    }
}

#[test]
fn test_key_powers() {
    let mut rng = StdRng::from_entropy();
    for _ in 0..100 {
        let kb = rand_key_bytes(&mut rng);
        let keys = KeyPowers::new(&Key::new_unchecked(&kb));

        // The table runs H^8 down to H^1.
        assert_eq!(keys.pow[7], FieldElement::from_le_bytes(&kb));
        for i in 1..8 {
            let want = keys.pow[i] * keys.pow[7];
            assert_eq!(keys.pow[i - 1], want, "power {}", 8 - i + 1);
        }
    }
}

#[test]
fn test_single_block() {
    let mut rng = StdRng::from_entropy();
    for _ in 0..100 {
        let kb = rand_key_bytes(&mut rng);
        let keys = KeyPowers::new(&Key::new_unchecked(&kb));
        let m = rand_block(&mut rng);

        let mut acc = [0u8; BLOCK_SIZE];
        update(&mut acc, &keys, &[m]);

        let mut want = m;
        block_mul(&mut want, &kb);
        assert_eq!(acc, want);
    }
}

#[test]
fn test_update_empty() {
    let mut rng = StdRng::from_entropy();
    let kb = rand_key_bytes(&mut rng);
    let keys = KeyPowers::new(&Key::new_unchecked(&kb));

    let before = rand_block(&mut rng);
    let mut acc = before;
    update(&mut acc, &keys, &[]);
    assert_eq!(acc, before);
}

/// Every block count in the list, including every ragged length,
/// must agree with the one-multiply-at-a-time evaluation.
#[test]
fn test_against_horner() {
    const LENGTHS: &[usize] = &[
        0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 24, 31, 56, 64, 71, 128,
    ];

    let mut rng = StdRng::from_entropy();
    for _ in 0..10 {
        let kb = rand_key_bytes(&mut rng);
        let keys = KeyPowers::new(&Key::new_unchecked(&kb));

        for &n in LENGTHS {
            let blocks = rand_blocks(&mut rng, n);

            for acc_in in [[0u8; BLOCK_SIZE], rand_block(&mut rng)] {
                let mut acc = acc_in;
                update(&mut acc, &keys, &blocks);
                let want = horner(acc_in, &kb, &blocks);
                assert_eq!(acc, want, "n={n} key={}", hex::encode(kb));
            }
        }
    }
}

/// Splitting one message across two calls at any block boundary
/// must not change the result.
#[test]
fn test_split_updates() {
    let mut rng = StdRng::from_entropy();
    for _ in 0..4 {
        let kb = rand_key_bytes(&mut rng);
        let keys = KeyPowers::new(&Key::new_unchecked(&kb));

        let n = 24;
        let blocks = rand_blocks(&mut rng, n);
        let acc_in = rand_block(&mut rng);

        let mut want = acc_in;
        update(&mut want, &keys, &blocks);

        for split in 0..=n {
            let (head, tail) = blocks.split_at(split);
            let mut acc = acc_in;
            update(&mut acc, &keys, head);
            update(&mut acc, &keys, tail);
            assert_eq!(acc, want, "split={split}");
        }
    }
}

/// The dispatched backend must agree with the portable one.
#[test]
fn test_generic_equivalence() {
    const LENGTHS: &[usize] = &[1, 7, 8, 9, 15, 16, 17, 56, 64, 71, 128];

    fn generic_powers(h: generic::FieldElement) -> [generic::FieldElement; 8] {
        let mut pow = [h; 8];
        let mut prev = h;
        for v in pow.iter_mut().rev().skip(1) {
            *v = prev * h;
            prev = *v;
        }
        pow
    }

    let mut rng = StdRng::from_entropy();
    for _ in 0..10 {
        let kb = rand_key_bytes(&mut rng);
        let keys = KeyPowers::new(&Key::new_unchecked(&kb));
        let pow = generic_powers(generic::FieldElement::from_le_bytes(&kb));

        for &n in LENGTHS {
            let blocks = rand_blocks(&mut rng, n);
            let acc_in = rand_block(&mut rng);

            let got = FieldElement::from_le_bytes(&acc_in)
                .fold_blocks(&keys.pow, &blocks)
                .to_le_bytes();
            let want = generic::FieldElement::from_le_bytes(&acc_in)
                .fold_blocks(&pow, &blocks)
                .to_le_bytes();
            assert_eq!(got, want, "n={n} key={}", hex::encode(kb));
        }
    }
}

#[test]
fn test_update_bytes() {
    let mut rng = StdRng::from_entropy();
    let kb = rand_key_bytes(&mut rng);
    let key = Key::new_unchecked(&kb);

    let mut data = vec![0u8; 64];
    rng.fill_bytes(&mut data);

    let mut p = Polyval::new(&key);
    p.update_bytes(&data).expect("whole blocks");
    let mut q = Polyval::new(&key);
    q.update_padded(&data);
    let got: [u8; 16] = p.tag().into();
    let want: [u8; 16] = q.tag().into();
    assert_eq!(got, want);

    let mut p = Polyval::new(&key);
    assert!(p.update_bytes(&data[..15]).is_err());
}

#[test]
fn test_verify() {
    let mut rng = StdRng::from_entropy();
    let kb = rand_key_bytes(&mut rng);
    let key = Key::new_unchecked(&kb);
    let blocks = rand_blocks(&mut rng, 3);

    let mut p = Polyval::new(&key);
    p.update(&blocks);
    let tag = p.clone().tag();
    assert!(bool::from(p.verify(&tag)));
}

#[test]
fn test_zero_key_rejected() {
    assert!(Key::new(&[0u8; BLOCK_SIZE]).is_none());
    let mut rng = StdRng::from_entropy();
    assert!(Key::new(&rand_key_bytes(&mut rng)).is_some());
}
