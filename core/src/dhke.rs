//! Blind Diffie-Hellman Key Exchange (BDHKE) and the accompanying
//! discrete-log-equality (DLEQ) proof, as used by a Chaumian ecash mint.
//!
//! Bob (Mint):
//!```python
//! A = a*G
//! return A
//! ```
//!
//! Alice (Client):
//!```python
//! Y = hash_to_curve(secret_message)
//! r = random blinding factor
//! B_ = Y + r*G
//! return B_
//! ```
//!
//! Bob:
//!```python
//! C_ = a*B_
//! (= a*Y + a*r*G)
//! return C_
//!```
//!
//! Alice:
//!```python
//! C = C_ - r*A
//! (= C_ - a*r*G)
//! (= a*Y)
//! return C, secret_message
//!```
//!
//! Bob additionally proves `log_G(A) == log_B_(C_)` without revealing `a`
//! (DLEQ), so a dishonest mint cannot use amount-tagged keys to
//! deanonymize a wallet across mint/melt.

use bitcoin_hashes::{sha256, Hash};
use secp256k1::{All, PublicKey, Scalar, Secp256k1, SecretKey};

use crate::error::CoreError;

/// Domain separator for `hash_to_curve`, per NUT-00.
const DOMAIN_SEPARATOR: &[u8; 28] = b"Secp256k1_HashToCurve_Cashu_";

#[derive(Clone, Debug)]
pub struct Dhke {
    secp: Secp256k1<All>,
}

impl Default for Dhke {
    fn default() -> Self {
        Self::new()
    }
}

impl Dhke {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Deterministically maps an arbitrary message onto a curve point. The
    /// domain-separated hash is computed once; each retry rehashes
    /// `msg_hash || counter` until the hash happens to be a valid x-only
    /// public key, which is then lifted with even parity (prefix `0x02`).
    pub fn hash_to_curve(message: &[u8]) -> Result<PublicKey, CoreError> {
        let msg_to_hash = [&DOMAIN_SEPARATOR[..], message].concat();
        let msg_hash = sha256::Hash::hash(&msg_to_hash).to_byte_array();

        let mut counter: u32 = 0;
        loop {
            let mut bytes_to_hash = Vec::with_capacity(36);
            bytes_to_hash.extend_from_slice(&msg_hash);
            bytes_to_hash.extend_from_slice(&counter.to_le_bytes());
            let hash = sha256::Hash::hash(&bytes_to_hash).to_byte_array();

            let mut candidate = [0u8; 33];
            candidate[0] = 0x02;
            candidate[1..].copy_from_slice(&hash);
            if let Ok(point) = PublicKey::from_slice(&candidate) {
                return Ok(point);
            }
            counter = counter
                .checked_add(1)
                .expect("hash_to_curve: no valid point found in u32 counter range");
        }
    }

    /// `Y = hash_to_curve(secret); B_ = Y + r*G`. Returns `(B_, r)`.
    pub fn step1_alice(
        &self,
        secret_msg: impl AsRef<[u8]>,
        blinding_factor: Option<SecretKey>,
    ) -> Result<(PublicKey, SecretKey), CoreError> {
        let y = Self::hash_to_curve(secret_msg.as_ref())?;
        let r = blinding_factor.unwrap_or_else(|| SecretKey::new(&mut rand::thread_rng()));
        let b_ = y.combine(&PublicKey::from_secret_key(&self.secp, &r))?;
        Ok((b_, r))
    }

    /// `C_ = a*B_`.
    pub fn step2_bob(&self, b_: PublicKey, a: &SecretKey) -> Result<PublicKey, CoreError> {
        Ok(b_.mul_tweak(&self.secp, &Scalar::from(*a))?)
    }

    /// `C = C_ - r*K`, the unblinded mint signature.
    pub fn step3_alice(
        &self,
        c_: PublicKey,
        r: SecretKey,
        mint_pubkey: PublicKey,
    ) -> Result<PublicKey, CoreError> {
        let r_k = mint_pubkey
            .mul_tweak(&self.secp, &Scalar::from(r))?
            .negate(&self.secp);
        Ok(c_.combine(&r_k)?)
    }

    /// Mint-side verification: does `C == a*hash_to_curve(secret)`?
    pub fn verify(
        &self,
        a: SecretKey,
        c: PublicKey,
        secret_msg: impl AsRef<[u8]>,
    ) -> Result<bool, CoreError> {
        let y = Self::hash_to_curve(secret_msg.as_ref())?;
        Ok(c == y.mul_tweak(&self.secp, &Scalar::from(a))?)
    }

    /// Produces the non-interactive DLEQ proof `(e, s)` that the signer who
    /// holds `a` (with `K = a*G`) also produced `C_ = a*B_`, without
    /// revealing `a`.
    ///
    /// `p` is the prover's per-signature nonce. Cryptographically random in
    /// production; an external value may be injected for reproducible
    /// tests (see the dual-mode note in DESIGN.md).
    pub fn step2_bob_dleq(
        &self,
        b_: PublicKey,
        a: &SecretKey,
        p: Option<SecretKey>,
    ) -> Result<(SecretKey, SecretKey), CoreError> {
        let p = p.unwrap_or_else(|| SecretKey::new(&mut rand::thread_rng()));

        let r1 = PublicKey::from_secret_key(&self.secp, &p);
        let r2 = b_.mul_tweak(&self.secp, &Scalar::from(p))?;
        let k = PublicKey::from_secret_key(&self.secp, a);
        let c_ = b_.mul_tweak(&self.secp, &Scalar::from(*a))?;

        let e = hash_e([r1, r2, k, c_]);
        let e_key = SecretKey::from_slice(&e)?;

        // s = p + e*a mod n
        let s = e_key.mul_tweak(&Scalar::from(*a))?.add_tweak(&Scalar::from(p))?;
        Ok((e_key, s))
    }

    /// Mint-side (wallet-side, per NUT-12 terminology) verification of a
    /// DLEQ proof attached to a promise: recomputes `R1 = s*G - e*K`,
    /// `R2 = s*B_ - e*C_` and checks `hash_e(R1, R2, K, C_) == e`.
    pub fn alice_verify_dleq(
        &self,
        e: SecretKey,
        s: SecretKey,
        k: PublicKey,
        b_: PublicKey,
        c_: PublicKey,
    ) -> Result<bool, CoreError> {
        let s_g = PublicKey::from_secret_key(&self.secp, &s);
        let e_k = k.mul_tweak(&self.secp, &Scalar::from(e))?.negate(&self.secp);
        let r1 = s_g.combine(&e_k)?;

        let s_b_ = b_.mul_tweak(&self.secp, &Scalar::from(s))?;
        let e_c_ = c_.mul_tweak(&self.secp, &Scalar::from(e))?.negate(&self.secp);
        let r2 = s_b_.combine(&e_c_)?;

        let computed_e = hash_e([r1, r2, k, c_]);
        Ok(computed_e == e.secret_bytes())
    }
}

/// Serializes each point as ASCII-hex of its **uncompressed** (65-byte)
/// encoding, concatenates the hex strings and SHA-256s the result. This is
/// normative — the NUT-12 test vectors only reproduce under uncompressed
/// encoding, see DESIGN.md.
pub fn hash_e(points: [PublicKey; 4]) -> [u8; 32] {
    let mut preimage = String::new();
    for point in points {
        preimage.push_str(&hex::encode(point.serialize_uncompressed()));
    }
    sha256::Hash::hash(preimage.as_bytes()).to_byte_array()
}

pub fn public_key_from_hex(hex: &str) -> secp256k1::PublicKey {
    use hex::FromHex;
    let input_vec: Vec<u8> = Vec::from_hex(hex).expect("Invalid Hex String");
    secp256k1::PublicKey::from_slice(&input_vec).expect("Invalid Public Key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn hex_to_bytes(hex: &str) -> Vec<u8> {
        use hex::FromHex;
        Vec::from_hex(hex).expect("Invalid Hex String")
    }

    fn sk_from_hex(hex: &str) -> SecretKey {
        SecretKey::from_str(hex).expect("Invalid SecretKey")
    }

    const ZERO: &str = "0000000000000000000000000000000000000000000000000000000000000000";
    const ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    const TWO: &str = "0000000000000000000000000000000000000000000000000000000000000002";

    #[test]
    fn test_hash_to_curve_zero() -> anyhow::Result<()> {
        let pk = Dhke::hash_to_curve(&hex_to_bytes(ZERO))?;
        assert_eq!(
            pk.to_string(),
            "0266687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
        );
        Ok(())
    }

    #[test]
    fn test_hash_to_curve_one() -> anyhow::Result<()> {
        let pk = Dhke::hash_to_curve(&hex_to_bytes(ONE))?;
        assert_eq!(
            pk.to_string(),
            "02ec4916dd28fc4c10d78e287ca5d9cc51ee1ae73cbfde08c6b37324cbfaac8bc5"
        );
        Ok(())
    }

    #[test]
    fn test_hash_to_curve_iterates() -> anyhow::Result<()> {
        let pk = Dhke::hash_to_curve(&hex_to_bytes(TWO))?;
        assert_eq!(
            pk.to_string(),
            "02076c988b353fcbb748178ecb286bc9d0b4acf474d4ba31ba62334e46c97c416a"
        );
        Ok(())
    }

    #[test]
    fn test_step1_alice() -> anyhow::Result<()> {
        let dhke = Dhke::new();
        let (b_, r) = dhke.step1_alice("test_message", Some(sk_from_hex(ONE)))?;
        assert_eq!(
            b_.to_string(),
            "02a9acc1e48c25eeeb9289b5031cc57da9fe72f3fe2861d264bdc074209b107ba2"
        );
        assert_eq!(hex::encode(r.secret_bytes()), ONE);
        Ok(())
    }

    #[test]
    fn test_step2_bob() -> anyhow::Result<()> {
        let dhke = Dhke::new();
        let (b_, _) = dhke.step1_alice("test_message", Some(sk_from_hex(ONE)))?;
        let c_ = dhke.step2_bob(b_, &sk_from_hex(ONE))?;
        assert_eq!(
            c_.to_string(),
            "02a9acc1e48c25eeeb9289b5031cc57da9fe72f3fe2861d264bdc074209b107ba2"
        );
        Ok(())
    }

    #[test]
    fn test_step3_alice() -> anyhow::Result<()> {
        let dhke = Dhke::new();
        let c_ = public_key_from_hex(
            "02a9acc1e48c25eeeb9289b5031cc57da9fe72f3fe2861d264bdc074209b107ba2",
        );
        let r = sk_from_hex(ONE);
        let k = public_key_from_hex(
            "020000000000000000000000000000000000000000000000000000000000000001",
        );
        let c = dhke.step3_alice(c_, r, k)?;
        assert_eq!(
            c.to_string(),
            "03c724d7e6a5443b39ac8acf11f40420adc4f99a02e7cc1b57703d9391f6d129cd"
        );
        Ok(())
    }

    #[test]
    #[allow(non_snake_case)]
    fn test_verify_roundtrip() -> anyhow::Result<()> {
        let dhke = Dhke::new();
        let a = sk_from_hex(ONE);
        let A = a.public_key(&dhke.secp);

        let secret_msg = "test";
        let (b_, r) = dhke.step1_alice(secret_msg, Some(sk_from_hex(TWO)))?;
        let c_ = dhke.step2_bob(b_, &a)?;
        let c = dhke.step3_alice(c_, r, A)?;

        assert!(dhke.verify(a, c, secret_msg)?);
        assert!(!dhke.verify(a, c.combine(&c)?, secret_msg)?);
        assert!(!dhke.verify(a, A, secret_msg)?);
        Ok(())
    }

    #[test]
    #[allow(non_snake_case)]
    fn test_hash_e() {
        let K = public_key_from_hex(
            "020000000000000000000000000000000000000000000000000000000000000001",
        );
        let c_ = public_key_from_hex(
            "02a9acc1e48c25eeeb9289b5031cc57da9fe72f3fe2861d264bdc074209b107ba2",
        );
        let e = hash_e([K, K, K, c_]);
        assert_eq!(
            hex::encode(e),
            "a4dc034b74338c28c6bc3ea49731f2a24440fc7c4affc08b31a93fc9fbe6401e"
        );
    }

    #[test]
    fn test_step2_bob_dleq() -> anyhow::Result<()> {
        let dhke = Dhke::new();
        let (b_, _) = dhke.step1_alice("test_message", Some(sk_from_hex(ONE)))?;

        let (e, s) = dhke.step2_bob_dleq(b_, &sk_from_hex(ONE), Some(sk_from_hex(ONE)))?;
        assert_eq!(
            hex::encode(e.secret_bytes()),
            "9818e061ee51d5c8edc3342369a554998ff7b4381c8652d724cdf46429be73d9"
        );
        assert_eq!(
            hex::encode(s.secret_bytes()),
            "9818e061ee51d5c8edc3342369a554998ff7b4381c8652d724cdf46429be73da"
        );

        let a_big = sk_from_hex("0000000000000000000000000000000000000000000000000000000000001111");
        let (e, s) = dhke.step2_bob_dleq(b_, &a_big, Some(sk_from_hex(ONE)))?;
        assert_eq!(
            hex::encode(e.secret_bytes()),
            "df1984d5c22f7e17afe33b8669f02f530f286ae3b00a1978edaf900f4721f65e"
        );
        assert_eq!(
            hex::encode(s.secret_bytes()),
            "828404170c86f240c50ae0f5fc17bb6b82612d46b355e046d7cd84b0a3c934a0"
        );
        Ok(())
    }

    #[test]
    fn test_alice_verify_dleq() -> anyhow::Result<()> {
        let dhke = Dhke::new();
        let e = sk_from_hex("9818e061ee51d5c8edc3342369a554998ff7b4381c8652d724cdf46429be73d9");
        let s = sk_from_hex("9818e061ee51d5c8edc3342369a554998ff7b4381c8652d724cdf46429be73da");
        let k = public_key_from_hex(
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
        );
        let b_ = public_key_from_hex(
            "02a9acc1e48c25eeeb9289b5031cc57da9fe72f3fe2861d264bdc074209b107ba2",
        );
        let c_ = public_key_from_hex(
            "02a9acc1e48c25eeeb9289b5031cc57da9fe72f3fe2861d264bdc074209b107ba2",
        );
        assert!(dhke.alice_verify_dleq(e, s, k, b_, c_)?);
        Ok(())
    }

    #[test]
    fn test_dleq_soundness() -> anyhow::Result<()> {
        let dhke = Dhke::new();
        let a = sk_from_hex(ONE);
        let k = a.public_key(&dhke.secp);
        let (b_, _) = dhke.step1_alice("test_message", Some(sk_from_hex(TWO)))?;
        let c_ = dhke.step2_bob(b_, &a)?;
        let (e, s) = dhke.step2_bob_dleq(b_, &a, Some(sk_from_hex(ONE)))?;

        assert!(dhke.alice_verify_dleq(e, s, k, b_, c_)?);

        let bad_s = sk_from_hex(TWO);
        assert!(!dhke.alice_verify_dleq(e, bad_s, k, b_, c_)?);
        Ok(())
    }
}
