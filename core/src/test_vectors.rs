//! Fixed-input test vectors
//!
//! Known encodings and hashes that must never drift: changing any of these
//! breaks stored balances, published meta-addresses or handed-out viewing keys.
//!
//! Reference values: RFC 9496 (ristretto255 generator multiples), BIP-39
//! reference seed for the all-`abandon` mnemonic.

#[cfg(test)]
#[allow(clippy::op_ref)]
#[allow(non_snake_case)] // Crypto notation uses G, H, M, etc.
mod confidential_test_vectors {
    use crate::balance::{EncryptedBalance, BALANCE_LEN};
    use crate::config::EngineConfig;
    use crate::curve::{basepoint, decode_point, encode_point, labels, Keypair};
    use crate::elgamal::{ElGamalCiphertext, EncryptedAmount, PedersenCommitment, CIPHERTEXT_LEN};
    use crate::keys::{MasterSeed, OwnerSecret};
    use crate::proof::{PlaceholderProofSystem, ProofSystem, RangeProof, RangeStatement, PLACEHOLDER_MARKER};
    use crate::stealth::{derive_stealth_address, EphemeralKeypair, StealthKeys, StealthMetaAddress};
    use crate::viewing_key::{account_mask, recover_owner_secret, ViewPermissions, ViewingKeyManager};
    use crate::BalanceEngine;
    use curve25519_dalek::scalar::Scalar;
    use std::sync::Arc;

    const ABANDON_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn unhex32(s: &str) -> [u8; 32] {
        let bytes = hex::decode(s).expect("valid hex");
        bytes.try_into().expect("32 bytes")
    }

    /// Vector 1: ristretto255 generator and its double
    #[test]
    fn test_vector_1_generator_encodings() {
        let G = basepoint();
        assert_eq!(
            hex::encode(encode_point(&G)),
            "e2f2ae0a6abc4e71a884a961c500515f58e30b6aa582dd8db6a65945e08d2d76"
        );
        assert_eq!(
            hex::encode(encode_point(&(G + G))),
            "6a493210f7499cd17fecb510ae0cea23a110e8d5b901f8acadd3095c73a3b919"
        );
    }

    /// Vector 2: the amount-1 ciphertext under randomness 1 and public key G
    ///
    /// C1 = 1·G, C2 = 1·G + 1·G = 2·G
    #[test]
    fn test_vector_2_minimal_ciphertext() {
        let G = basepoint();
        let ct = ElGamalCiphertext::encrypt_with(1, &G, &Scalar::one());
        let bytes = ct.to_bytes();

        assert_eq!(bytes.len(), CIPHERTEXT_LEN);
        assert_eq!(
            hex::encode(&bytes[..32]),
            "e2f2ae0a6abc4e71a884a961c500515f58e30b6aa582dd8db6a65945e08d2d76"
        );
        assert_eq!(
            hex::encode(&bytes[32..]),
            "6a493210f7499cd17fecb510ae0cea23a110e8d5b901f8acadd3095c73a3b919"
        );

        // Private key 1 recovers M = G
        assert_eq!(ct.message_point(&Scalar::one()), G);
    }

    /// Vector 3: an unopened balance serializes to all zeros
    #[test]
    fn test_vector_3_uninitialized_balance_bytes() {
        let bytes = EncryptedBalance::uninitialized().to_bytes();
        assert_eq!(bytes.len(), BALANCE_LEN);
        assert!(bytes.iter().all(|&b| b == 0));

        let decoded = EncryptedBalance::from_bytes(&[0u8; BALANCE_LEN]).unwrap();
        assert!(!decoded.exists);
        assert_eq!(decoded.ciphertext, ElGamalCiphertext::zero());
    }

    /// Vector 4: BIP-39 reference seed and the owner secret derived from it
    #[test]
    fn test_vector_4_mnemonic_owner_secret() {
        let seed = MasterSeed::from_mnemonic(ABANDON_MNEMONIC, "").unwrap();
        assert_eq!(
            hex::encode(seed.as_bytes()),
            "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1\
             9a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4"
        );
        assert_eq!(
            hex::encode(seed.owner_secret().as_bytes()),
            "21920f9f83a3a68c0ade2dcc99bcbde3b81ebfcce56562e83e5fd854692f903f"
        );
    }

    /// Vector 5: account mask and masked secret
    ///
    /// mask = SHA256("account-mask" || "acct-1"), owner secret = 0x11 * 32
    #[test]
    fn test_vector_5_account_mask() {
        assert_eq!(labels::ACCOUNT_MASK, b"account-mask");
        assert_eq!(
            hex::encode(account_mask("acct-1")),
            "d2f443eb35e7dc230d35c7c2f16e5f79d2ca2dda4636a99c5dbdf1ef7b1af306"
        );

        let engine = BalanceEngine::new(EngineConfig::default()).unwrap();
        let manager = ViewingKeyManager::new(Arc::new(engine));
        let owner = OwnerSecret::from_bytes([0x11; 32]);
        let key = manager.derive_viewing_key(&owner, "acct-1", ViewPermissions::default(), None);

        let expected = unhex32("c3e552fa24f6cd321c24d6d3e07f4e68c3db3ccb5727b88d4cace0fe6a0be217");
        assert_eq!(key.masked_secret(), &expected);
        assert_eq!(recover_owner_secret(&expected, "acct-1"), owner);
    }

    /// Vector 6: placeholder proof for the identity commitment
    #[test]
    fn test_vector_6_placeholder_proof_bytes() {
        let commitment = PedersenCommitment::identity();
        let proof = PlaceholderProofSystem
            .generate(&RangeStatement {
                amount: 0,
                blinding: &Scalar::zero(),
                commitment: &commitment,
            })
            .unwrap();

        assert_eq!(PLACEHOLDER_MARKER, b"PLACEHOLDER-NOT-SECURE");
        assert_eq!(proof.system_id, "placeholder");
        assert_eq!(&proof.bytes[..PLACEHOLDER_MARKER.len()], PLACEHOLDER_MARKER);
        assert_eq!(
            hex::encode(&proof.bytes[PLACEHOLDER_MARKER.len()..]),
            "1e3fc300e8392a13eda9ac0a06fb4915453afdef8ff60abcdaf1164ba1a3d051"
        );
    }

    /// Vector 7: fixed stealth keys and ephemeral secret give a fixed address
    #[test]
    fn test_vector_7_fixed_stealth_derivation() {
        let view_secret: [u8; 32] = [
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
            0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10,
            0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18,
            0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f, 0x00,
        ];
        let spend_secret: [u8; 32] = [
            0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x28,
            0x29, 0x2a, 0x2b, 0x2c, 0x2d, 0x2e, 0x2f, 0x30,
            0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38,
            0x39, 0x3a, 0x3b, 0x3c, 0x3d, 0x3e, 0x3f, 0x00,
        ];
        let ephemeral_secret = [0x05u8; 32];

        let keys = StealthKeys::from_secrets(&view_secret, &spend_secret).unwrap();
        let meta = keys.meta_address();

        let derive = || {
            derive_stealth_address(&meta, Some(EphemeralKeypair::from_secret_bytes(&ephemeral_secret).unwrap()))
                .unwrap()
        };
        let (first, ephemeral) = derive();
        let (second, _) = derive();
        assert_eq!(first, second);

        assert_eq!(
            hex::encode(encode_point(&meta.view_public)),
            "cece76aabc4bb51f95d38fd5d7ab0349d6ddd42a6fae74056e06cc8002b07b5a"
        );
        assert_eq!(
            hex::encode(encode_point(&meta.spend_public)),
            "c889ade5c49d8745d87fd3e3a1d8971b87a72c4f7a138655b22ed1fcbf00394a"
        );
        assert_eq!(
            hex::encode(encode_point(&first.ephemeral_public)),
            "d4bcc03f967db8980977cd138ebdea474b35a85ac5688964ecdf859762970e0b"
        );
        assert_eq!(
            hex::encode(first.to_bytes()),
            "dae5f04f1c55107f5a91c4af7ad2b237897a92239a7edbd887d21624ec4e9405"
        );
        assert_eq!(first.view_tag, 0x6a);

        // R = e·G
        let e = Scalar::from_bytes_mod_order(ephemeral_secret);
        assert_eq!(ephemeral.public_key, e * basepoint());

        // The meta-address survives its textual form
        let text = meta.to_string();
        assert_eq!(text.parse::<StealthMetaAddress>().unwrap(), meta);
        let view_public = Keypair::from_scalar(&Scalar::from_bytes_mod_order(view_secret)).public_bytes();
        assert_eq!(&meta.to_bytes()[..32], &view_public[..]);
    }

    /// Vector 8: identity encodes to 32 zero bytes and decodes back
    #[test]
    fn test_vector_8_identity_encoding() {
        let identity = decode_point("identity", &[0u8; 32]).unwrap();
        assert_eq!(PedersenCommitment::from_bytes(&[0u8; 32]).unwrap(), PedersenCommitment::identity());
        assert_eq!(encode_point(&identity), [0u8; 32]);
    }

    /// Vector 9: encrypted amount wire layout
    ///
    /// `C1 || C2 || commitment || id_len(u8) || system_id || proof_len(u32 LE) || proof`
    #[test]
    fn test_vector_9_encrypted_amount_layout() {
        let G = basepoint();
        let amount = EncryptedAmount {
            ciphertext: ElGamalCiphertext::encrypt_with(1, &G, &Scalar::one()),
            commitment: PedersenCommitment::identity(),
            range_proof: RangeProof {
                system_id: "ab".to_string(),
                bytes: vec![0x01, 0x02, 0x03],
            },
            opening: None,
        };

        let expected = concat!(
            "e2f2ae0a6abc4e71a884a961c500515f58e30b6aa582dd8db6a65945e08d2d76",
            "6a493210f7499cd17fecb510ae0cea23a110e8d5b901f8acadd3095c73a3b919",
            "0000000000000000000000000000000000000000000000000000000000000000",
            "02",
            "6162",
            "03000000",
            "010203",
        );
        let bytes = amount.to_bytes().unwrap();
        assert_eq!(hex::encode(&bytes), expected);

        let decoded = EncryptedAmount::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.ciphertext, amount.ciphertext);
        assert_eq!(decoded.commitment, amount.commitment);
        assert_eq!(decoded.range_proof, amount.range_proof);
    }
}
