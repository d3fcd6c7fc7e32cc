// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Ukimeasure Authors

use base64::{engine::general_purpose, Engine as _};
use log::*;
use openssl::{
    hash::{hash, MessageDigest},
    pkey::{Id, PKey, Private, Public},
    rsa::{Padding, Rsa},
    sign::{Signer, Verifier},
};
use std::path::Path;

use crate::{
    algorithms::HashAlgorithm,
    error::{MeasureError, Result},
};

/// Key able to sign PCR policies
///
/// Implementations must be usable from several threads at once, as the
/// banks of each hash algorithm are signed concurrently.
pub trait PcrSigner: Send + Sync {
    /// Produce a RSASSA-PKCS1-v1_5 signature of `message`, using
    /// `algorithm` as the message digest
    fn sign(&self, message: &[u8], algorithm: HashAlgorithm)
        -> Result<Vec<u8>>;

    /// Public part of the signing key
    fn public_key(&self) -> &Rsa<Public>;

    /// SHA-256 of the DER encoded PKCS#1 public key, as hex
    ///
    /// The boot stub uses it to pick the matching key among the embedded
    /// ones.
    fn fingerprint(&self) -> Result<String> {
        public_key_fingerprint(self.public_key())
    }
}

/// Signed policy digest
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureData {
    /// Signature in base64
    pub signature_base64: String,
    /// The signed digest in hex
    pub digest: String,
}

/// Sign a policy digest
pub fn sign(
    digest: &[u8],
    algorithm: HashAlgorithm,
    signer: &dyn PcrSigner,
) -> Result<SignatureData> {
    let signature = signer.sign(digest, algorithm)?;

    Ok(SignatureData {
        signature_base64: general_purpose::STANDARD.encode(signature),
        digest: hex::encode(digest),
    })
}

pub fn public_key_fingerprint(key: &Rsa<Public>) -> Result<String> {
    let der = key.public_key_to_der_pkcs1().map_err(|source| {
        MeasureError::KeyLoad {
            message: "failed to encode public key in PKCS#1 DER format".into(),
            source,
        }
    })?;
    let digest =
        hash(MessageDigest::sha256(), &der).map_err(MeasureError::Hash)?;
    Ok(hex::encode(digest))
}

/// Verify a signature produced by [`PcrSigner::sign`]
pub fn verify_signature(
    key: &Rsa<Public>,
    message: &[u8],
    signature: &[u8],
    algorithm: HashAlgorithm,
) -> Result<bool> {
    let pkey = PKey::from_rsa(key.clone()).map_err(|source| {
        MeasureError::VerifyError {
            message: "failed to create PKey structure from RSA structure"
                .into(),
            source,
        }
    })?;
    let mut verifier =
        Verifier::new(algorithm.into(), &pkey).map_err(|source| {
            MeasureError::VerifyError {
                message: "failed to create signature verifier object".into(),
                source,
            }
        })?;
    verifier.set_rsa_padding(Padding::PKCS1).map_err(|source| {
        MeasureError::VerifyError {
            message: "failed to set signature verifier padding algorithm"
                .into(),
            source,
        }
    })?;
    verifier
        .verify_oneshot(signature, message)
        .map_err(|source| MeasureError::VerifyError {
            message: "invalid signature".into(),
            source,
        })
}

/// [`PcrSigner`] backed by an in-memory RSA private key
#[derive(Debug, Clone)]
pub struct RsaPcrSigner {
    private: PKey<Private>,
    public: Rsa<Public>,
}

impl RsaPcrSigner {
    pub fn new(private: PKey<Private>) -> Result<Self> {
        if private.id() != Id::RSA {
            return Err(MeasureError::UnsupportedKeyAlgorithm {
                id: format!("{:?}", private.id()),
            });
        }

        let rsa = private.rsa().map_err(|source| MeasureError::KeyLoad {
            message: "failed to get RSA private key from structure".into(),
            source,
        })?;
        let public = rsa
            .public_key_to_der()
            .and_then(|der| Rsa::public_key_from_der(&der))
            .map_err(|source| MeasureError::KeyLoad {
                message: "failed to get RSA public key from structure".into(),
                source,
            })?;

        Ok(RsaPcrSigner { private, public })
    }

    /// Decode a PEM private key, encrypted or not
    pub fn from_pem(pem: &[u8], password: Option<&str>) -> Result<Self> {
        let private = match password {
            Some(pw) if !pw.is_empty() => {
                PKey::private_key_from_pem_passphrase(pem, pw.as_bytes())
            }
            _ => PKey::private_key_from_pem(pem),
        }
        .map_err(|source| MeasureError::KeyLoad {
            message: "failed to decode private key from PEM".into(),
            source,
        })?;

        Self::new(private)
    }

    pub fn from_pem_file(path: &Path, password: Option<&str>) -> Result<Self> {
        let pem =
            std::fs::read(path).map_err(|source| MeasureError::KeyRead {
                path: path.display().to_string(),
                source,
            })?;
        debug!("Loaded PCR signing key from {}", path.display());
        Self::from_pem(&pem, password)
    }

    /// Public key as PEM encoded SubjectPublicKeyInfo, the format of the
    /// `.pcrpkey` section
    pub fn public_key_pem(&self) -> Result<String> {
        let pem = self.public.public_key_to_pem().map_err(|source| {
            MeasureError::KeyLoad {
                message: "failed to encode public key in PEM format".into(),
                source,
            }
        })?;
        // PEM output is always ASCII
        Ok(String::from_utf8_lossy(&pem).into_owned())
    }
}

impl PcrSigner for RsaPcrSigner {
    fn sign(
        &self,
        message: &[u8],
        algorithm: HashAlgorithm,
    ) -> Result<Vec<u8>> {
        let mut signer =
            Signer::new(algorithm.into(), &self.private).map_err(|source| {
                MeasureError::SigningError {
                    message: "failed to create signer object".into(),
                    source: Some(source),
                }
            })?;
        signer.set_rsa_padding(Padding::PKCS1).map_err(|source| {
            MeasureError::SigningError {
                message: "failed to set signer padding algorithm".into(),
                source: Some(source),
            }
        })?;
        signer.sign_oneshot_to_vec(message).map_err(|source| {
            MeasureError::SigningError {
                message: format!("failed to sign with {algorithm}"),
                source: Some(source),
            }
        })
    }

    fn public_key(&self) -> &Rsa<Public> {
        &self.public
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::path::PathBuf;

    pub(crate) fn test_data(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("test-data")
            .join(name)
    }

    pub(crate) fn test_signer() -> RsaPcrSigner {
        RsaPcrSigner::from_pem_file(&test_data("private.pem"), None)
            .expect("unable to load test key")
    }

    /// Signer producing predictable signatures without touching any
    /// private key
    #[derive(Debug)]
    pub(crate) struct FakeSigner {
        public: Rsa<Public>,
        fail: bool,
    }

    impl FakeSigner {
        pub(crate) fn new() -> Self {
            let pem = std::fs::read(test_data("public.pem"))
                .expect("unable to read test public key");
            FakeSigner {
                public: Rsa::public_key_from_pem(&pem)
                    .expect("unable to decode test public key"),
                fail: false,
            }
        }

        pub(crate) fn failing() -> Self {
            FakeSigner {
                fail: true,
                ..Self::new()
            }
        }
    }

    impl PcrSigner for FakeSigner {
        fn sign(
            &self,
            message: &[u8],
            algorithm: HashAlgorithm,
        ) -> Result<Vec<u8>> {
            if self.fail {
                return Err(MeasureError::SigningError {
                    message: "key unavailable".into(),
                    source: None,
                });
            }
            let mut signature = algorithm.tpm_alg_id().to_be_bytes().to_vec();
            signature.extend(message.iter().rev());
            Ok(signature)
        }

        fn public_key(&self) -> &Rsa<Public> {
            &self.public
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    const TEST_KEY_FINGERPRINT: &str =
        "22401909df5e3661ca06977db25141fd6dc05d2733f89c2a760bc3f2f9273328";

    #[test]
    fn test_fingerprint() {
        let signer = test_signer();
        assert_eq!(signer.fingerprint().unwrap(), TEST_KEY_FINGERPRINT); //#[allow_ci]

        // Only the public key is involved
        let fake = FakeSigner::new();
        assert_eq!(fake.fingerprint().unwrap(), TEST_KEY_FINGERPRINT); //#[allow_ci]
    }

    #[test]
    fn test_sign_known_signature() {
        let signer = test_signer();
        let digest = hex::decode(
            "7c8486f61cc1d88a28d6ab87850bee07c467ce6311340219e43a7a6e6521e543",
        )
        .unwrap(); //#[allow_ci]

        let data = sign(&digest, HashAlgorithm::Sha256, &signer).unwrap(); //#[allow_ci]

        assert_eq!(
            data.digest,
            "7c8486f61cc1d88a28d6ab87850bee07c467ce6311340219e43a7a6e6521e543"
        );
        // PKCS#1 v1.5 signatures are deterministic
        assert_eq!(
            data.signature_base64,
            concat!(
                "LZwdlaDACZQ3etz6D+gZNRxwLhm7JziyCuWiCf5e0qiwPJJVGf0PUciOdjH4",
                "SHkRlDFh48rVFOCKOEUjgn5t93IMPEH2oYB8z8YCx0b/bGIqw58qjb0M6BTH",
                "AYdeUCY6Q24QYvCYKhG9ejmmcjxV2x3hwGungzM3LgTSA1kTohFKyBpPC/GL",
                "Ou6ahI0qa+kdLWtS/gzZbzkQzEjConr3gBKAL4X8wfUBnqA/qJSZ9vZFvU2M",
                "vSSn+lXHlI5L6Gc3S4+RqfOFnq8nKdJRKVa7yg69w1iUAoA7IseQ3Bjox0tT",
                "qyCte5P7ufNRHSing6zavcjjwfRmkmozKjULLhhXWQ=="
            )
        );
    }

    #[test]
    fn test_sign_verify_all_algorithms() {
        let signer = test_signer();
        let message = [0x42u8; 32];

        for alg in HashAlgorithm::ALL {
            let signature = signer.sign(&message, alg).unwrap(); //#[allow_ci]
            assert_eq!(signature.len(), 256);
            assert!(verify_signature(
                signer.public_key(),
                &message,
                &signature,
                alg
            )
            .unwrap()); //#[allow_ci]
        }
    }

    #[test]
    fn test_verify_rejects_other_message() {
        let signer = test_signer();
        let signature = signer.sign(b"policy", HashAlgorithm::Sha1).unwrap(); //#[allow_ci]
        let verified = verify_signature(
            signer.public_key(),
            b"another policy",
            &signature,
            HashAlgorithm::Sha1,
        );
        assert!(!matches!(verified, Ok(true)));
    }

    #[test]
    fn test_load_encrypted_key() {
        let signer = RsaPcrSigner::from_pem_file(
            &test_data("private-encrypted.pem"),
            Some("ukimeasure"),
        )
        .unwrap(); //#[allow_ci]
        assert_eq!(signer.fingerprint().unwrap(), TEST_KEY_FINGERPRINT); //#[allow_ci]

        let result = RsaPcrSigner::from_pem_file(
            &test_data("private-encrypted.pem"),
            Some("wrong"),
        );
        assert!(matches!(result, Err(MeasureError::KeyLoad { .. })));
    }

    #[test]
    fn test_load_non_rsa_key() {
        let result =
            RsaPcrSigner::from_pem_file(&test_data("ec-private.pem"), None);
        assert!(matches!(
            result,
            Err(MeasureError::UnsupportedKeyAlgorithm { .. })
        ));
    }

    #[test]
    fn test_load_missing_key() {
        let result =
            RsaPcrSigner::from_pem_file(Path::new("/nonexistent/key"), None);
        assert!(matches!(result, Err(MeasureError::KeyRead { .. })));
    }

    #[test]
    fn test_public_key_pem() {
        let signer = test_signer();
        let pem = signer.public_key_pem().unwrap(); //#[allow_ci]
        let expected = std::fs::read_to_string(test_data("public.pem")).unwrap(); //#[allow_ci]
        assert_eq!(pem, expected);
    }

    #[test]
    fn test_failing_signer() {
        let result = sign(&[0u8; 32], HashAlgorithm::Sha256, &FakeSigner::failing());
        assert!(matches!(result, Err(MeasureError::SigningError { .. })));
    }
}
