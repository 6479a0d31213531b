use async_trait::async_trait;
use chrono::{Duration, Utc};
use cms_sha3::artifact::{self, locate_signatures, FieldUpdateHook, SignedField};
use cms_sha3::builder::{CertificateBuilder, LEAF_SUBJECT};
use cms_sha3::report::SignatureReport;
use cms_sha3::{
    AlgorithmCodecRegistry, CertificateChain, Cipher, CmsContainer, CmsError, ContainerOptions,
    DigestAlgorithm, NullTrustEvaluator, SelfSignedTrustEvaluator, SignatureField,
    SignatureSubFilter, SignatureVerificationEngine, SigningCertificate, SigningOrchestrator,
    StateCode, StateKind, TrustEvaluator, TrustResult, TrustStoreEvaluator,
};
use cms_sha3_common::crypto::sign::SigningKey;
use std::sync::Arc;
use x509_cert::Certificate;

const DOCUMENT: &[u8] = b"%Demo document\nHello World!\n";

fn registry() -> Arc<AlgorithmCodecRegistry> {
    Arc::new(AlgorithmCodecRegistry::sha3())
}

fn self_signed_engine(registry: Arc<AlgorithmCodecRegistry>) -> SignatureVerificationEngine {
    let engine = SignatureVerificationEngine::new(registry);
    let evaluator = SelfSignedTrustEvaluator::new(engine.resolver().clone());
    engine.with_trust_evaluator(evaluator)
}

async fn sign(
    orchestrator: &SigningOrchestrator,
    chain: &CertificateChain,
    digest: &str,
    document: &[u8],
) -> Vec<u8> {
    let field = SignatureField::default()
        .with_reason("Integration test")
        .with_location("Darmstadt");
    orchestrator
        .sign_document(document, &field, chain, digest, None)
        .await
        .expect("failed to sign")
}

fn kind(report: &SignatureReport, code: StateCode) -> StateKind {
    report
        .state(code)
        .unwrap_or_else(|| panic!("missing state {code}"))
        .kind
}

fn assert_all_valid(report: &SignatureReport) {
    let codes = report.states().iter().map(|s| s.code).collect::<Vec<_>>();
    assert_eq!(
        codes,
        vec![
            StateCode::Formatting,
            StateCode::Algorithm,
            StateCode::Chain,
            StateCode::CertificateValidity,
            StateCode::Trust,
            StateCode::SigningCertificate,
            StateCode::Digest,
            StateCode::Signature,
        ]
    );
    for state in report.states() {
        assert!(state.is_valid(), "{state}");
    }
}

#[tokio::test]
async fn test_sign_and_verify_sha3() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);

    for (leaf, digest, curve) in [
        (Cipher::EcdsaP256, "SHA3-256", "P-256"),
        (Cipher::EcdsaP384, "SHA3-384", "P-384"),
        (Cipher::EcdsaP256, "SHA3-512", "P-256"),
    ] {
        let chain = orchestrator.generate_chain(leaf, Cipher::EcdsaP256).unwrap();
        let signed = sign(&orchestrator, &chain, digest, DOCUMENT).await;
        assert!(signed.starts_with(DOCUMENT));

        let report = engine.verify(&signed).await;
        assert!(report.error.is_none());
        assert_eq!(report.items.len(), 1);
        let item = &report.items[0];
        assert_all_valid(item);
        assert_eq!(item.reason.as_deref(), Some("Integration test"));
        assert_eq!(item.location.as_deref(), Some("Darmstadt"));
        assert_eq!(item.signature_type, "ETSI.CAdES.detached");

        let signed_data = item.signed_data.as_ref().unwrap();
        assert_eq!(signed_data.digest_algorithm.name(), digest);
        assert_eq!(signed_data.signature_algorithm.name(), "ECDSA");
        assert_eq!(
            signed_data.signature_algorithm.hash().map(|h| h.name()),
            Some(digest)
        );
        assert_eq!(signed_data.named_curve.as_deref(), Some(curve));
        let signer = item.signer_certificate.as_ref().unwrap();
        assert!(signer.subject.contains("Test certificate"));
        assert!(signer.issuer.contains("Test Root CA"));
    }
}

#[tokio::test]
async fn test_sign_and_verify_shake_with_ed25519() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);
    let chain = orchestrator
        .generate_chain(Cipher::Ed25519, Cipher::EcdsaP256)
        .unwrap();

    for digest in ["SHAKE128", "SHAKE256"] {
        let signed = sign(&orchestrator, &chain, digest, DOCUMENT).await;
        let report = engine.verify(&signed).await;
        let item = &report.items[0];
        assert_all_valid(item);
        let signed_data = item.signed_data.as_ref().unwrap();
        assert_eq!(signed_data.digest_algorithm.name(), digest);
        assert_eq!(signed_data.signature_algorithm.name(), "Ed25519");
        assert_eq!(signed_data.named_curve, None);
    }
}

#[tokio::test]
async fn test_rsa_root() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::Rsa)
        .unwrap();
    let signed = sign(&orchestrator, &chain, "SHA3-256", DOCUMENT).await;
    assert_all_valid(&engine.verify(&signed).await.items[0]);
}

#[tokio::test]
async fn test_ecdsa_with_shake_is_unknown() {
    let orchestrator = SigningOrchestrator::new(registry());
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let result = orchestrator
        .sign_document(DOCUMENT, &SignatureField::default(), &chain, "SHAKE256", None)
        .await;
    assert!(matches!(result, Err(CmsError::UnknownAlgorithm(_))));
}

#[tokio::test]
async fn test_tampered_content() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let signed = sign(&orchestrator, &chain, "SHA3-256", DOCUMENT).await;
    let mut tampered = signed.clone();
    tampered[1] = b'X';

    let original = engine.verify(&signed).await;
    let report = engine.verify(&tampered).await;
    let (original, item) = (&original.items[0], &report.items[0]);
    assert_eq!(kind(item, StateCode::Digest), StateKind::Invalid);
    assert!(item
        .state(StateCode::Digest)
        .unwrap()
        .result_message
        .is_some());
    assert_eq!(item.state(StateCode::Chain), original.state(StateCode::Chain));
    assert_eq!(item.state(StateCode::Trust), original.state(StateCode::Trust));
    // the signature covers the signed attributes, not the content
    assert_eq!(kind(item, StateCode::Signature), StateKind::Valid);
}

#[tokio::test]
async fn test_container_too_small() {
    let orchestrator = SigningOrchestrator::new(registry());
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let field = SignatureField::default().with_container_size(128);
    let result = orchestrator
        .sign_document(DOCUMENT, &field, &chain, "SHA3-256", None)
        .await;
    assert!(matches!(
        result,
        Err(CmsError::ContainerTooLarge { budget: 128, .. })
    ));
}

#[tokio::test]
async fn test_hook_can_modify_container() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    // flipping the last signature byte breaks the signature only
    let hook: FieldUpdateHook = Box::new(|field: &mut SignedField| {
        if let Some(last) = field.container.last_mut() {
            *last ^= 0x01;
        }
        Ok(())
    });
    let signed = orchestrator
        .sign_document(DOCUMENT, &SignatureField::default(), &chain, "SHA3-256", Some(hook))
        .await
        .unwrap();
    let report = engine.verify(&signed).await;
    let item = &report.items[0];
    assert_eq!(kind(item, StateCode::Digest), StateKind::Valid);
    assert_eq!(kind(item, StateCode::Signature), StateKind::Invalid);
}

#[tokio::test]
async fn test_multiple_signatures() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);
    let first = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let second = orchestrator
        .generate_chain(Cipher::Ed25519, Cipher::EcdsaP384)
        .unwrap();

    let signed = sign(&orchestrator, &first, "SHA3-256", DOCUMENT).await;
    let field = SignatureField::default().with_sub_filter(SignatureSubFilter::Pkcs7Detached);
    let signed = orchestrator
        .sign_document(&signed, &field, &second, "SHAKE256", None)
        .await
        .unwrap();
    assert_eq!(locate_signatures(&signed).len(), 2);

    let report = engine.verify(&signed).await;
    assert_eq!(report.items.len(), 2);
    assert_all_valid(&report.items[0]);
    assert_all_valid(&report.items[1]);
    assert_eq!(report.items[1].signature_type, "adbe.pkcs7.detached");
    assert_eq!(
        report.items[1]
            .signed_data
            .as_ref()
            .unwrap()
            .digest_algorithm
            .name(),
        "SHAKE256"
    );
}

#[tokio::test]
async fn test_null_trust_evaluator() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine =
        SignatureVerificationEngine::new(registry).with_trust_evaluator(NullTrustEvaluator);
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let signed = sign(&orchestrator, &chain, "SHA3-256", DOCUMENT).await;
    let report = engine.verify(&signed).await;
    let item = &report.items[0];
    let trust = item.state(StateCode::Trust).unwrap();
    assert_eq!(trust.kind, StateKind::Invalid);
    assert!(trust.result_message.is_some());
    assert_eq!(kind(item, StateCode::Digest), StateKind::Valid);
    assert_eq!(kind(item, StateCode::Signature), StateKind::Valid);
}

#[tokio::test]
async fn test_trust_store() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let other = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let signed = sign(&orchestrator, &chain, "SHA3-256", DOCUMENT).await;

    let store = TrustStoreEvaluator::new()
        .with_trusted_root(&chain.root.certificate)
        .unwrap();
    let engine = SignatureVerificationEngine::new(registry.clone()).with_trust_evaluator(store);
    assert_all_valid(&engine.verify(&signed).await.items[0]);

    let store = TrustStoreEvaluator::new()
        .with_trusted_root(&other.root.certificate)
        .unwrap();
    let engine = SignatureVerificationEngine::new(registry).with_trust_evaluator(store);
    let report = engine.verify(&signed).await;
    assert_eq!(kind(&report.items[0], StateCode::Trust), StateKind::Invalid);
}

#[tokio::test]
async fn test_unregistered_algorithm_is_terminal() {
    let orchestrator = SigningOrchestrator::new(registry());
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let signed = sign(&orchestrator, &chain, "SHA3-256", DOCUMENT).await;
    let signed = sign(&orchestrator, &chain, "SHA-256", &signed).await;

    // without the SHA-3 codecs only the second signature can be checked
    let engine = self_signed_engine(Arc::new(AlgorithmCodecRegistry::new()));
    let report = engine.verify(&signed).await;
    assert_eq!(report.items.len(), 2);
    let states = report.items[0].states();
    assert_eq!(states.len(), 2);
    assert_eq!(states[0].code, StateCode::Formatting);
    assert!(states[0].is_valid());
    assert_eq!(states[1].code, StateCode::Algorithm);
    assert_eq!(states[1].kind, StateKind::Invalid);
    assert_all_valid(&report.items[1]);
}

#[tokio::test]
async fn test_no_signatures() {
    let engine = self_signed_engine(registry());
    let report = engine.verify(DOCUMENT).await;
    assert!(report.error.is_none());
    assert!(report.items.is_empty());
}

#[tokio::test]
async fn test_verify_file() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let signed = sign(&orchestrator, &chain, "SHA3-256", DOCUMENT).await;

    let path = std::env::temp_dir().join(format!("cms-sha3-{}.txt", std::process::id()));
    tokio::fs::write(&path, &signed).await.unwrap();
    let report = engine.verify_file(&path).await;
    tokio::fs::remove_file(&path).await.unwrap();
    assert!(report.error.is_none());
    assert_all_valid(&report.items[0]);

    let report = engine.verify_file("/nonexistent/cms-sha3/document.txt").await;
    assert!(report.error.is_some());
    assert!(report.items.is_empty());
}

async fn sign_with(
    orchestrator: &SigningOrchestrator,
    signer: &SigningCertificate,
    certificates: Vec<Certificate>,
    digest: &str,
    options: ContainerOptions,
) -> Vec<u8> {
    let container = CmsContainer::new(orchestrator, signer, certificates, digest).with_options(options);
    artifact::sign_document(DOCUMENT, &SignatureField::default(), &container, None)
        .await
        .expect("failed to sign")
}

#[tokio::test]
async fn test_signature_algorithm_must_match_key() {
    const ECDSA_WITH_SHA3_256: [u8; 11] = [
        0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x03, 0x0a,
    ];
    const SHA3_256: [u8; 11] = [
        0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x08,
    ];
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    // a digest OID in place of the signature OID
    let hook: FieldUpdateHook = Box::new(|field: &mut SignedField| {
        let position = field
            .container
            .windows(ECDSA_WITH_SHA3_256.len())
            .position(|window| window == ECDSA_WITH_SHA3_256)
            .ok_or_else(|| CmsError::InternalError("signature OID not found".to_string()))?;
        field.container[position..position + SHA3_256.len()].copy_from_slice(&SHA3_256);
        Ok(())
    });
    let signed = orchestrator
        .sign_document(DOCUMENT, &SignatureField::default(), &chain, "SHA3-256", Some(hook))
        .await
        .unwrap();

    let report = engine.verify(&signed).await;
    let states = report.items[0].states();
    assert_eq!(states.len(), 2);
    assert!(states[0].is_valid());
    assert_eq!(states[1].code, StateCode::Algorithm);
    assert_eq!(states[1].kind, StateKind::Invalid);
    assert!(report.items[0].state(StateCode::Signature).is_none());
}

#[tokio::test]
async fn test_ed25519_key_rejects_ecdsa_identifier() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);
    let ecdsa = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let ed25519 = orchestrator
        .generate_chain(Cipher::Ed25519, Cipher::EcdsaP256)
        .unwrap();
    // ECDSA signature algorithm, but the embedded signer holds an Ed25519 key
    let signer = SigningCertificate {
        certificate: ed25519.leaf.certificate.clone(),
        key: ecdsa.leaf.key.clone(),
    };
    let signed = sign_with(
        &orchestrator,
        &signer,
        ed25519.certificates(),
        "SHA3-256",
        ContainerOptions::default(),
    )
    .await;
    let report = engine.verify(&signed).await;
    let item = &report.items[0];
    assert_eq!(item.states().len(), 2);
    assert_eq!(kind(item, StateCode::Algorithm), StateKind::Invalid);
}

struct UnavailableTrustStore;

#[async_trait(?Send)]
impl TrustEvaluator for UnavailableTrustStore {
    async fn is_trusted(&self, _certificate: &Certificate) -> cms_sha3::Result<TrustResult> {
        Err(CmsError::InternalError("trust store unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_trust_evaluator_error() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine =
        SignatureVerificationEngine::new(registry).with_trust_evaluator(UnavailableTrustStore);
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let signed = sign(&orchestrator, &chain, "SHA3-256", DOCUMENT).await;
    let report = engine.verify(&signed).await;
    let item = &report.items[0];
    let trust = item.state(StateCode::Trust).unwrap();
    assert_eq!(trust.kind, StateKind::Invalid);
    assert!(trust
        .result_message
        .as_deref()
        .unwrap()
        .contains("trust store unavailable"));
    // the remaining steps still run
    assert_eq!(item.states().len(), 8);
    assert_eq!(kind(item, StateCode::Signature), StateKind::Valid);
}

#[tokio::test]
async fn test_without_signed_attributes() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);
    for (leaf, digest) in [(Cipher::EcdsaP384, "SHA3-384"), (Cipher::Ed25519, "SHAKE128")] {
        let chain = orchestrator.generate_chain(leaf, Cipher::EcdsaP256).unwrap();
        let options = ContainerOptions {
            signed_attributes: false,
            ..ContainerOptions::default()
        };
        let signed =
            sign_with(&orchestrator, &chain.leaf, chain.certificates(), digest, options).await;
        let report = engine.verify(&signed).await;
        let item = &report.items[0];
        assert_eq!(item.states().len(), 8);
        assert_eq!(kind(item, StateCode::SigningCertificate), StateKind::Info);
        assert_eq!(kind(item, StateCode::Digest), StateKind::Info);
        assert_eq!(kind(item, StateCode::Signature), StateKind::Valid, "{digest}");

        // the signature covers the content itself
        let mut tampered = signed.clone();
        tampered[1] = b'X';
        let report = engine.verify(&tampered).await;
        assert_eq!(
            kind(&report.items[0], StateCode::Signature),
            StateKind::Invalid
        );
    }
}

#[tokio::test]
async fn test_signer_outside_validity_period() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let now = Utc::now();

    for (not_before, not_after) in [
        (now - Duration::days(10), now - Duration::days(9)),
        (now + Duration::days(1), now + Duration::days(2)),
    ] {
        let key = SigningKey::new(Cipher::EcdsaP256).unwrap();
        let certificate = CertificateBuilder::new(LEAF_SUBJECT)
            .with_random_serial(10)
            .with_validity(not_before, not_after)
            .issued_by(orchestrator.resolver(), &key, &chain.root)
            .unwrap();
        let leaf = SigningCertificate { certificate, key };
        let certificates = vec![leaf.certificate.clone(), chain.root.certificate.clone()];
        let signed = sign_with(
            &orchestrator,
            &leaf,
            certificates,
            "SHA3-256",
            ContainerOptions::default(),
        )
        .await;
        let report = engine.verify(&signed).await;
        let item = &report.items[0];
        let validity = item.state(StateCode::CertificateValidity).unwrap();
        assert_eq!(validity.kind, StateKind::Invalid);
        assert!(validity.result_message.is_some());
        assert_eq!(kind(item, StateCode::Chain), StateKind::Valid);
        assert_eq!(kind(item, StateCode::Signature), StateKind::Valid);
    }
}

#[tokio::test]
async fn test_signing_certificate_hashes() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();

    for ess_digest in [DigestAlgorithm::Sha512, DigestAlgorithm::Sha3_256] {
        let options = ContainerOptions {
            ess_digest,
            ..ContainerOptions::default()
        };
        let signed =
            sign_with(&orchestrator, &chain.leaf, chain.certificates(), "SHA3-256", options).await;
        let report = engine.verify(&signed).await;
        assert_all_valid(&report.items[0]);
    }
}

#[tokio::test]
async fn test_signing_certificate_mismatch() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let options = ContainerOptions {
        ess_certificate: Some(chain.root.certificate.clone()),
        ..ContainerOptions::default()
    };
    let signed =
        sign_with(&orchestrator, &chain.leaf, chain.certificates(), "SHA3-256", options).await;
    let report = engine.verify(&signed).await;
    let item = &report.items[0];
    assert_eq!(kind(item, StateCode::SigningCertificate), StateKind::Invalid);
    assert_eq!(kind(item, StateCode::Digest), StateKind::Valid);
    assert_eq!(kind(item, StateCode::Signature), StateKind::Valid);
}

#[tokio::test]
async fn test_signing_certificate_unknown_hash() {
    let orchestrator = SigningOrchestrator::new(registry());
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let options = ContainerOptions {
        ess_digest: DigestAlgorithm::Shake256,
        ..ContainerOptions::default()
    };
    let signed =
        sign_with(&orchestrator, &chain.leaf, chain.certificates(), "SHA-256", options).await;

    // SHA-256 resolves without registration, SHAKE256 does not
    let engine = self_signed_engine(Arc::new(AlgorithmCodecRegistry::new()));
    let report = engine.verify(&signed).await;
    let item = &report.items[0];
    let state = item.state(StateCode::SigningCertificate).unwrap();
    assert_eq!(state.kind, StateKind::Invalid);
    assert_eq!(state.text, "Unsupported signing certificate hash");
    assert_eq!(kind(item, StateCode::Signature), StateKind::Valid);
}

#[tokio::test]
async fn test_incomplete_chain() {
    let registry = registry();
    let orchestrator = SigningOrchestrator::new(registry.clone());
    let engine = self_signed_engine(registry);
    let chain = orchestrator
        .generate_chain(Cipher::EcdsaP256, Cipher::EcdsaP256)
        .unwrap();
    let signed = sign_with(
        &orchestrator,
        &chain.leaf,
        vec![chain.leaf.certificate.clone()],
        "SHA3-256",
        ContainerOptions::default(),
    )
    .await;
    let report = engine.verify(&signed).await;
    let item = &report.items[0];
    assert_eq!(kind(item, StateCode::Chain), StateKind::Info);
    assert_eq!(kind(item, StateCode::Trust), StateKind::Invalid);
    assert_eq!(kind(item, StateCode::Digest), StateKind::Valid);
    assert_eq!(kind(item, StateCode::Signature), StateKind::Valid);
}
