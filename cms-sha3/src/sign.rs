use crate::artifact::{sign_document, ContainerCreate, FieldUpdateHook, SignatureField};
use crate::builder::{generate_chain, CertificateChain, SigningCertificate};
use async_trait::async_trait;
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedAttributes, SignedData, SignerIdentifier,
    SignerInfo, SignerInfos,
};
use cms_sha3_common::constants::{
    ID_AA_SIGNING_CERTIFICATE_V2, ID_CONTENT_TYPE, ID_DATA, ID_MESSAGE_DIGEST, ID_SIGNED_DATA,
};
use cms_sha3_common::crypto::digest::DigestAlgorithm;
use cms_sha3_common::crypto::sign::Cipher;
use cms_sha3_common::Result;
use cms_sha3_der::ess::SigningCertificateV2;
use cms_sha3_der::{AlgorithmCodecRegistry, ResolverChain};
use const_oid::ObjectIdentifier;
use der::asn1::{OctetString, SetOfVec};
use der::{Any, Decode, Encode};
use std::sync::Arc;
use tracing::{debug, info};
use x509_cert::attr::Attribute;
use x509_cert::Certificate;

/// Creates CMS signed data containers, tagging algorithms through the codec registry.
#[derive(Debug, Clone)]
pub struct SigningOrchestrator {
    resolver: ResolverChain,
}

/// Layout of the signed attributes of a container.
#[derive(Debug, Clone)]
pub struct ContainerOptions {
    /// Without signed attributes the signature covers the content directly.
    pub signed_attributes: bool,
    /// Hash of the signing-certificate-v2 attribute.
    pub ess_digest: DigestAlgorithm,
    /// Certificate referenced by signing-certificate-v2, the signer's if `None`.
    pub ess_certificate: Option<Certificate>,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            signed_attributes: true,
            ess_digest: DigestAlgorithm::Sha256,
            ess_certificate: None,
        }
    }
}

fn attribute(oid: ObjectIdentifier, value: &impl Encode) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![Any::from_der(&value.to_der()?)?])?,
    })
}

impl SigningOrchestrator {
    pub fn new(registry: Arc<AlgorithmCodecRegistry>) -> Self {
        Self {
            resolver: ResolverChain::new(registry),
        }
    }

    pub fn resolver(&self) -> &ResolverChain {
        &self.resolver
    }

    /// Generates a root CA with a `root` key and a leaf certificate with a `leaf` key.
    pub fn generate_chain(&self, leaf: Cipher, root: Cipher) -> Result<CertificateChain> {
        info!("generating {} leaf issued by {} root", leaf.name(), root.name());
        generate_chain(&self.resolver, leaf, root)
    }

    /// Builds a detached CMS `SignedData` over `data`, DER encoded.
    ///
    /// The signed attributes are content-type, message-digest and signing-certificate-v2.
    /// `certificates` are embedded as they are, usually the signer's followed by its issuers.
    pub async fn create_container(
        &self,
        signer: &SigningCertificate,
        certificates: &[Certificate],
        digest: &str,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        self.create_container_with(signer, certificates, digest, data, &ContainerOptions::default())
            .await
    }

    /// Like [`Self::create_container`], with the signed attributes laid out by `options`.
    pub async fn create_container_with(
        &self,
        signer: &SigningCertificate,
        certificates: &[Certificate],
        digest: &str,
        data: &[u8],
        options: &ContainerOptions,
    ) -> Result<Vec<u8>> {
        let digest: DigestAlgorithm = digest.parse()?;
        let digest_alg = self.resolver.encode_algorithm(&digest.descriptor())?;
        let signature_algorithm = self
            .resolver
            .encode_algorithm(&signer.key.signature_algorithm(digest))?;
        debug!(
            "signing with digest {} and signature algorithm {}",
            digest_alg.oid, signature_algorithm.oid
        );

        let (signed_attrs, signature) = if options.signed_attributes {
            let signed_attrs = self.signed_attributes(signer, digest, data, options)?;
            let signature = signer.key.sign(digest, &signed_attrs.to_der()?)?;
            (Some(signed_attrs), signature)
        } else {
            debug!("signing the content without signed attributes");
            (None, signer.key.sign(digest, data)?)
        };

        let tbs = &signer.certificate.tbs_certificate;
        let signer_info = SignerInfo {
            version: CmsVersion::V1,
            sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: tbs.issuer.clone(),
                serial_number: tbs.serial_number.clone(),
            }),
            digest_alg: digest_alg.clone(),
            signed_attrs,
            signature_algorithm,
            signature: OctetString::new(signature)?,
            unsigned_attrs: None,
        };

        let certificates = certificates
            .iter()
            .cloned()
            .map(CertificateChoices::Certificate)
            .collect::<Vec<_>>();
        let signed_data = SignedData {
            version: CmsVersion::V1,
            digest_algorithms: SetOfVec::try_from(vec![digest_alg])?,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: ID_DATA,
                econtent: None,
            },
            certificates: Some(CertificateSet(SetOfVec::try_from(certificates)?)),
            crls: None,
            signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info])?),
        };
        let container = ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::from_der(&signed_data.to_der()?)?,
        }
        .to_der()?;
        debug!("created container of {} bytes", container.len());
        Ok(container)
    }

    /// content-type, message-digest and signing-certificate-v2, in that order.
    fn signed_attributes(
        &self,
        signer: &SigningCertificate,
        digest: DigestAlgorithm,
        data: &[u8],
        options: &ContainerOptions,
    ) -> Result<SignedAttributes> {
        let ess_certificate = options.ess_certificate.as_ref().unwrap_or(&signer.certificate);
        // SHA-256 is the default and stays implicit
        let ess_algorithm = match options.ess_digest {
            DigestAlgorithm::Sha256 => None,
            ess_digest => Some(self.resolver.encode_algorithm(&ess_digest.descriptor())?),
        };
        let signing_certificate = SigningCertificateV2::new(
            &ess_certificate.to_der()?,
            options.ess_digest,
            ess_algorithm,
        )?;
        Ok(SetOfVec::try_from(vec![
            attribute(ID_CONTENT_TYPE, &ID_DATA)?,
            attribute(ID_MESSAGE_DIGEST, &OctetString::new(digest.digest(data))?)?,
            attribute(ID_AA_SIGNING_CERTIFICATE_V2, &signing_certificate)?,
        ])?)
    }

    /// Appends a signature made by the leaf of `chain` to `document`.
    pub async fn sign_document(
        &self,
        document: &[u8],
        field: &SignatureField,
        chain: &CertificateChain,
        digest: &str,
        hook: Option<FieldUpdateHook>,
    ) -> Result<Vec<u8>> {
        let container = CmsContainer::new(self, &chain.leaf, chain.certificates(), digest);
        sign_document(document, field, &container, hook).await
    }
}

/// [`ContainerCreate`] producing CMS containers for one signer.
pub struct CmsContainer<'a> {
    orchestrator: &'a SigningOrchestrator,
    signer: &'a SigningCertificate,
    certificates: Vec<Certificate>,
    digest: String,
    options: ContainerOptions,
}

impl<'a> CmsContainer<'a> {
    pub fn new(
        orchestrator: &'a SigningOrchestrator,
        signer: &'a SigningCertificate,
        certificates: Vec<Certificate>,
        digest: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            signer,
            certificates,
            digest: digest.into(),
            options: ContainerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ContainerOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait(?Send)]
impl ContainerCreate for CmsContainer<'_> {
    async fn create(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.orchestrator
            .create_container_with(
                self.signer,
                &self.certificates,
                &self.digest,
                data,
                &self.options,
            )
            .await
    }
}
