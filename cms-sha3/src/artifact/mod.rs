//! Embedding signature containers into documents.
//!
//! Signing appends a signature dictionary with a zero-filled `/Contents` placeholder of a
//! fixed byte budget. The `/ByteRange` covers the whole document except the placeholder,
//! so later signatures can be appended without invalidating earlier ones.

pub mod dictionary;
mod lexer;

use crate::artifact::dictionary::{escape_string, format_byte_range, SignatureDictionary};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use cms_sha3_common::{CmsError, Result};
use tracing::{debug, info};

pub use dictionary::find_signature_dictionaries;

/// Default number of bytes reserved for the signature container.
pub const DEFAULT_CONTAINER_SIZE: usize = 8192;
const SIGNING_TIME_FORMAT: &str = "D:%Y%m%d%H%M%SZ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    Pkcs7Detached,
    /// ETSI.CAdES.detached - CAdES signature
    #[default]
    CadesDetached,
}

impl SignatureSubFilter {
    pub fn as_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            _ => None,
        }
    }
}

/// Properties of a signature that is about to be created.
#[derive(Debug, Clone)]
pub struct SignatureField {
    pub sub_filter: SignatureSubFilter,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub signing_time: DateTime<Utc>,
    /// Bytes reserved for the DER encoded container.
    pub container_size: usize,
}

impl Default for SignatureField {
    fn default() -> Self {
        Self {
            sub_filter: SignatureSubFilter::default(),
            reason: None,
            location: None,
            signing_time: Utc::now(),
            container_size: DEFAULT_CONTAINER_SIZE,
        }
    }
}

impl SignatureField {
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_container_size(mut self, container_size: usize) -> Self {
        self.container_size = container_size;
        self
    }

    pub fn with_signing_time(mut self, signing_time: DateTime<Utc>) -> Self {
        self.signing_time = signing_time;
        self
    }

    pub fn with_sub_filter(mut self, sub_filter: SignatureSubFilter) -> Self {
        self.sub_filter = sub_filter;
        self
    }

    /// Renders the dictionary, returning it with the offsets of `/ByteRange [` and `/Contents <`.
    fn render_placeholder(&self) -> (Vec<u8>, usize, usize) {
        let mut dict = format!(
            "<< /Type /Sig /Filter /Adobe.PPKLite /SubFilter /{} /M {}",
            self.sub_filter.as_name(),
            escape_string(&format_signing_time(&self.signing_time)),
        );
        if let Some(reason) = &self.reason {
            dict.push_str(&format!(" /Reason {}", escape_string(reason)));
        }
        if let Some(location) = &self.location {
            dict.push_str(&format!(" /Location {}", escape_string(location)));
        }
        dict.push_str(" /ByteRange ");
        let byte_range_offset = dict.len();
        dict.push_str(&format_byte_range(&[0; 4]));
        dict.push_str(" /Contents ");
        let contents_offset = dict.len();
        dict.push('<');
        dict.push_str(&"0".repeat(self.container_size * 2));
        dict.push_str("> >>");
        (dict.into_bytes(), byte_range_offset, contents_offset)
    }
}

pub fn format_signing_time(time: &DateTime<Utc>) -> String {
    time.format(SIGNING_TIME_FORMAT).to_string()
}

pub fn parse_signing_time(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, SIGNING_TIME_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// `[offset1, length1, offset2, length2]`, the two signed regions of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange(pub [u64; 4]);

impl ByteRange {
    pub fn from_slice(values: &[u64]) -> Result<Self> {
        <[u64; 4]>::try_from(values)
            .map(ByteRange)
            .map_err(|_| CmsError::MalformedField(format!("/ByteRange has {} entries", values.len())))
    }

    /// Checks that both regions lie inside `len` bytes, start at zero and do not overlap.
    pub fn validate(&self, len: usize) -> Result<()> {
        let [offset1, length1, offset2, length2] = self.0;
        if offset1 != 0 {
            return Err(CmsError::MalformedField(format!(
                "/ByteRange must start at 0, got {offset1}"
            )));
        }
        if length1 > offset2 {
            return Err(CmsError::MalformedField(format!(
                "/ByteRange first range ({length1}) overlaps with second range start ({offset2})"
            )));
        }
        let end = offset2.checked_add(length2);
        if end.map_or(true, |end| end > len as u64) {
            return Err(CmsError::MalformedField(format!(
                "/ByteRange exceeds the artifact size of {len} bytes"
            )));
        }
        Ok(())
    }

    /// Gap between the two regions, which has to hold the `/Contents` value.
    pub fn gap(&self) -> core::ops::Range<usize> {
        self.0[1] as usize..self.0[2] as usize
    }

    pub fn end(&self) -> usize {
        (self.0[2] + self.0[3]) as usize
    }

    /// Concatenation of both regions, after validating them against `data`.
    pub fn extract(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.validate(data.len())?;
        let [offset1, length1, offset2, length2] = self.0.map(|v| v as usize);
        let mut signed = Vec::with_capacity(length1 + length2);
        signed.extend_from_slice(&data[offset1..offset1 + length1]);
        signed.extend_from_slice(&data[offset2..offset2 + length2]);
        Ok(signed)
    }
}

/// Produces the signature container for the bytes covered by a signature.
#[async_trait(?Send)]
pub trait ContainerCreate {
    async fn create(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Container produced for a signature field, handed to the [`FieldUpdateHook`].
#[derive(Debug, Clone)]
pub struct SignedField {
    pub container: Vec<u8>,
    byte_range: ByteRange,
}

impl SignedField {
    pub fn byte_range(&self) -> ByteRange {
        self.byte_range
    }
}

/// Runs after the container was created and before it is written into the placeholder.
pub type FieldUpdateHook = Box<dyn FnOnce(&mut SignedField) -> Result<()>>;

/// Appends a signature to `document`.
///
/// Fails with [`CmsError::ContainerTooLarge`] if the container, after the hook ran, does not
/// fit into [`SignatureField::container_size`]. The input is never modified, a failed call
/// leaves nothing behind.
pub async fn sign_document(
    document: &[u8],
    field: &SignatureField,
    creator: &dyn ContainerCreate,
    hook: Option<FieldUpdateHook>,
) -> Result<Vec<u8>> {
    let (dict, byte_range_offset, contents_offset) = field.render_placeholder();
    let mut out = Vec::with_capacity(document.len() + dict.len() + 2);
    out.extend_from_slice(document);
    out.push(b'\n');
    let base = out.len();
    out.extend_from_slice(&dict);
    out.push(b'\n');

    let contents_start = base + contents_offset;
    let contents_end = contents_start + field.container_size * 2 + 2;
    let byte_range = ByteRange([
        0,
        contents_start as u64,
        contents_end as u64,
        (out.len() - contents_end) as u64,
    ]);
    let rendered = format_byte_range(&byte_range.0);
    let patch_start = base + byte_range_offset;
    out[patch_start..patch_start + rendered.len()].copy_from_slice(rendered.as_bytes());
    debug!("reserved {} bytes with byte range {:?}", field.container_size, byte_range.0);

    let signed = byte_range.extract(&out)?;
    let container = creator.create(&signed).await?;
    let mut signed_field = SignedField {
        container,
        byte_range,
    };
    if let Some(hook) = hook {
        hook(&mut signed_field)?;
    }
    if signed_field.container.len() > field.container_size {
        return Err(CmsError::ContainerTooLarge {
            size: signed_field.container.len(),
            budget: field.container_size,
        });
    }

    let encoded = hex::encode(&signed_field.container);
    out[contents_start + 1..contents_start + 1 + encoded.len()].copy_from_slice(encoded.as_bytes());
    info!(
        "embedded container of {} bytes ({} reserved)",
        signed_field.container.len(),
        field.container_size
    );
    Ok(out)
}

/// Parses every signature dictionary in `data`, in document order.
pub fn locate_signatures(data: &[u8]) -> Vec<Result<SignatureDictionary>> {
    find_signature_dictionaries(data)
        .into_iter()
        .map(|offset| SignatureDictionary::parse(data, offset))
        .collect()
}
