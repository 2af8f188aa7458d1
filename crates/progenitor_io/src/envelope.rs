//! Versioned binary envelope around `rkyv` archives.
//!
//! Layout (all integers little endian):
//!
//! ```text
//! magic "PGNA" | format u16 | kind_len u16 | kind | schema u32 | payload_len u64 | sha256 [32] | payload
//! ```
//!
//! The kind string and schema version come from the [`Artifact`] impl of the
//! stored type, so loading a `SimData` from a file that holds a `RawData`, or
//! from an older `SimData` layout, fails with [`StoreError::SchemaMismatch`]
//! instead of reinterpreting foreign bytes.

use crate::error::{Result, StoreError};
use progenitor_data::{
    CellState, DaughterPair, MetricsData, RawData, RawValidationData, SimData, ValidationData,
};
use rkyv::de::deserializers::SharedDeserializeMap;
use rkyv::ser::serializers::AllocSerializer;
use rkyv::ser::Serializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{AlignedVec, Archive, CheckBytes};
use sha2::{Digest, Sha256};

pub const MAGIC: &[u8; 4] = b"PGNA";
pub const FORMAT_VERSION: u16 = 1;
const CHECKSUM_LEN: usize = 32;

/// A type that may be persisted in the artifact store.
pub trait Artifact {
    /// Stable type tag written into the envelope.
    const KIND: &'static str;
    /// Bumped whenever the archived layout changes.
    const SCHEMA_VERSION: u32;

    /// Nesting depth of the object graph, checked against the [`DepthBudget`]
    /// before serialization.
    fn nesting_depth(&self) -> usize {
        1
    }
}

/// Limit on object graph nesting accepted by the serializer.
///
/// Exceeding it is recoverable exactly once: [`DepthBudget::raise`] lifts the
/// limit to [`DepthBudget::RAISED_LIMIT`] and refuses any further raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthBudget {
    limit: usize,
    raised: bool,
}

impl Default for DepthBudget {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}

impl DepthBudget {
    pub const DEFAULT_LIMIT: usize = 1000;
    pub const RAISED_LIMIT: usize = 4000;

    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            raised: false,
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised
    }

    pub fn check(&self, depth: usize) -> Result<()> {
        if depth > self.limit {
            return Err(StoreError::DepthExceeded {
                depth,
                budget: self.limit,
            });
        }
        Ok(())
    }

    /// Raises the budget. Returns `false` if it was already raised.
    pub fn raise(&mut self) -> bool {
        if self.raised {
            return false;
        }
        self.raised = true;
        self.limit = self.limit.max(Self::RAISED_LIMIT);
        true
    }
}

/// Decoded envelope header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub format_version: u16,
    pub kind: String,
    pub schema_version: u32,
    pub payload_len: u64,
    pub checksum: [u8; CHECKSUM_LEN],
    /// Offset of the payload within the envelope.
    pub payload_offset: usize,
}

/// Serializes `value` into an envelope.
pub fn encode<T>(value: &T, budget: &DepthBudget) -> Result<Vec<u8>>
where
    T: Artifact + rkyv::Serialize<AllocSerializer<4096>>,
{
    budget.check(value.nesting_depth())?;

    let mut serializer = AllocSerializer::<4096>::default();
    serializer
        .serialize_value(value)
        .map_err(|e| StoreError::rkyv(format!("serialization of {} failed: {:?}", T::KIND, e)))?;
    let payload = serializer.into_serializer().into_inner();

    let kind = T::KIND.as_bytes();
    let kind_len = u16::try_from(kind.len())
        .map_err(|_| StoreError::validation(format!("artifact kind too long: {}", T::KIND)))?;
    let checksum = Sha256::digest(payload.as_slice());

    let mut out =
        Vec::with_capacity(4 + 2 + 2 + kind.len() + 4 + 8 + CHECKSUM_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&kind_len.to_le_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(&T::SCHEMA_VERSION.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&checksum);
    out.extend_from_slice(payload.as_slice());
    Ok(out)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| StoreError::corrupt("truncated envelope header"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }
}

/// Parses the envelope header without touching the payload.
pub fn read_header(bytes: &[u8]) -> Result<EnvelopeHeader> {
    let mut cursor = Cursor { bytes, pos: 0 };
    if cursor.take(4)? != MAGIC {
        return Err(StoreError::corrupt("missing artifact magic"));
    }
    let format_version = u16::from_le_bytes(cursor.array()?);
    if format_version != FORMAT_VERSION {
        return Err(StoreError::SchemaMismatch {
            expected: format!("envelope v{}", FORMAT_VERSION),
            found: format!("envelope v{}", format_version),
        });
    }
    let kind_len = u16::from_le_bytes(cursor.array()?) as usize;
    let kind = std::str::from_utf8(cursor.take(kind_len)?)
        .map_err(|_| StoreError::corrupt("artifact kind is not UTF-8"))?
        .to_string();
    let schema_version = u32::from_le_bytes(cursor.array()?);
    let payload_len = u64::from_le_bytes(cursor.array()?);
    let checksum: [u8; CHECKSUM_LEN] = cursor.array()?;

    Ok(EnvelopeHeader {
        format_version,
        kind,
        schema_version,
        payload_len,
        checksum,
        payload_offset: cursor.pos,
    })
}

/// Validates framing and checksum, returning the header and the payload.
pub fn verify(bytes: &[u8]) -> Result<(EnvelopeHeader, &[u8])> {
    let header = read_header(bytes)?;
    let payload = &bytes[header.payload_offset..];
    if payload.len() as u64 != header.payload_len {
        return Err(StoreError::corrupt(format!(
            "payload length {} does not match header {}",
            payload.len(),
            header.payload_len
        )));
    }
    let checksum = Sha256::digest(payload);
    if checksum.as_slice() != header.checksum {
        return Err(StoreError::corrupt(format!(
            "checksum mismatch (expected {}, found {})",
            hex::encode(header.checksum),
            hex::encode(checksum)
        )));
    }
    Ok((header, payload))
}

/// Restores a value from an envelope produced by [`encode`].
pub fn decode<T>(bytes: &[u8]) -> Result<T>
where
    T: Artifact + Archive,
    T::Archived: rkyv::Deserialize<T, SharedDeserializeMap>
        + for<'a> CheckBytes<DefaultValidator<'a>>,
{
    let (header, payload) = verify(bytes)?;
    if header.kind != T::KIND || header.schema_version != T::SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            expected: format!("{} v{}", T::KIND, T::SCHEMA_VERSION),
            found: format!("{} v{}", header.kind, header.schema_version),
        });
    }

    // Payload sits at an arbitrary offset; rkyv needs it aligned.
    let mut aligned = AlignedVec::with_capacity(payload.len());
    aligned.extend_from_slice(payload);

    let archived = rkyv::check_archived_root::<T>(&aligned[..])
        .map_err(|e| StoreError::rkyv(format!("validation of {} failed: {:?}", T::KIND, e)))?;
    let mut deserializer = SharedDeserializeMap::default();
    rkyv::Deserialize::<T, _>::deserialize(archived, &mut deserializer)
        .map_err(|e| StoreError::rkyv(format!("deserialization of {} failed: {:?}", T::KIND, e)))
}

impl Artifact for RawData {
    const KIND: &'static str = "raw_data";
    const SCHEMA_VERSION: u32 = 1;

    fn nesting_depth(&self) -> usize {
        4
    }
}

impl Artifact for SimData {
    const KIND: &'static str = "sim_data";
    const SCHEMA_VERSION: u32 = 1;

    /// Every fit stage and applied variant wraps the previous parameter set,
    /// so the derivation chain adds to the structural depth.
    fn nesting_depth(&self) -> usize {
        4 + self.provenance_len()
    }
}

impl Artifact for MetricsData {
    const KIND: &'static str = "metrics_data";
    const SCHEMA_VERSION: u32 = 1;
}

impl Artifact for RawValidationData {
    const KIND: &'static str = "raw_validation_data";
    const SCHEMA_VERSION: u32 = 1;

    fn nesting_depth(&self) -> usize {
        3
    }
}

impl Artifact for ValidationData {
    const KIND: &'static str = "validation_data";
    const SCHEMA_VERSION: u32 = 1;

    fn nesting_depth(&self) -> usize {
        3
    }
}

impl Artifact for CellState {
    const KIND: &'static str = "cell_state";
    const SCHEMA_VERSION: u32 = 1;

    fn nesting_depth(&self) -> usize {
        3
    }
}

impl Artifact for DaughterPair {
    const KIND: &'static str = "daughter_pair";
    const SCHEMA_VERSION: u32 = 1;

    fn nesting_depth(&self) -> usize {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progenitor_data::{MoleculeClass, MoleculeParams};

    fn sample_metrics() -> MetricsData {
        MetricsData {
            molecule_count: 3,
            reaction_count: 1,
            initial_dry_mass_fg: 250.0,
            doubling_time_s: 3600.0,
            x: 1.0,
            total_synthesis_rate_per_s: 0.5,
        }
    }

    fn sample_sim_data() -> SimData {
        SimData {
            x: 1.0,
            condition: "basal".to_string(),
            doubling_time_s: 3600.0,
            time_step_s: 1.0,
            molecules: vec![MoleculeParams {
                id: "ATP".to_string(),
                class: MoleculeClass::Metabolite,
                mass_fg: 0.001,
                initial_count: 1000,
                degradation_rate_per_s: 0.0,
                synthesis_rate_per_s: 0.0,
                precursor: None,
                precursor_cost: 0,
            }],
            reactions: vec![],
            bindings: vec![],
            media: vec![],
            fit_options: Default::default(),
            completed_stages: vec!["expression".to_string()],
            applied_variants: vec![],
        }
    }

    #[test]
    fn test_roundtrip_preserves_value() {
        let data = sample_sim_data();
        let bytes = encode(&data, &DepthBudget::default()).unwrap();
        let restored: SimData = decode(&bytes).unwrap();
        assert_eq!(data, restored);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let data = sample_sim_data();
        let a = encode(&data, &DepthBudget::default()).unwrap();
        let b = encode(&data.clone(), &DepthBudget::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let bytes = encode(&sample_metrics(), &DepthBudget::default()).unwrap();
        let err = decode::<SimData>(&bytes).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_flipped_payload_byte_is_corrupt() {
        let mut bytes = encode(&sample_metrics(), &DepthBudget::default()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = decode::<MetricsData>(&bytes).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_truncated_header_is_corrupt() {
        let err = decode::<MetricsData>(b"PGNA\x01").unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_header_reports_kind() {
        let bytes = encode(&sample_metrics(), &DepthBudget::default()).unwrap();
        let header = read_header(&bytes).unwrap();
        assert_eq!(header.kind, "metrics_data");
        assert_eq!(header.schema_version, 1);
    }

    #[test]
    fn test_depth_budget_raises_once() {
        let mut budget = DepthBudget::new(10);
        assert!(budget.check(11).is_err());
        assert!(budget.raise());
        assert_eq!(budget.limit(), DepthBudget::RAISED_LIMIT);
        assert!(budget.check(11).is_ok());
        assert!(!budget.raise());
    }

    #[test]
    fn test_sim_data_depth_grows_with_provenance() {
        let mut data = sample_sim_data();
        let before = data.nesting_depth();
        data.completed_stages.push("mass".to_string());
        assert_eq!(data.nesting_depth(), before + 1);
    }
}
