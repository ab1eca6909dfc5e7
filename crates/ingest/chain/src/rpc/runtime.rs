//! Runtime metadata driven decoding of `System::Events` and the timestamp inherent.
//!
//! Event records are decoded into dynamic [`Value`]s against the type registry shipped in the
//! runtime metadata, then the handful of events the engine consumes are mapped into
//! [`BlockEvent`]s by pallet and event name. Fields are looked up by name, falling back to
//! their declaration position.

use crate::{BlockEvent, SourceError, SourceResult};
use alloy_primitives::{B256, Bytes};
use frame_metadata::{RuntimeMetadata, RuntimeMetadataPrefixed, v14, v15};
use parity_scale_codec::{Compact, Decode, DecodeAll};
use scale_info::{PortableRegistry, TypeDef};
use scale_value::{Composite, Primitive, Value, ValueDef};

/// The pallet, storage entry and call names the decoder resolves from metadata.
const SYSTEM_PALLET: &str = "System";
const EVENTS_ENTRY: &str = "Events";
const TIMESTAMP_PALLET: &str = "Timestamp";
const TIMESTAMP_SET_CALL: &str = "set";

/// Extrinsic version bits that mark a signed or general (non-inherent) extrinsic.
const NON_BARE_EXTRINSIC_BITS: u8 = 0b1100_0000;

/// The parts of one pallet's metadata the decoder needs.
#[derive(Debug)]
struct PalletInfo {
    name: String,
    index: u8,
    calls_ty: Option<u32>,
    events_entry_ty: Option<u32>,
}

macro_rules! pallet_infos {
    ($pallets:expr, $version:ident) => {
        $pallets
            .into_iter()
            .map(|pallet| {
                let events_entry_ty = pallet.storage.as_ref().and_then(|storage| {
                    storage.entries.iter().find(|entry| entry.name == EVENTS_ENTRY).and_then(
                        |entry| match &entry.ty {
                            $version::StorageEntryType::Plain(ty) => Some(ty.id),
                            _ => None,
                        },
                    )
                });
                PalletInfo {
                    calls_ty: pallet.calls.as_ref().map(|calls| calls.ty.id),
                    events_entry_ty,
                    index: pallet.index,
                    name: pallet.name,
                }
            })
            .collect::<Vec<_>>()
    };
}

/// Decodes the events and timestamp inherent of blocks built by one runtime version.
#[derive(Debug, Clone)]
pub struct RuntimeDecoder {
    types: PortableRegistry,
    events_ty: u32,
    timestamp_set: Option<(u8, u8)>,
}

impl RuntimeDecoder {
    /// Creates a decoder over `types`, where `events_ty` is the type of the `System::Events`
    /// storage value and `timestamp_set` the `(pallet, call)` index of `Timestamp::set`.
    pub const fn new(types: PortableRegistry, events_ty: u32, timestamp_set: Option<(u8, u8)>) -> Self {
        Self { types, events_ty, timestamp_set }
    }

    /// Builds a decoder from SCALE-encoded runtime metadata as returned by `state_getMetadata`.
    ///
    /// Metadata versions 14 and 15 are supported.
    pub fn from_metadata(raw: &[u8]) -> SourceResult<Self> {
        let prefixed = RuntimeMetadataPrefixed::decode(&mut &raw[..])
            .map_err(|e| SourceError::decode("runtime metadata", e))?;

        let (types, pallets) = match prefixed.1 {
            RuntimeMetadata::V14(metadata) => {
                (metadata.types, pallet_infos!(metadata.pallets, v14))
            }
            RuntimeMetadata::V15(metadata) => {
                (metadata.types, pallet_infos!(metadata.pallets, v15))
            }
            other => {
                return Err(SourceError::decode(
                    "runtime metadata",
                    format!("unsupported metadata version {}", other.version()),
                ));
            }
        };

        let events_ty = pallets
            .iter()
            .find(|pallet| pallet.name == SYSTEM_PALLET)
            .and_then(|pallet| pallet.events_entry_ty)
            .ok_or_else(|| SourceError::decode("runtime metadata", "no System::Events entry"))?;

        let timestamp_set = pallets
            .iter()
            .find(|pallet| pallet.name == TIMESTAMP_PALLET)
            .and_then(|pallet| {
                let call = call_index(&types, pallet.calls_ty?, TIMESTAMP_SET_CALL)?;
                Some((pallet.index, call))
            });

        Ok(Self::new(types, events_ty, timestamp_set))
    }

    /// Decodes the raw `System::Events` storage value of a block.
    pub fn decode_events(&self, raw: &[u8]) -> SourceResult<Vec<BlockEvent>> {
        let mut input = raw;
        let records = scale_value::scale::decode_as_type(&mut input, self.events_ty, &self.types)
            .map_err(|e| SourceError::decode("system events", e))?;
        if !input.is_empty() {
            return Err(SourceError::decode(
                "system events",
                format!("{} trailing bytes", input.len()),
            ));
        }

        let ValueDef::Composite(records) = &records.value else {
            return Err(SourceError::decode("system events", "events are not a sequence"));
        };
        values(records).into_iter().map(block_event).collect()
    }

    /// The moment set by the first `Timestamp::set` inherent among `extrinsics`.
    pub fn inherent_timestamp(&self, extrinsics: &[Bytes]) -> Option<u64> {
        let (pallet, call) = self.timestamp_set?;
        extrinsics.iter().find_map(|extrinsic| timestamp_set_moment(extrinsic, pallet, call))
    }
}

/// The index of the call named `name` in the call enum `calls_ty`.
fn call_index(types: &PortableRegistry, calls_ty: u32, name: &str) -> Option<u8> {
    match &types.resolve(calls_ty)?.type_def {
        TypeDef::Variant(calls) => {
            calls.variants.iter().find(|variant| variant.name == name).map(|variant| variant.index)
        }
        _ => None,
    }
}

/// Decodes the moment of a bare `Timestamp::set` extrinsic, `None` for any other extrinsic.
fn timestamp_set_moment(extrinsic: &[u8], pallet: u8, call: u8) -> Option<u64> {
    let body = Vec::<u8>::decode_all(&mut &extrinsic[..]).ok()?;
    let (version, rest) = body.split_first()?;
    if version & NON_BARE_EXTRINSIC_BITS != 0 {
        return None;
    }
    let [pallet_index, call_index, args @ ..] = rest else {
        return None;
    };
    if (*pallet_index, *call_index) != (pallet, call) {
        return None;
    }
    Compact::<u64>::decode_all(&mut &args[..]).ok().map(|moment| moment.0)
}

/// Maps one `EventRecord { phase, event, topics }` into a [`BlockEvent`].
fn block_event<T>(record: &Value<T>) -> SourceResult<BlockEvent> {
    let event = match &record.value {
        ValueDef::Composite(fields) => field(fields, "event", 1),
        _ => None,
    };
    let Some(Value { value: ValueDef::Variant(pallet), .. }) = event else {
        return Err(SourceError::decode("event record", "missing pallet event"));
    };
    let Some(Value { value: ValueDef::Variant(event), .. }) = field(&pallet.values, "", 0) else {
        return Err(SourceError::decode("event record", format!("malformed {} event", pallet.name)));
    };

    let decoded = match (pallet.name.as_str(), event.name.as_str()) {
        ("Subspace", "SegmentHeaderStored") => segment_header_stored(&event.values),
        ("Domains", "BundleStored") => bundle_stored(&event.values),
        ("Domains", "DomainEpochCompleted") => domain_epoch_completed(&event.values),
        ("Domains", "OperatorOffline") => operator_offline(&event.values),
        (pallet, name) => {
            return Ok(BlockEvent::Other { pallet: pallet.to_string(), name: name.to_string() });
        }
    };
    decoded.ok_or_else(|| {
        SourceError::decode("event record", format!("unexpected {}::{} fields", pallet.name, event.name))
    })
}

fn segment_header_stored<T>(fields: &Composite<T>) -> Option<BlockEvent> {
    let header = field(fields, "segment_header", 0)?;
    // Segment headers are versioned enums; the index is the first field of every version.
    let versioned = match &header.value {
        ValueDef::Variant(version) => &version.values,
        ValueDef::Composite(fields) => fields,
        _ => return None,
    };
    let segment_index = uint(field(versioned, "segment_index", 0)?)?;
    Some(BlockEvent::SegmentHeaderStored { segment_index: u64::try_from(segment_index).ok()? })
}

fn bundle_stored<T>(fields: &Composite<T>) -> Option<BlockEvent> {
    Some(BlockEvent::BundleStored {
        domain_id: u32_field(fields, "domain_id", 0)?,
        bundle_hash: hash(field(fields, "bundle_hash", 1)?)?,
    })
}

fn domain_epoch_completed<T>(fields: &Composite<T>) -> Option<BlockEvent> {
    Some(BlockEvent::DomainEpochCompleted {
        domain_id: u32_field(fields, "domain_id", 0)?,
        epoch_index: u32_field(fields, "completed_epoch_index", 1)?,
    })
}

fn operator_offline<T>(fields: &Composite<T>) -> Option<BlockEvent> {
    let ValueDef::Composite(expectations) = &field(fields, "expectations", 3)?.value else {
        return None;
    };
    Some(BlockEvent::OperatorOffline {
        operator_id: u64::try_from(uint(field(fields, "operator_id", 0)?)?).ok()?,
        domain_id: u32_field(fields, "domain_id", 1)?,
        submitted_bundles: u32_field(fields, "submitted_bundles", 2)?,
        expected_bundles: u32_field(expectations, "expected_bundles", 0)?,
        min_required_bundles: u32_field(expectations, "min_required_bundles", 1)?,
    })
}

fn values<T>(composite: &Composite<T>) -> Vec<&Value<T>> {
    match composite {
        Composite::Named(fields) => fields.iter().map(|(_, value)| value).collect(),
        Composite::Unnamed(fields) => fields.iter().collect(),
    }
}

/// The field called `name`, or the one at `position` when the composite is unnamed or has no
/// field of that name.
fn field<'a, T>(composite: &'a Composite<T>, name: &str, position: usize) -> Option<&'a Value<T>> {
    if let Composite::Named(fields) = composite {
        if let Some((_, value)) = fields.iter().find(|(field, _)| field == name) {
            return Some(value);
        }
    }
    values(composite).get(position).copied()
}

fn u32_field<T>(composite: &Composite<T>, name: &str, position: usize) -> Option<u32> {
    u32::try_from(uint(field(composite, name, position)?)?).ok()
}

/// An unsigned integer, unwrapping single field newtypes such as `DomainId(u32)`.
fn uint<T>(value: &Value<T>) -> Option<u128> {
    match &value.value {
        ValueDef::Primitive(Primitive::U128(n)) => Some(*n),
        ValueDef::Composite(inner) => match values(inner).as_slice() {
            [only] => uint(only),
            _ => None,
        },
        _ => None,
    }
}

/// A 32 byte hash, unwrapping single field newtypes such as `H256([u8; 32])`.
fn hash<T>(value: &Value<T>) -> Option<B256> {
    match &value.value {
        ValueDef::Primitive(Primitive::U256(bytes)) => Some(B256::from(*bytes)),
        ValueDef::Composite(inner) => match values(inner).as_slice() {
            [only] => hash(only),
            bytes if bytes.len() == 32 => {
                let bytes = bytes
                    .iter()
                    .map(|byte| u8::try_from(uint(byte)?).ok())
                    .collect::<Option<Vec<u8>>>()?;
                Some(B256::from_slice(&bytes))
            }
            _ => None,
        },
        _ => None,
    }
}
