//! The property codec boundary.
//!
//! [`PropertyCodec`] turns an object's property bag into an opaque blob
//! and back. Reference interception happens here: live `Object` /
//! `Asset` / `Class` / `Name` values cross the boundary as a GUID, an
//! asset-table index, a class-table index, or a name-table index,
//! resolved through the [`ReferenceSink`] (save) and [`ReferenceSource`]
//! (load) traits. This substitution is what breaks pointer graphs into an
//! addressable document.
//!
//! Blob-internal corruption surfaces as [`StructuralError`]; callers
//! downgrade it to a per-record warning so one bad blob never aborts a
//! whole load. Unresolvable references decode as `Null` — the source
//! implementation counts them.

use std::collections::BTreeSet;
use std::io::Write;

use amaranth_scene::{AssetId, ClassId, Guid, ObjectId, PropertyBag, PropertyValue, Scene};

use crate::error::{SaveError, StructuralError};
use crate::tables::NONE_INDEX;
use crate::wire::{self, WireReader};

/// Save-side reference resolution: live handles to wire form.
pub trait ReferenceSink {
    /// Live object → document GUID. Nil when the object is not part of
    /// the serialized unit.
    fn object_to_guid(&mut self, id: ObjectId) -> Guid;
    fn asset_to_index(&mut self, id: AssetId) -> i32;
    fn class_to_index(&mut self, id: ClassId) -> i32;
    fn name_to_index(&mut self, name: &str) -> i32;
}

/// Load-side reference resolution: wire form to live handles.
///
/// Implementations count their own resolution failures; the codec
/// substitutes `Null` and moves on.
pub trait ReferenceSource {
    fn guid_to_object(&mut self, guid: Guid) -> Option<ObjectId>;
    fn index_to_asset(&mut self, index: i32) -> Option<AssetId>;
    fn index_to_class(&mut self, index: i32) -> Option<ClassId>;
    fn index_to_name(&mut self, index: i32) -> Option<String>;
}

/// Encodes and decodes property blobs.
pub trait PropertyCodec {
    /// Encode `object`'s properties. With `subset`, only the named
    /// properties are encoded (used for override snapshots).
    fn encode(
        &self,
        scene: &Scene,
        object: ObjectId,
        subset: Option<&BTreeSet<String>>,
        refs: &mut dyn ReferenceSink,
    ) -> Result<Vec<u8>, SaveError>;

    /// Decode a blob into a property bag, resolving references through
    /// `refs`. The caller decides how to apply the bag.
    fn decode(
        &self,
        bytes: &[u8],
        refs: &mut dyn ReferenceSource,
    ) -> Result<PropertyBag, StructuralError>;
}

// ---------------------------------------------------------------------------
// Binary codec
// ---------------------------------------------------------------------------

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_I64: u8 = 2;
const TAG_U64: u8 = 3;
const TAG_F32: u8 = 4;
const TAG_F64: u8 = 5;
const TAG_STRING: u8 = 6;
const TAG_BYTES: u8 = 7;
const TAG_LIST: u8 = 8;
const TAG_MAP: u8 = 9;
const TAG_OBJECT: u8 = 10;
const TAG_ASSET: u8 = 11;
const TAG_CLASS: u8 = 12;
const TAG_NAME: u8 = 13;

/// The default little-endian binary property codec.
///
/// Blob layout: `i32` entry count, then per entry a name-table index and
/// a tagged value. Property names are interned; string *values* are
/// inline data.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryPropertyCodec;

fn encode_value<W: Write>(
    w: &mut W,
    value: &PropertyValue,
    refs: &mut dyn ReferenceSink,
) -> std::io::Result<()> {
    match value {
        PropertyValue::Null => wire::write_u8(w, TAG_NULL),
        PropertyValue::Bool(v) => {
            wire::write_u8(w, TAG_BOOL)?;
            wire::write_u8(w, u8::from(*v))
        }
        PropertyValue::I64(v) => {
            wire::write_u8(w, TAG_I64)?;
            wire::write_i64(w, *v)
        }
        PropertyValue::U64(v) => {
            wire::write_u8(w, TAG_U64)?;
            wire::write_u64(w, *v)
        }
        PropertyValue::F32(v) => {
            wire::write_u8(w, TAG_F32)?;
            wire::write_f32(w, *v)
        }
        PropertyValue::F64(v) => {
            wire::write_u8(w, TAG_F64)?;
            wire::write_f64(w, *v)
        }
        PropertyValue::String(v) => {
            wire::write_u8(w, TAG_STRING)?;
            wire::write_string(w, v)
        }
        PropertyValue::Bytes(v) => {
            wire::write_u8(w, TAG_BYTES)?;
            wire::write_bytes(w, v)
        }
        PropertyValue::List(items) => {
            wire::write_u8(w, TAG_LIST)?;
            wire::write_len(w, items.len())?;
            for item in items {
                encode_value(w, item, refs)?;
            }
            Ok(())
        }
        PropertyValue::Map(entries) => {
            wire::write_u8(w, TAG_MAP)?;
            wire::write_len(w, entries.len())?;
            for (key, item) in entries {
                wire::write_string(w, key)?;
                encode_value(w, item, refs)?;
            }
            Ok(())
        }
        PropertyValue::Object(id) => {
            wire::write_u8(w, TAG_OBJECT)?;
            wire::write_guid(w, refs.object_to_guid(*id))
        }
        PropertyValue::Asset(id) => {
            wire::write_u8(w, TAG_ASSET)?;
            wire::write_i32(w, refs.asset_to_index(*id))
        }
        PropertyValue::Class(id) => {
            wire::write_u8(w, TAG_CLASS)?;
            wire::write_i32(w, refs.class_to_index(*id))
        }
        PropertyValue::Name(name) => {
            wire::write_u8(w, TAG_NAME)?;
            wire::write_i32(w, refs.name_to_index(name))
        }
    }
}

fn decode_value(
    r: &mut WireReader<'_>,
    refs: &mut dyn ReferenceSource,
) -> Result<PropertyValue, StructuralError> {
    let offset = r.offset();
    let tag = r.read_u8()?;
    match tag {
        TAG_NULL => Ok(PropertyValue::Null),
        TAG_BOOL => Ok(PropertyValue::Bool(r.read_u8()? != 0)),
        TAG_I64 => Ok(PropertyValue::I64(r.read_i64()?)),
        TAG_U64 => Ok(PropertyValue::U64(r.read_u64()?)),
        TAG_F32 => Ok(PropertyValue::F32(r.read_f32()?)),
        TAG_F64 => Ok(PropertyValue::F64(r.read_f64()?)),
        TAG_STRING => Ok(PropertyValue::String(r.read_string()?)),
        TAG_BYTES => Ok(PropertyValue::Bytes(r.read_byte_buf()?)),
        TAG_LIST => {
            let len = r.read_len(1)?;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(decode_value(r, refs)?);
            }
            Ok(PropertyValue::List(items))
        }
        TAG_MAP => {
            let len = r.read_len(1)?;
            let mut entries = Vec::with_capacity(len);
            for _ in 0..len {
                let key = r.read_string()?;
                let value = decode_value(r, refs)?;
                entries.push((key, value));
            }
            Ok(PropertyValue::Map(entries))
        }
        TAG_OBJECT => {
            let guid = r.read_guid()?;
            if guid.is_nil() {
                return Ok(PropertyValue::Null);
            }
            Ok(match refs.guid_to_object(guid) {
                Some(id) => PropertyValue::Object(id),
                None => PropertyValue::Null,
            })
        }
        TAG_ASSET => {
            let index = r.read_i32()?;
            if index == NONE_INDEX {
                return Ok(PropertyValue::Null);
            }
            Ok(match refs.index_to_asset(index) {
                Some(id) => PropertyValue::Asset(id),
                None => PropertyValue::Null,
            })
        }
        TAG_CLASS => {
            let index = r.read_i32()?;
            if index == NONE_INDEX {
                return Ok(PropertyValue::Null);
            }
            Ok(match refs.index_to_class(index) {
                Some(id) => PropertyValue::Class(id),
                None => PropertyValue::Null,
            })
        }
        TAG_NAME => {
            let index = r.read_i32()?;
            if index == NONE_INDEX {
                return Ok(PropertyValue::Null);
            }
            Ok(match refs.index_to_name(index) {
                Some(name) => PropertyValue::Name(name),
                None => PropertyValue::Null,
            })
        }
        tag => Err(StructuralError::UnknownTag { offset, tag }),
    }
}

impl PropertyCodec for BinaryPropertyCodec {
    fn encode(
        &self,
        scene: &Scene,
        object: ObjectId,
        subset: Option<&BTreeSet<String>>,
        refs: &mut dyn ReferenceSink,
    ) -> Result<Vec<u8>, SaveError> {
        let Some(obj) = scene.get(object) else {
            return Err(SaveError::DeadObject(object));
        };
        let entries: Vec<(&str, &PropertyValue)> = obj
            .properties()
            .iter()
            .filter(|(name, _)| subset.map_or(true, |s| s.contains(*name)))
            .collect();

        let mut buf = Vec::new();
        wire::write_len(&mut buf, entries.len())?;
        for (name, value) in entries {
            wire::write_i32(&mut buf, refs.name_to_index(name))?;
            encode_value(&mut buf, value, refs)?;
        }
        Ok(buf)
    }

    fn decode(
        &self,
        bytes: &[u8],
        refs: &mut dyn ReferenceSource,
    ) -> Result<PropertyBag, StructuralError> {
        let mut r = WireReader::new(bytes);
        let count = r.read_len(5)?;
        let mut bag = PropertyBag::new();
        for _ in 0..count {
            let name_index = r.read_i32()?;
            let value = decode_value(&mut r, refs)?;
            match refs.index_to_name(name_index) {
                Some(name) => bag.set(&name, value),
                None => {
                    log::warn!("dropping property with unresolvable name index {name_index}");
                }
            }
        }
        Ok(bag)
    }
}
