//! The transient prefab document and its binary layout.
//!
//! A [`PrefabDocument`] is built and discarded at save time, parsed and
//! discarded at load time. Wire layout, in order: header (magic +
//! writer-version triple) → reference tables → object table → component
//! table → root actor node tree, so a reader can build its lookup arrays
//! before any record needs them.
//!
//! All arrays are `i32`-count prefixed; all integers little-endian;
//! GUIDs are 16 raw bytes. The nil GUID and index `-1` are the null
//! sentinels.

use std::io::Write;

use serde::{Deserialize, Serialize};

use amaranth_scene::Guid;

use crate::error::StructuralError;
use crate::tables::ReferenceTables;
use crate::wire::{self, WireReader};

/// Document magic, the first four bytes of every prefab asset.
pub const PREFAB_MAGIC: [u8; 4] = *b"APFB";

/// Writer format version triple carried in the header. Readers reject
/// unknown majors; minor/patch gate property-blob decoding details.
pub const FORMAT_VERSION: (u16, u16, u16) = (1, 0, 0);

/// A serialized plain owned object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub guid: Guid,
    pub class_index: i32,
    pub flags: u32,
    /// Owner GUID; may forward-reference a record appearing later.
    pub outer_guid: Guid,
    /// Opaque bytes from the property codec.
    pub property_blob: Vec<u8>,
    /// Constructor-created sub-objects of this object, matched by name at
    /// load. Parallel to `default_subobject_names`.
    pub default_subobject_guids: Vec<Guid>,
    pub default_subobject_names: Vec<i32>,
}

/// A serialized component. Scene parenting (`scene_parent_guid`) is
/// distinct from ownership (`outer_guid`) and may point outside the
/// owner's actor subtree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub guid: Guid,
    pub class_index: i32,
    pub flags: u32,
    pub outer_guid: Guid,
    /// Name index; used to match constructor-created components.
    pub component_name: i32,
    /// Nil means the component has no scene parent.
    pub scene_parent_guid: Guid,
    pub property_blob: Vec<u8>,
    pub default_subobject_guids: Vec<Guid>,
    pub default_subobject_names: Vec<i32>,
}

/// A per-instance property override on a sub-prefab, re-applied after the
/// nested prefab's own load. The blob holds the authoritative value, not
/// a diff. `object_guid` is expressed in post-remap, instance-local terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub object_guid: Guid,
    pub property_names: Vec<i32>,
    pub property_blob: Vec<u8>,
}

/// One node of the actor tree: either a reference to a nested prefab
/// asset or a concrete serialized actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActorNode {
    Prefab {
        asset_index: i32,
        /// The nested root actor's GUID in parent-document terms.
        root_guid: Guid,
        overrides: Vec<OverrideRecord>,
        /// Bijection from the nested asset's internal GUIDs to GUIDs
        /// unique within this document, sorted by key. Keeps sibling
        /// instances of one asset disjoint.
        guid_remap: Vec<(Guid, Guid)>,
    },
    Concrete {
        guid: Guid,
        class_index: i32,
        flags: u32,
        property_blob: Vec<u8>,
        root_component_guid: Guid,
        default_subobject_guids: Vec<Guid>,
        default_subobject_names: Vec<i32>,
        children: Vec<ActorNode>,
    },
}

/// A complete serialized prefab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefabDocument {
    pub version: (u16, u16, u16),
    pub tables: ReferenceTables,
    pub objects: Vec<ObjectRecord>,
    pub components: Vec<ComponentRecord>,
    pub root: ActorNode,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn write_string_table<W: Write>(w: &mut W, table: &[String]) -> std::io::Result<()> {
    wire::write_len(w, table.len())?;
    for entry in table {
        wire::write_string(w, entry)?;
    }
    Ok(())
}

fn write_guid_array<W: Write>(w: &mut W, guids: &[Guid]) -> std::io::Result<()> {
    wire::write_len(w, guids.len())?;
    for &guid in guids {
        wire::write_guid(w, guid)?;
    }
    Ok(())
}

fn write_index_array<W: Write>(w: &mut W, indices: &[i32]) -> std::io::Result<()> {
    wire::write_len(w, indices.len())?;
    for &index in indices {
        wire::write_i32(w, index)?;
    }
    Ok(())
}

fn write_object_record<W: Write>(w: &mut W, rec: &ObjectRecord) -> std::io::Result<()> {
    wire::write_guid(w, rec.guid)?;
    wire::write_i32(w, rec.class_index)?;
    wire::write_u32(w, rec.flags)?;
    wire::write_guid(w, rec.outer_guid)?;
    wire::write_bytes(w, &rec.property_blob)?;
    write_guid_array(w, &rec.default_subobject_guids)?;
    write_index_array(w, &rec.default_subobject_names)
}

fn write_component_record<W: Write>(w: &mut W, rec: &ComponentRecord) -> std::io::Result<()> {
    wire::write_guid(w, rec.guid)?;
    wire::write_i32(w, rec.class_index)?;
    wire::write_u32(w, rec.flags)?;
    wire::write_guid(w, rec.outer_guid)?;
    wire::write_i32(w, rec.component_name)?;
    wire::write_guid(w, rec.scene_parent_guid)?;
    wire::write_bytes(w, &rec.property_blob)?;
    write_guid_array(w, &rec.default_subobject_guids)?;
    write_index_array(w, &rec.default_subobject_names)
}

fn write_override_record<W: Write>(w: &mut W, rec: &OverrideRecord) -> std::io::Result<()> {
    wire::write_guid(w, rec.object_guid)?;
    write_index_array(w, &rec.property_names)?;
    wire::write_bytes(w, &rec.property_blob)
}

fn write_actor_node<W: Write>(w: &mut W, node: &ActorNode) -> std::io::Result<()> {
    match node {
        ActorNode::Prefab {
            asset_index,
            root_guid,
            overrides,
            guid_remap,
        } => {
            wire::write_u8(w, 1)?;
            wire::write_i32(w, *asset_index)?;
            wire::write_guid(w, *root_guid)?;
            wire::write_len(w, overrides.len())?;
            for rec in overrides {
                write_override_record(w, rec)?;
            }
            wire::write_len(w, guid_remap.len())?;
            for &(from, to) in guid_remap {
                wire::write_guid(w, from)?;
                wire::write_guid(w, to)?;
            }
            Ok(())
        }
        ActorNode::Concrete {
            guid,
            class_index,
            flags,
            property_blob,
            root_component_guid,
            default_subobject_guids,
            default_subobject_names,
            children,
        } => {
            wire::write_u8(w, 0)?;
            wire::write_guid(w, *guid)?;
            wire::write_i32(w, *class_index)?;
            wire::write_u32(w, *flags)?;
            wire::write_bytes(w, property_blob)?;
            wire::write_guid(w, *root_component_guid)?;
            write_guid_array(w, default_subobject_guids)?;
            write_index_array(w, default_subobject_names)?;
            wire::write_len(w, children.len())?;
            for child in children {
                write_actor_node(w, child)?;
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn read_string_table(r: &mut WireReader<'_>) -> Result<Vec<String>, StructuralError> {
    let len = r.read_len(4)?;
    let mut table = Vec::with_capacity(len);
    for _ in 0..len {
        table.push(r.read_string()?);
    }
    Ok(table)
}

fn read_guid_array(r: &mut WireReader<'_>) -> Result<Vec<Guid>, StructuralError> {
    let len = r.read_len(16)?;
    let mut guids = Vec::with_capacity(len);
    for _ in 0..len {
        guids.push(r.read_guid()?);
    }
    Ok(guids)
}

fn read_index_array(r: &mut WireReader<'_>) -> Result<Vec<i32>, StructuralError> {
    let len = r.read_len(4)?;
    let mut indices = Vec::with_capacity(len);
    for _ in 0..len {
        indices.push(r.read_i32()?);
    }
    Ok(indices)
}

fn read_object_record(r: &mut WireReader<'_>) -> Result<ObjectRecord, StructuralError> {
    Ok(ObjectRecord {
        guid: r.read_guid()?,
        class_index: r.read_i32()?,
        flags: r.read_u32()?,
        outer_guid: r.read_guid()?,
        property_blob: r.read_byte_buf()?,
        default_subobject_guids: read_guid_array(r)?,
        default_subobject_names: read_index_array(r)?,
    })
}

fn read_component_record(r: &mut WireReader<'_>) -> Result<ComponentRecord, StructuralError> {
    Ok(ComponentRecord {
        guid: r.read_guid()?,
        class_index: r.read_i32()?,
        flags: r.read_u32()?,
        outer_guid: r.read_guid()?,
        component_name: r.read_i32()?,
        scene_parent_guid: r.read_guid()?,
        property_blob: r.read_byte_buf()?,
        default_subobject_guids: read_guid_array(r)?,
        default_subobject_names: read_index_array(r)?,
    })
}

fn read_override_record(r: &mut WireReader<'_>) -> Result<OverrideRecord, StructuralError> {
    Ok(OverrideRecord {
        object_guid: r.read_guid()?,
        property_names: read_index_array(r)?,
        property_blob: r.read_byte_buf()?,
    })
}

fn read_actor_node(r: &mut WireReader<'_>) -> Result<ActorNode, StructuralError> {
    let offset = r.offset();
    let is_prefab = r.read_u8()?;
    match is_prefab {
        1 => {
            let asset_index = r.read_i32()?;
            let root_guid = r.read_guid()?;
            let override_count = r.read_len(16)?;
            let mut overrides = Vec::with_capacity(override_count);
            for _ in 0..override_count {
                overrides.push(read_override_record(r)?);
            }
            let remap_count = r.read_len(32)?;
            let mut guid_remap = Vec::with_capacity(remap_count);
            for _ in 0..remap_count {
                let from = r.read_guid()?;
                let to = r.read_guid()?;
                guid_remap.push((from, to));
            }
            Ok(ActorNode::Prefab {
                asset_index,
                root_guid,
                overrides,
                guid_remap,
            })
        }
        0 => {
            let guid = r.read_guid()?;
            let class_index = r.read_i32()?;
            let flags = r.read_u32()?;
            let property_blob = r.read_byte_buf()?;
            let root_component_guid = r.read_guid()?;
            let default_subobject_guids = read_guid_array(r)?;
            let default_subobject_names = read_index_array(r)?;
            let child_count = r.read_len(1)?;
            let mut children = Vec::with_capacity(child_count);
            for _ in 0..child_count {
                children.push(read_actor_node(r)?);
            }
            Ok(ActorNode::Concrete {
                guid,
                class_index,
                flags,
                property_blob,
                root_component_guid,
                default_subobject_guids,
                default_subobject_names,
                children,
            })
        }
        tag => Err(StructuralError::UnknownTag { offset, tag }),
    }
}

impl PrefabDocument {
    /// Flush the document to bytes: tables first, then the record tables,
    /// then the actor tree.
    pub fn to_bytes(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut buf = Vec::new();
        let w = &mut buf;
        w.write_all(&PREFAB_MAGIC)?;
        wire::write_u16(w, self.version.0)?;
        wire::write_u16(w, self.version.1)?;
        wire::write_u16(w, self.version.2)?;

        write_string_table(w, self.tables.assets())?;
        write_string_table(w, self.tables.classes())?;
        write_string_table(w, self.tables.names())?;

        wire::write_len(w, self.objects.len())?;
        for rec in &self.objects {
            write_object_record(w, rec)?;
        }
        wire::write_len(w, self.components.len())?;
        for rec in &self.components {
            write_component_record(w, rec)?;
        }
        write_actor_node(w, &self.root)?;
        Ok(buf)
    }

    /// Parse a document from bytes, validating magic, version, and every
    /// length prefix. Trailing bytes are a structural error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StructuralError> {
        let mut r = WireReader::new(bytes);

        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != PREFAB_MAGIC {
            return Err(StructuralError::BadMagic { found: magic });
        }
        let version = (r.read_u16()?, r.read_u16()?, r.read_u16()?);
        if version.0 != FORMAT_VERSION.0 {
            return Err(StructuralError::UnsupportedVersion {
                major: version.0,
                minor: version.1,
                patch: version.2,
            });
        }

        let assets = read_string_table(&mut r)?;
        let classes = read_string_table(&mut r)?;
        let names = read_string_table(&mut r)?;
        let tables = ReferenceTables::from_parts(assets, classes, names);

        let object_count = r.read_len(16)?;
        let mut objects = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            objects.push(read_object_record(&mut r)?);
        }
        let component_count = r.read_len(16)?;
        let mut components = Vec::with_capacity(component_count);
        for _ in 0..component_count {
            components.push(read_component_record(&mut r)?);
        }
        let root = read_actor_node(&mut r)?;

        if r.remaining() != 0 {
            return Err(StructuralError::TrailingBytes {
                remaining: r.remaining(),
            });
        }
        Ok(Self {
            version,
            tables,
            objects,
            components,
            root,
        })
    }

    /// Render the document as RON text, for debugging and asset diffing.
    #[cfg(feature = "serialize-ron")]
    pub fn to_ron_string(&self) -> Result<String, crate::error::SaveError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| crate::error::SaveError::Format(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> PrefabDocument {
        let mut tables = ReferenceTables::new();
        let class = tables.find_or_add_class("Panel");
        let comp_class = tables.find_or_add_class("Body");
        let name = tables.find_or_add_name("Body");
        let asset = tables.find_or_add_asset("ui/child.prefab");

        let actor_guid = Guid::new();
        let comp_guid = Guid::new();
        let obj_guid = Guid::new();
        let sub_root = Guid::new();

        PrefabDocument {
            version: FORMAT_VERSION,
            tables,
            objects: vec![ObjectRecord {
                guid: obj_guid,
                class_index: class,
                flags: 0,
                outer_guid: actor_guid,
                property_blob: vec![1, 2, 3],
                default_subobject_guids: vec![],
                default_subobject_names: vec![],
            }],
            components: vec![ComponentRecord {
                guid: comp_guid,
                class_index: comp_class,
                flags: 4,
                outer_guid: actor_guid,
                component_name: name,
                scene_parent_guid: Guid::NIL,
                property_blob: vec![],
                default_subobject_guids: vec![],
                default_subobject_names: vec![],
            }],
            root: ActorNode::Concrete {
                guid: actor_guid,
                class_index: class,
                flags: 0,
                property_blob: vec![9],
                root_component_guid: comp_guid,
                default_subobject_guids: vec![comp_guid],
                default_subobject_names: vec![name],
                children: vec![ActorNode::Prefab {
                    asset_index: asset,
                    root_guid: sub_root,
                    overrides: vec![OverrideRecord {
                        object_guid: sub_root,
                        property_names: vec![name],
                        property_blob: vec![7, 7],
                    }],
                    guid_remap: vec![(Guid::new(), sub_root)],
                }],
            },
        }
    }

    #[test]
    fn wire_round_trip() {
        let doc = sample_document();
        let bytes = doc.to_bytes().unwrap();
        let parsed = PrefabDocument::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.version, FORMAT_VERSION);
        assert_eq!(parsed.objects, doc.objects);
        assert_eq!(parsed.components, doc.components);
        assert_eq!(parsed.root, doc.root);
        assert_eq!(parsed.tables.classes(), doc.tables.classes());
    }

    #[test]
    fn bad_magic_rejected() {
        let doc = sample_document();
        let mut bytes = doc.to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            PrefabDocument::from_bytes(&bytes),
            Err(StructuralError::BadMagic { .. })
        ));
    }

    #[test]
    fn unknown_major_version_rejected() {
        let doc = sample_document();
        let mut bytes = doc.to_bytes().unwrap();
        bytes[4] = 0xFF;
        bytes[5] = 0xFF;
        assert!(matches!(
            PrefabDocument::from_bytes(&bytes),
            Err(StructuralError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn truncation_rejected_everywhere() {
        let doc = sample_document();
        let bytes = doc.to_bytes().unwrap();
        // Any proper prefix must fail structurally, never panic.
        for cut in 0..bytes.len() {
            assert!(
                PrefabDocument::from_bytes(&bytes[..cut]).is_err(),
                "prefix of {cut} bytes unexpectedly parsed"
            );
        }
    }

    #[test]
    fn trailing_bytes_rejected() {
        let doc = sample_document();
        let mut bytes = doc.to_bytes().unwrap();
        bytes.push(0);
        assert!(matches!(
            PrefabDocument::from_bytes(&bytes),
            Err(StructuralError::TrailingBytes { remaining: 1 })
        ));
    }
}
