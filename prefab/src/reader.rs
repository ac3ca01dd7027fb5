//! The prefab reader: bytes → [`PrefabDocument`] → live graph.
//!
//! Loading is a four-pass state machine:
//!
//! 1. **PreGenerate** — depth-first walk creating a bare object per
//!    record and building the GUID → object map. Sub-prefab nodes
//!    trigger a full nested load here (all of *its* passes), followed by
//!    GUID remapping and override application, so overrides land on an
//!    already-live nested graph before this document's own populate
//!    pass. Constructor-created default sub-objects are matched by name
//!    instead of re-created. Unresolvable classes degrade to logged
//!    stubs.
//! 2. **Populate** — decode every property blob, translating embedded
//!    GUID/asset/class indices into live handles through the now-complete
//!    map. Forward and cyclic references need no topological sorting.
//! 3. **Attach** — re-establish the actor tree, root components, then
//!    component scene parents, which may point outside their actor's
//!    subtree and therefore resolve only after every actor is attached.
//! 4. **Overrides** — sub-prefab only; runs inside pass 1 per reference
//!    node, innermost instance first, so an outer document's override of
//!    the same property wins.
//!
//! Only structural corruption aborts a load, and an aborted load rolls
//! back every object it created. Everything else degrades to warnings
//! tallied in the [`LoadSummary`].

use std::collections::{BTreeSet, HashMap, HashSet};

use amaranth_scene::{
    AssetId, AssetStore, ClassId, ClassKind, ClassRegistry, Guid, ObjectId, Scene,
};

use crate::codec::{PropertyCodec, ReferenceSource};
use crate::document::{ActorNode, ComponentRecord, ObjectRecord, OverrideRecord, PrefabDocument};
use crate::error::{LoadError, LoadSummary, StructuralError};
use crate::subprefab::{remap_guid_space, RemappedLoad, SubPrefabInstance, SubPrefabMap};
use crate::tables::ReferenceTables;

/// Sub-prefab nesting beyond this depth aborts structurally; it can only
/// mean a self-referential asset chain.
pub const MAX_SUB_PREFAB_DEPTH: usize = 64;

/// Explicit per-load state threaded through every recursive call, in
/// place of any global mid-load flag: independent loads cannot leak
/// state into one another.
#[derive(Debug, Clone)]
pub struct LoadContext {
    depth: usize,
    fresh_sub_prefab_guids: bool,
}

impl LoadContext {
    pub fn new() -> Self {
        Self {
            depth: 0,
            fresh_sub_prefab_guids: false,
        }
    }

    /// A context that mints fresh parent-space GUIDs for every nested
    /// instance, used by duplication so copies share nothing.
    pub fn fresh_guids() -> Self {
        Self {
            depth: 0,
            fresh_sub_prefab_guids: true,
        }
    }

    /// Context for a nested load. Fresh-GUID mode does not propagate:
    /// a nested document loads in its own transient GUID space, and the
    /// remap boundary is where duplication mints fresh identities.
    fn descend(&self) -> Result<Self, StructuralError> {
        if self.depth + 1 > MAX_SUB_PREFAB_DEPTH {
            return Err(StructuralError::RecursionOverflow {
                max: MAX_SUB_PREFAB_DEPTH,
            });
        }
        Ok(Self {
            depth: self.depth + 1,
            fresh_sub_prefab_guids: false,
        })
    }
}

impl Default for LoadContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The result a caller retains: the live root, both GUID maps, the
/// sub-prefab instances, and the degradation tally.
pub struct LoadedPrefab {
    pub root: ObjectId,
    pub guid_to_object: HashMap<Guid, ObjectId>,
    pub object_to_guid: HashMap<ObjectId, Guid>,
    pub sub_prefabs: SubPrefabMap,
    pub summary: LoadSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    Idle,
    PreGenerated,
    Populated,
    Attached,
}

struct LoadState<'d> {
    guid_to_object: HashMap<Guid, ObjectId>,
    /// Document GUID → final GUID, populated in fresh-GUID mode and by
    /// sub-prefab remapping. References written against the document's
    /// GUIDs resolve through this.
    guid_aliases: HashMap<Guid, Guid>,
    /// Fresh-GUID mode: every record of this document gets a newly
    /// minted GUID instead of the one it was saved with.
    fresh: bool,
    /// Everything created at this level, newest last, for rollback.
    created: Vec<ObjectId>,
    pending_actors: Vec<(ObjectId, &'d ActorNode)>,
    pending_actor_attach: Vec<(ObjectId, ObjectId)>,
    pending_components: Vec<(ObjectId, Guid)>,
    claimed_defaults: HashSet<ObjectId>,
    /// GUID → default-sub-object name, gathered from every record's
    /// parallel arrays before creation starts.
    default_names: HashMap<Guid, String>,
    sub_prefabs: SubPrefabMap,
    summary: LoadSummary,
    phase: LoadPhase,
}

impl<'d> LoadState<'d> {
    fn new(fresh: bool) -> Self {
        Self {
            guid_to_object: HashMap::new(),
            guid_aliases: HashMap::new(),
            fresh,
            created: Vec::new(),
            pending_actors: Vec::new(),
            pending_actor_attach: Vec::new(),
            pending_components: Vec::new(),
            claimed_defaults: HashSet::new(),
            default_names: HashMap::new(),
            sub_prefabs: SubPrefabMap::new(),
            summary: LoadSummary::default(),
            phase: LoadPhase::Idle,
        }
    }

    /// Insert the GUID → object mapping for a record, minting a fresh
    /// GUID (and recording the alias) in fresh-GUID mode.
    fn map_guid(&mut self, doc_guid: Guid, id: ObjectId) {
        if doc_guid.is_nil() {
            return;
        }
        if self.fresh {
            let minted = Guid::new();
            self.guid_aliases.insert(doc_guid, minted);
            self.guid_to_object.insert(minted, id);
        } else {
            self.guid_to_object.insert(doc_guid, id);
        }
    }

    /// Resolve a document GUID to a live object, following the alias
    /// table when the direct lookup misses.
    fn resolve_guid(&self, guid: Guid) -> Option<ObjectId> {
        self.guid_to_object.get(&guid).copied().or_else(|| {
            self.guid_aliases
                .get(&guid)
                .and_then(|g| self.guid_to_object.get(g))
                .copied()
        })
    }
}

/// Load-side reference resolution over the load-time GUID map and the
/// document's tables. Counts every failed resolution.
struct ReadResolver<'x> {
    guid_to_object: &'x HashMap<Guid, ObjectId>,
    guid_aliases: &'x HashMap<Guid, Guid>,
    tables: &'x ReferenceTables,
    assets: &'x AssetStore,
    registry: &'x ClassRegistry,
    unresolved: &'x mut usize,
}

impl ReferenceSource for ReadResolver<'_> {
    fn guid_to_object(&mut self, guid: Guid) -> Option<ObjectId> {
        let resolved = self.guid_to_object.get(&guid).copied().or_else(|| {
            self.guid_aliases
                .get(&guid)
                .and_then(|g| self.guid_to_object.get(g))
                .copied()
        });
        if resolved.is_none() {
            log::warn!("unresolved object GUID {guid}, decoding as null");
            *self.unresolved += 1;
        }
        resolved
    }

    fn index_to_asset(&mut self, index: i32) -> Option<AssetId> {
        let resolved = self
            .tables
            .asset_by_index(index)
            .and_then(|path| self.assets.find_by_path(path));
        if resolved.is_none() {
            log::warn!("unresolved asset index {index}, decoding as null");
            *self.unresolved += 1;
        }
        resolved
    }

    fn index_to_class(&mut self, index: i32) -> Option<ClassId> {
        let resolved = self
            .tables
            .class_by_index(index)
            .and_then(|name| self.registry.find_by_name(name));
        if resolved.is_none() {
            log::warn!("unresolved class index {index}, decoding as null");
            *self.unresolved += 1;
        }
        resolved
    }

    fn index_to_name(&mut self, index: i32) -> Option<String> {
        self.tables.name_by_index(index).map(str::to_owned)
    }
}

enum PendingRecord<'d> {
    Object(&'d ObjectRecord),
    Component(&'d ComponentRecord),
}

impl PendingRecord<'_> {
    fn guid(&self) -> Guid {
        match self {
            Self::Object(r) => r.guid,
            Self::Component(r) => r.guid,
        }
    }

    fn class_index(&self) -> i32 {
        match self {
            Self::Object(r) => r.class_index,
            Self::Component(r) => r.class_index,
        }
    }

    fn flags(&self) -> u32 {
        match self {
            Self::Object(r) => r.flags,
            Self::Component(r) => r.flags,
        }
    }

    fn outer_guid(&self) -> Guid {
        match self {
            Self::Object(r) => r.outer_guid,
            Self::Component(r) => r.outer_guid,
        }
    }

    fn expected_kind(&self) -> ClassKind {
        match self {
            Self::Object(_) => ClassKind::Object,
            Self::Component(_) => ClassKind::Component,
        }
    }
}

/// Deserializes prefab documents into a scene.
pub struct PrefabReader<'a> {
    scene: &'a mut Scene,
    assets: &'a AssetStore,
    codec: &'a dyn PropertyCodec,
}

impl<'a> PrefabReader<'a> {
    pub fn new(scene: &'a mut Scene, assets: &'a AssetStore, codec: &'a dyn PropertyCodec) -> Self {
        Self {
            scene,
            assets,
            codec,
        }
    }

    /// Parse and load a document from bytes, attaching the root under
    /// `parent` (a live actor) when given.
    pub fn load_bytes(
        &mut self,
        bytes: &[u8],
        parent: Option<ObjectId>,
        ctx: &LoadContext,
    ) -> Result<LoadedPrefab, LoadError> {
        let doc = PrefabDocument::from_bytes(bytes)?;
        self.load_document(&doc, parent, ctx)
    }

    /// Load a prefab asset from the asset store.
    pub fn load_asset(
        &mut self,
        asset: AssetId,
        parent: Option<ObjectId>,
        ctx: &LoadContext,
    ) -> Result<LoadedPrefab, LoadError> {
        let assets = self.assets;
        let path = assets.path(asset).unwrap_or("<unknown>").to_owned();
        let bytes = assets
            .prefab_bytes(asset)
            .ok_or(LoadError::NotAPrefabAsset { path })?;
        self.load_bytes(bytes, parent, ctx)
    }

    /// Run all passes of one document. On error every object created by
    /// this call (including nested loads) is destroyed again, leaving the
    /// live graph unchanged.
    pub fn load_document(
        &mut self,
        doc: &PrefabDocument,
        parent: Option<ObjectId>,
        ctx: &LoadContext,
    ) -> Result<LoadedPrefab, LoadError> {
        if let Some(p) = parent {
            let is_actor = self.scene.get(p).map(|o| o.is_actor()).unwrap_or(false);
            if !is_actor {
                return Err(LoadError::DeadParent);
            }
        }

        let mut state = LoadState::new(ctx.fresh_sub_prefab_guids);
        state.default_names = collect_default_names(doc);

        match self.run_passes(doc, parent, ctx, &mut state) {
            Ok(root) => {
                let object_to_guid = state
                    .guid_to_object
                    .iter()
                    .map(|(&guid, &id)| (id, guid))
                    .collect();
                if ctx.depth == 0 {
                    log::debug!("prefab load complete: {}", state.summary);
                }
                Ok(LoadedPrefab {
                    root,
                    guid_to_object: state.guid_to_object,
                    object_to_guid,
                    sub_prefabs: state.sub_prefabs,
                    summary: state.summary,
                })
            }
            Err(err) => {
                for id in state.created.iter().rev() {
                    self.scene.destroy_object(*id);
                }
                Err(err)
            }
        }
    }

    fn run_passes<'d>(
        &mut self,
        doc: &'d PrefabDocument,
        parent: Option<ObjectId>,
        ctx: &LoadContext,
        state: &mut LoadState<'d>,
    ) -> Result<ObjectId, LoadError> {
        debug_assert_eq!(state.phase, LoadPhase::Idle);
        let root = self.pre_generate_actor(&doc.root, parent, doc, state, ctx)?;
        self.pre_generate_records(doc, state);
        state.phase = LoadPhase::PreGenerated;

        self.populate(doc, state);
        state.phase = LoadPhase::Populated;

        self.attach(state);
        state.phase = LoadPhase::Attached;
        Ok(root)
    }

    // -----------------------------------------------------------------------
    // Pass 1: PreGenerate
    // -----------------------------------------------------------------------

    fn pre_generate_actor<'d>(
        &mut self,
        node: &'d ActorNode,
        parent_actor: Option<ObjectId>,
        doc: &'d PrefabDocument,
        state: &mut LoadState<'d>,
        ctx: &LoadContext,
    ) -> Result<ObjectId, LoadError> {
        match node {
            ActorNode::Concrete {
                guid,
                class_index,
                flags,
                children,
                ..
            } => {
                let class = doc
                    .tables
                    .class_by_index(*class_index)
                    .and_then(|name| self.scene.registry().find_by_name(name))
                    .filter(|&cid| {
                        let info = self.scene.registry().get(cid);
                        info.kind == ClassKind::Actor && info.instantiable
                    });
                let id = match class {
                    Some(cid) => self.scene.spawn_actor(cid, None),
                    None => {
                        let name = doc
                            .tables
                            .class_by_index(*class_index)
                            .unwrap_or(ClassRegistry::MISSING_NAME)
                            .to_owned();
                        log::warn!("actor class '{name}' is unresolvable, creating a stub");
                        state.summary.missing_class_stubs += 1;
                        self.scene.create_missing_stub(ClassKind::Actor, None, &name)
                    }
                };
                if let Some(obj) = self.scene.get_mut(id) {
                    obj.set_flags(*flags);
                }
                state.summary.objects_created += 1;
                state.created.push(id);
                state.map_guid(*guid, id);
                if let Some(parent) = parent_actor {
                    state.pending_actor_attach.push((id, parent));
                }
                state.pending_actors.push((id, node));

                for child in children {
                    self.pre_generate_actor(child, Some(id), doc, state, ctx)?;
                }
                Ok(id)
            }
            ActorNode::Prefab {
                asset_index,
                root_guid,
                overrides,
                guid_remap,
            } => self.pre_generate_sub_prefab(
                *asset_index,
                *root_guid,
                overrides,
                guid_remap,
                parent_actor,
                doc,
                state,
                ctx,
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn pre_generate_sub_prefab<'d>(
        &mut self,
        asset_index: i32,
        root_guid: Guid,
        overrides: &[OverrideRecord],
        guid_remap: &[(Guid, Guid)],
        parent_actor: Option<ObjectId>,
        doc: &'d PrefabDocument,
        state: &mut LoadState<'d>,
        ctx: &LoadContext,
    ) -> Result<ObjectId, LoadError> {
        let asset = doc
            .tables
            .asset_by_index(asset_index)
            .and_then(|path| self.assets.find_by_path(path));

        // The nested load leaves its root unparented; the root joins this
        // document's attach pass so sibling order follows the node tree.
        let loaded = match asset {
            Some(asset_id) => match self.load_sub_prefab(asset_id, guid_remap, None, ctx) {
                Ok(loaded) => Some(loaded),
                Err(err @ LoadError::Structural(StructuralError::RecursionOverflow { .. })) => {
                    return Err(err);
                }
                Err(err) => {
                    log::warn!("nested prefab load failed, creating a stub: {err}");
                    None
                }
            },
            None => {
                log::warn!("unresolvable prefab asset index {asset_index}, creating a stub");
                None
            }
        };

        let Some(loaded) = loaded else {
            state.summary.unresolved_references += 1;
            let id = self
                .scene
                .create_missing_stub(ClassKind::Actor, None, "MissingPrefab");
            state.summary.objects_created += 1;
            state.created.push(id);
            state.map_guid(root_guid, id);
            if let Some(parent) = parent_actor {
                state.pending_actor_attach.push((id, parent));
            }
            return Ok(id);
        };

        state.summary.merge(&loaded.summary);
        state.created.push(loaded.root);
        state.guid_to_object.extend(loaded.guid_to_object);
        state
            .guid_aliases
            .extend(loaded.alias.iter().filter(|(k, v)| k != v));
        if let Some(parent) = parent_actor {
            state.pending_actor_attach.push((loaded.root, parent));
        }

        // Pass 4: overrides apply to the fully attached nested result,
        // before this document's own populate pass.
        let mut instance = loaded.instance;
        self.apply_overrides(overrides, &loaded.alias, doc, state, &mut instance);
        state.sub_prefabs.insert(loaded.root, instance);
        Ok(loaded.root)
    }

    /// Load a nested asset standalone and rewrite its GUID space into
    /// the enclosing document's. Two sibling calls over the same asset
    /// yield disjoint GUID sets and no shared object.
    pub(crate) fn load_sub_prefab(
        &mut self,
        asset: AssetId,
        stored_remap: &[(Guid, Guid)],
        parent: Option<ObjectId>,
        ctx: &LoadContext,
    ) -> Result<RemappedLoad, LoadError> {
        let child_ctx = ctx.descend()?;
        let assets = self.assets;
        let path = assets.path(asset).unwrap_or("<unknown>").to_owned();
        let bytes = assets
            .prefab_bytes(asset)
            .ok_or(LoadError::NotAPrefabAsset { path })?;
        let doc = PrefabDocument::from_bytes(bytes)?;
        let nested = self.load_document(&doc, parent, &child_ctx)?;

        let (remap, alias, guid_to_object) = remap_guid_space(
            &nested.guid_to_object,
            stored_remap,
            ctx.fresh_sub_prefab_guids,
        );
        let mut instance = SubPrefabInstance::new(asset);
        instance.guid_remap = remap;
        Ok(RemappedLoad {
            root: nested.root,
            guid_to_object,
            instance,
            alias,
            summary: nested.summary,
        })
    }

    // -----------------------------------------------------------------------
    // Pass 4: override application (runs inside pass 1, per instance)
    // -----------------------------------------------------------------------

    fn apply_overrides(
        &mut self,
        records: &[OverrideRecord],
        alias: &HashMap<Guid, Guid>,
        doc: &PrefabDocument,
        state: &mut LoadState<'_>,
        instance: &mut SubPrefabInstance,
    ) {
        let registry = self.scene.registry_handle();
        for record in records {
            let guid = alias
                .get(&record.object_guid)
                .copied()
                .unwrap_or(record.object_guid);
            let names: BTreeSet<String> = record
                .property_names
                .iter()
                .filter_map(|&index| doc.tables.name_by_index(index).map(str::to_owned))
                .collect();
            // The tracked set persists for the instance's lifetime even
            // when application degrades below.
            for name in &names {
                instance.overrides.add(guid, name);
            }

            let Some(&object) = state.guid_to_object.get(&guid) else {
                log::warn!("override target {guid} does not exist in the loaded instance");
                state.summary.skipped_overrides += 1;
                continue;
            };

            let bag = {
                let guid_map = &state.guid_to_object;
                let aliases = &state.guid_aliases;
                let unresolved = &mut state.summary.unresolved_references;
                let mut resolver = ReadResolver {
                    guid_to_object: guid_map,
                    guid_aliases: aliases,
                    tables: &doc.tables,
                    assets: self.assets,
                    registry: &registry,
                    unresolved,
                };
                self.codec.decode(&record.property_blob, &mut resolver)
            };
            let bag = match bag {
                Ok(bag) => bag,
                Err(err) => {
                    log::warn!("override blob for {guid} failed to decode: {err}");
                    state.summary.malformed_blobs += 1;
                    continue;
                }
            };

            let schema = self
                .scene
                .get(object)
                .and_then(|o| registry.try_get(o.class()))
                .map(|info| info.defaults.clone())
                .unwrap_or_default();
            for name in &names {
                if !schema.contains(name) {
                    log::warn!("overridden property '{name}' no longer exists on {guid}, skipping");
                    state.summary.skipped_overrides += 1;
                    continue;
                }
                let Some(value) = bag.get(name) else {
                    continue;
                };
                if let Some(obj) = self.scene.get_mut(object) {
                    obj.properties_mut().set(name, value.clone());
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pass 1 (continued): object and component records
    // -----------------------------------------------------------------------

    fn pre_generate_records<'d>(&mut self, doc: &'d PrefabDocument, state: &mut LoadState<'d>) {
        let mut pending: Vec<PendingRecord<'d>> = doc
            .objects
            .iter()
            .map(PendingRecord::Object)
            .chain(doc.components.iter().map(PendingRecord::Component))
            .collect();

        // Outers may be listed in any order relative to the objects they
        // own; iterate until every record's owner exists.
        loop {
            let mut deferred = Vec::new();
            let mut progressed = false;
            for record in pending {
                let outer_guid = record.outer_guid();
                if outer_guid.is_nil() {
                    self.instantiate_record(&record, None, doc, state);
                    progressed = true;
                    continue;
                }
                match state.resolve_guid(outer_guid) {
                    Some(outer) => {
                        self.instantiate_record(&record, Some(outer), doc, state);
                        progressed = true;
                    }
                    None => deferred.push(record),
                }
            }
            if deferred.is_empty() {
                break;
            }
            if !progressed {
                for record in deferred {
                    log::warn!(
                        "record {} has unresolvable outer {}, creating unowned",
                        record.guid(),
                        record.outer_guid()
                    );
                    state.summary.unresolved_references += 1;
                    self.instantiate_record(&record, None, doc, state);
                }
                break;
            }
            pending = deferred;
        }
    }

    fn instantiate_record<'d>(
        &mut self,
        record: &PendingRecord<'d>,
        outer: Option<ObjectId>,
        doc: &'d PrefabDocument,
        state: &mut LoadState<'d>,
    ) {
        let guid = record.guid();
        let default_name = state.default_names.get(&guid).cloned();

        // Match a constructor-created instance by name before creating.
        if let (Some(owner), Some(name)) = (outer, default_name.as_deref()) {
            if let Some(existing) = self.scene.find_default_subobject_by_name(owner, name) {
                if !state.claimed_defaults.contains(&existing) {
                    state.claimed_defaults.insert(existing);
                    state.map_guid(guid, existing);
                    state.summary.objects_created += 1;
                    if let PendingRecord::Component(rec) = record {
                        state
                            .pending_components
                            .push((existing, rec.scene_parent_guid));
                    }
                    return;
                }
            }
        }

        let expected_kind = record.expected_kind();
        let class = doc
            .tables
            .class_by_index(record.class_index())
            .and_then(|name| self.scene.registry().find_by_name(name))
            .filter(|&cid| {
                let info = self.scene.registry().get(cid);
                info.kind == expected_kind && info.instantiable
            });
        let name = match record {
            PendingRecord::Component(rec) => doc
                .tables
                .name_by_index(rec.component_name)
                .map(str::to_owned)
                .or(default_name),
            PendingRecord::Object(_) => default_name,
        };
        let name = name
            .or_else(|| {
                doc.tables
                    .class_by_index(record.class_index())
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| ClassRegistry::MISSING_NAME.to_owned());

        let id = match class {
            Some(cid) => self.scene.create_object(cid, outer, &name),
            None => {
                log::warn!("class for record {guid} is unresolvable, creating a stub");
                state.summary.missing_class_stubs += 1;
                self.scene.create_missing_stub(expected_kind, outer, &name)
            }
        };
        if let Some(obj) = self.scene.get_mut(id) {
            obj.set_flags(record.flags());
        }
        state.created.push(id);
        state.summary.objects_created += 1;
        state.map_guid(guid, id);
        if let PendingRecord::Component(rec) = record {
            state.pending_components.push((id, rec.scene_parent_guid));
        }
    }

    // -----------------------------------------------------------------------
    // Pass 2: Populate
    // -----------------------------------------------------------------------

    fn populate<'d>(&mut self, doc: &'d PrefabDocument, state: &mut LoadState<'d>) {
        let registry = self.scene.registry_handle();

        let actors = state.pending_actors.clone();
        for (id, node) in actors {
            if let ActorNode::Concrete { property_blob, .. } = node {
                self.decode_into(property_blob, id, &doc.tables, &registry, state);
            }
        }
        for record in &doc.objects {
            if let Some(id) = state.resolve_guid(record.guid) {
                self.decode_into(&record.property_blob, id, &doc.tables, &registry, state);
            }
        }
        for record in &doc.components {
            if let Some(id) = state.resolve_guid(record.guid) {
                self.decode_into(&record.property_blob, id, &doc.tables, &registry, state);
            }
        }
    }

    fn decode_into(
        &mut self,
        blob: &[u8],
        id: ObjectId,
        tables: &ReferenceTables,
        registry: &ClassRegistry,
        state: &mut LoadState<'_>,
    ) {
        let decoded = {
            let guid_map = &state.guid_to_object;
            let aliases = &state.guid_aliases;
            let unresolved = &mut state.summary.unresolved_references;
            let mut resolver = ReadResolver {
                guid_to_object: guid_map,
                guid_aliases: aliases,
                tables,
                assets: self.assets,
                registry,
                unresolved,
            };
            self.codec.decode(blob, &mut resolver)
        };
        match decoded {
            Ok(bag) => {
                if let Some(obj) = self.scene.get_mut(id) {
                    obj.properties_mut().merge_from(&bag);
                }
            }
            Err(err) => {
                log::warn!("property blob for {id} failed to decode, keeping defaults: {err}");
                state.summary.malformed_blobs += 1;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pass 3: Attach
    // -----------------------------------------------------------------------

    fn attach(&mut self, state: &mut LoadState<'_>) {
        // Actor tree first; its shape already encodes depth order.
        let attaches = state.pending_actor_attach.clone();
        for (child, parent) in attaches {
            let both_actors = self.scene.get(child).map(|o| o.is_actor()).unwrap_or(false)
                && self.scene.get(parent).map(|o| o.is_actor()).unwrap_or(false);
            if both_actors {
                self.scene.set_actor_parent(child, parent);
            }
        }

        // Root components, authoritative from the record.
        let actors = state.pending_actors.clone();
        for (id, node) in actors {
            let ActorNode::Concrete {
                root_component_guid,
                ..
            } = node
            else {
                continue;
            };
            if root_component_guid.is_nil() {
                self.scene.set_root_component(id, None);
                continue;
            }
            match state.resolve_guid(*root_component_guid) {
                Some(component)
                    if self
                        .scene
                        .get(component)
                        .map(|o| o.is_component())
                        .unwrap_or(false) =>
                {
                    self.scene.set_root_component(id, Some(component));
                }
                _ => {
                    log::warn!("unresolvable root component {root_component_guid} for {id}");
                    state.summary.unresolved_references += 1;
                }
            }
        }

        // Component scene parents last: they may cross the actor tree and
        // only resolve once every actor is in place.
        let components = state.pending_components.clone();
        for (component, parent_guid) in components {
            if parent_guid.is_nil() {
                continue;
            }
            let parent = state.resolve_guid(parent_guid);
            let valid = parent
                .filter(|&p| p != component)
                .filter(|&p| self.scene.get(p).map(|o| o.is_component()).unwrap_or(false))
                .filter(|_| {
                    self.scene
                        .get(component)
                        .map(|o| o.is_component())
                        .unwrap_or(false)
                });
            match valid {
                Some(parent) => self.scene.attach_child(parent, component),
                None => {
                    log::warn!("unresolvable scene parent {parent_guid} for component {component}");
                    state.summary.unresolved_references += 1;
                }
            }
        }
    }
}

/// Gather every record's parallel default-sub-object arrays into one
/// GUID → name index, consulted before creating any record.
fn collect_default_names(doc: &PrefabDocument) -> HashMap<Guid, String> {
    let mut names = HashMap::new();
    let mut add = |guids: &[Guid], indices: &[i32]| {
        for (&guid, &index) in guids.iter().zip(indices) {
            if let Some(name) = doc.tables.name_by_index(index) {
                names.insert(guid, name.to_owned());
            }
        }
    };
    for record in &doc.objects {
        add(
            &record.default_subobject_guids,
            &record.default_subobject_names,
        );
    }
    for record in &doc.components {
        add(
            &record.default_subobject_guids,
            &record.default_subobject_names,
        );
    }
    let mut stack = vec![&doc.root];
    while let Some(node) = stack.pop() {
        if let ActorNode::Concrete {
            default_subobject_guids,
            default_subobject_names,
            children,
            ..
        } = node
        {
            add(default_subobject_guids, default_subobject_names);
            stack.extend(children.iter());
        }
    }
    names
}
