use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::{
    device::GpuDevice,
    managers::BucketId,
    pipeline::PipelineCache,
    resources::Material,
    types::{AlphaFunc, ObjectType, Viewport, MESHLET_INDICES, VIEWPORT_COUNT},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(pub u32);

impl CommandId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arguments of one non-indexed indirect draw, followed by the offset into
/// the visible cluster list the culling program appends to.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct IndirectCmd {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
    pub write_offset: u32,
}

/// Where the draw program fetches per-cluster transforms from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GeometrySource {
    /// Clusters are in world space, transforms are read from the cluster table.
    Batched,
    /// Every cluster points to a slot of the instance buffer.
    Instanced,
}

impl GeometrySource {
    pub fn for_type(ty: ObjectType) -> Self {
        if ty.is_instanced() {
            GeometrySource::Instanced
        } else {
            GeometrySource::Batched
        }
    }
}

/// The bind group of a command in one viewport. The slot exists as soon as
/// the command can be drawn in that viewport, the group itself is only built
/// once the scene resources are known.
pub struct BindingSet<D: GpuDevice> {
    pub group: Option<D::BindGroup>,
}

impl<D: GpuDevice> BindingSet<D> {
    fn new() -> Self {
        Self { group: None }
    }
}

pub struct DrawCommand<D: GpuDevice> {
    pub color: Option<Arc<D::RenderPipeline>>,
    pub depth: Option<Arc<D::RenderPipeline>>,
    pub alpha: AlphaFunc,
    pub source: GeometrySource,
    /// Only set when the storage is not bindless, every bucket then gets its
    /// own commands.
    pub bucket: Option<BucketId>,
    pub bindings: [Option<BindingSet<D>>; VIEWPORT_COUNT],
    pub first_payload: u32,
    pub max_payload: u32,
}

impl<D: GpuDevice> DrawCommand<D> {
    pub fn pipeline(&self, viewport: Viewport) -> Option<&Arc<D::RenderPipeline>> {
        if viewport.is_shadow() {
            self.depth.as_ref()
        } else {
            self.color.as_ref()
        }
    }

    pub fn binding_set(&self, viewport: Viewport) -> Option<&BindingSet<D>> {
        self.bindings[viewport.index()].as_ref()
    }

    fn matches(
        &self,
        color: &Option<Arc<D::RenderPipeline>>,
        depth: &Option<Arc<D::RenderPipeline>>,
        alpha: AlphaFunc,
        source: GeometrySource,
        bucket: Option<BucketId>,
    ) -> bool {
        same_pipeline::<D>(&self.color, color)
            && same_pipeline::<D>(&self.depth, depth)
            && self.alpha == alpha
            && self.source == source
            && self.bucket == bucket
    }
}

fn same_pipeline<D: GpuDevice>(a: &Option<Arc<D::RenderPipeline>>, b: &Option<Arc<D::RenderPipeline>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Deduplicated draw commands and the payload layout derived from them.
pub struct CommandRegistry<D: GpuDevice> {
    commands: Vec<DrawCommand<D>>,
    order: Vec<CommandId>,
    indirect: Vec<IndirectCmd>,
    total_payload: u32,
}

impl<D: GpuDevice> CommandRegistry<D> {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            order: Vec::new(),
            indirect: Vec::new(),
            total_payload: 0,
        }
    }

    /// Returns the command drawing `material` on objects of type `ty`,
    /// creating it if needed. `None` if the combination is never drawn.
    pub fn command_id(
        &mut self,
        cache: &dyn PipelineCache<D>,
        material: &Material<D>,
        ty: ObjectType,
        bucket: BucketId,
        bindless: bool,
    ) -> Option<CommandId> {
        let color = cache.color_pipeline(material, ty);
        let depth = cache.depth_pipeline(material, ty);
        if color.is_none() && depth.is_none() {
            return None;
        }

        let source = GeometrySource::for_type(ty);
        let bucket = (!bindless).then_some(bucket);

        let existing = self
            .commands
            .iter()
            .position(|c| c.matches(&color, &depth, material.alpha, source, bucket));
        if let Some(idx) = existing {
            return Some(CommandId(idx as u32));
        }

        let mut bindings = [None, None, None];
        if color.is_some() {
            bindings[Viewport::Main.index()] = Some(BindingSet::new());
        }
        if depth.is_some() {
            bindings[Viewport::Shadow0.index()] = Some(BindingSet::new());
            bindings[Viewport::Shadow1.index()] = Some(BindingSet::new());
        }

        let id = CommandId(self.commands.len() as u32);
        log::debug!(
            "Creating draw command {} (alpha {:?}, {:?}, color: {}, depth: {})",
            id.0,
            material.alpha,
            source,
            color.is_some(),
            depth.is_some()
        );
        self.commands.push(DrawCommand {
            color,
            depth,
            alpha: material.alpha,
            source,
            bucket,
            bindings,
            first_payload: 0,
            max_payload: 0,
        });
        Some(id)
    }

    pub fn add_payload(&mut self, id: CommandId, meshlets: u32) {
        self.commands[id.index()].max_payload += meshlets;
    }

    pub fn remove_payload(&mut self, id: CommandId, meshlets: u32) {
        let command = &mut self.commands[id.index()];
        debug_assert!(command.max_payload >= meshlets);
        command.max_payload -= meshlets;
    }

    /// Lays the payload of every command out back to back and rebuilds the
    /// indirect argument table and the draw order.
    pub fn layout_payload(&mut self) {
        profiling::scope!("CommandRegistry::layout_payload");

        let mut running = 0;
        for command in &mut self.commands {
            command.first_payload = running;
            running += command.max_payload;
        }
        self.total_payload = running;

        self.indirect.clear();
        self.indirect.extend(self.commands.iter().map(|c| IndirectCmd {
            vertex_count: MESHLET_INDICES as u32,
            instance_count: 0,
            first_vertex: 0,
            first_instance: 0,
            write_offset: c.first_payload,
        }));

        self.order.clear();
        self.order.extend((0..self.commands.len() as u32).map(CommandId));
        let commands = &self.commands;
        self.order.sort_by_key(|id| commands[id.index()].alpha);
    }

    /// `(first_payload, max_payload)` of every command.
    pub fn payload_layout(&self) -> Vec<(u32, u32)> {
        self.commands.iter().map(|c| (c.first_payload, c.max_payload)).collect()
    }

    pub fn get(&self, id: CommandId) -> Option<&DrawCommand<D>> {
        self.commands.get(id.index())
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &DrawCommand<D>> + '_ {
        self.commands.iter()
    }

    pub fn iter_mut(&mut self) -> impl ExactSizeIterator<Item = &mut DrawCommand<D>> + '_ {
        self.commands.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands sorted for drawing, opaque ones first. Valid after
    /// [`Self::layout_payload`].
    pub fn draw_order(&self) -> &[CommandId] {
        &self.order
    }

    pub fn indirect_table(&self) -> &[IndirectCmd] {
        &self.indirect
    }

    pub fn total_payload(&self) -> u32 {
        self.total_payload
    }
}

impl<D: GpuDevice> Default for CommandRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}
