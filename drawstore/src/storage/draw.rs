use crate::{
    device::{GpuDevice, RenderEncoder},
    managers::IndirectCmd,
    storage::{DrawPush, DrawStorage},
    types::Viewport,
};

impl<D: GpuDevice> DrawStorage<D> {
    /// Draws every command with a color pipeline into the gbuffer.
    pub fn draw_gbuffer<'a, E: RenderEncoder<'a, D>>(&'a self, encoder: &mut E) {
        profiling::scope!("DrawStorage::draw_gbuffer");
        self.draw_viewport(encoder, Viewport::Main);
    }

    /// Draws every shadow casting command into the given shadow cascade.
    /// Layers without a cascade draw nothing.
    pub fn draw_shadow<'a, E: RenderEncoder<'a, D>>(&'a self, encoder: &mut E, layer: usize) {
        profiling::scope!("DrawStorage::draw_shadow");
        match Viewport::shadow(layer) {
            Some(viewport) => self.draw_viewport(encoder, viewport),
            None => log::warn!("There is no shadow cascade {layer}"),
        }
    }

    fn draw_viewport<'a, E: RenderEncoder<'a, D>>(&'a self, encoder: &mut E, viewport: Viewport) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        let view = &gpu.views[viewport.index()];
        let committed = gpu.signature.payload.len();

        for &id in self.commands.draw_order() {
            if id.index() >= committed {
                continue;
            }
            let Some(command) = self.commands.get(id) else {
                continue;
            };
            let Some(bind_group) = command.binding_set(viewport).and_then(|set| set.group.as_ref()) else {
                continue;
            };
            let Some(pipeline) = command.pipeline(viewport) else {
                continue;
            };

            let push = DrawPush {
                first_meshlet: command.first_payload,
                meshlet_count: command.max_payload,
            };
            encoder.draw_indirect_command(
                &**pipeline,
                bind_group,
                bytemuck::bytes_of(&push),
                &view.indirect,
                id.index() as u64 * std::mem::size_of::<IndirectCmd>() as u64,
            );
        }
    }
}
