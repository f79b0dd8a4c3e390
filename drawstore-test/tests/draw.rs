use anyhow::Context;
use drawstore::{
    types::{AlphaFunc, ObjectType},
    util::frustum::ShaderFrustum,
    DrawStorage, Item,
};
use drawstore_test::{
    material, packed_clusters, push_pair, scene, static_mesh, storage, MockComputeEncoder, MockDevice,
    MockRenderEncoder,
};
use glam::{Mat4, Vec3};

/// A solid landscape of two clusters, an alpha tested static object and a
/// solid movable object, provisioned.
fn populated() -> anyhow::Result<(DrawStorage<MockDevice>, Vec<Item>)> {
    let (_device, mut storage) = storage();
    let mesh = static_mesh(2);

    let items = vec![
        storage.alloc_clustered(
            &mesh,
            &material(AlphaFunc::Solid),
            0,
            128,
            &packed_clusters(2),
            ObjectType::Landscape,
        ),
        storage.alloc(&mesh, &material(AlphaFunc::AlphaTest), 0, 64, ObjectType::Static),
        storage.alloc(&mesh, &material(AlphaFunc::Solid), 64, 64, ObjectType::Movable),
    ];
    storage.provision(&scene()).context("provisioning the populated storage")?;
    Ok((storage, items))
}

#[test]
fn visibility_resets_then_culls_every_viewport() -> anyhow::Result<()> {
    let (storage, _items) = populated()?;
    let mut encoder = MockComputeEncoder::default();
    storage.visibility_pass(&mut encoder);

    let names: Vec<_> = encoder
        .dispatches
        .iter()
        .map(|d| (d.pipeline.as_str(), d.bind_group.as_str()))
        .collect();
    assert_eq!(
        names,
        [
            ("cluster_init", "cluster init Main"),
            ("cluster_init", "cluster init Shadow0"),
            ("cluster_init", "cluster init Shadow1"),
            ("cluster_task_hiz", "cluster task Main"),
            ("cluster_task", "cluster task Shadow0"),
            ("cluster_task", "cluster task Shadow1"),
        ]
    );

    for init in &encoder.dispatches[..3] {
        assert_eq!(init.threads, 3);
        assert!(init.push_constants.is_empty());
    }
    for task in &encoder.dispatches[3..] {
        assert_eq!(task.threads, 4);
        assert_eq!(push_pair(&task.push_constants), (0, 4));
    }
    Ok(())
}

#[test]
fn frozen_visibility_records_nothing() -> anyhow::Result<()> {
    let (mut storage, _items) = populated()?;
    storage.set_visibility_frozen(true);

    let mut encoder = MockComputeEncoder::default();
    storage.visibility_pass(&mut encoder);
    assert!(encoder.dispatches.is_empty());

    storage.set_visibility_frozen(false);
    let mut encoder = MockComputeEncoder::default();
    storage.visibility_pass(&mut encoder);
    assert_eq!(encoder.dispatches.len(), 6);
    Ok(())
}

#[test]
fn nothing_is_recorded_before_provisioning() {
    let (_device, mut storage) = storage();
    let _item = storage.alloc(&static_mesh(1), &material(AlphaFunc::Solid), 0, 64, ObjectType::Static);

    let mut compute = MockComputeEncoder::default();
    storage.visibility_pass(&mut compute);
    assert!(compute.dispatches.is_empty());

    let mut render = MockRenderEncoder::default();
    storage.draw_gbuffer(&mut render);
    storage.draw_shadow(&mut render, 0);
    assert!(render.draws.is_empty());
}

#[test]
fn gbuffer_draws_color_commands_in_order() -> anyhow::Result<()> {
    let (storage, _items) = populated()?;
    let mut encoder = MockRenderEncoder::default();
    storage.draw_gbuffer(&mut encoder);

    // The movable command only casts shadows.
    assert_eq!(encoder.draws.len(), 2);

    let land = &encoder.draws[0];
    assert_eq!(land.pipeline, "landscape_gbuffer");
    assert_eq!(land.bind_group, "draw command 0 Main");
    assert_eq!(land.indirect, "indirect commands Main");
    assert_eq!(land.offset, 0);
    assert_eq!(push_pair(&land.push_constants), (0, 2));

    let object = &encoder.draws[1];
    assert_eq!(object.pipeline, "object_gbuffer_at");
    assert_eq!(object.offset, 20);
    assert_eq!(push_pair(&object.push_constants), (2, 1));
    Ok(())
}

#[test]
fn shadows_draw_every_caster() -> anyhow::Result<()> {
    let (storage, _items) = populated()?;

    for (layer, indirect) in [(0, "indirect commands Shadow0"), (1, "indirect commands Shadow1")] {
        let mut encoder = MockRenderEncoder::default();
        storage.draw_shadow(&mut encoder, layer);

        let draws: Vec<_> = encoder
            .draws
            .iter()
            .map(|d| (d.pipeline.as_str(), d.offset, push_pair(&d.push_constants)))
            .collect();
        assert_eq!(
            draws,
            [("depth", 0, (0, 2)), ("depth", 40, (3, 1)), ("depth_at", 20, (2, 1))]
        );
        assert!(encoder.draws.iter().all(|d| d.indirect == indirect));
    }
    Ok(())
}

#[test]
fn missing_shadow_cascade_draws_nothing() -> anyhow::Result<()> {
    let (storage, _items) = populated()?;
    let mut encoder = MockRenderEncoder::default();
    storage.draw_shadow(&mut encoder, 2);
    assert!(encoder.draws.is_empty());
    Ok(())
}

#[test]
fn uncommitted_commands_are_not_drawn() -> anyhow::Result<()> {
    let (mut storage, mut items) = populated()?;
    items.push(storage.alloc(&static_mesh(1), &material(AlphaFunc::Solid), 0, 64, ObjectType::Static));
    assert_eq!(storage.commands().len(), 4);

    let mut encoder = MockRenderEncoder::default();
    storage.draw_gbuffer(&mut encoder);
    assert_eq!(encoder.draws.len(), 2);
    assert!(encoder.draws.iter().all(|d| d.pipeline != "object_gbuffer"));

    storage.provision(&scene())?;
    let mut encoder = MockRenderEncoder::default();
    storage.draw_gbuffer(&mut encoder);
    assert_eq!(encoder.draws.len(), 3);
    Ok(())
}

fn camera() -> ShaderFrustum {
    let proj = Mat4::perspective_infinite_reverse_rh(90_f32.to_radians(), 1.0, 0.1);
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
    ShaderFrustum::from_matrix(proj * view)
}

#[test]
fn cpu_culling_keeps_clusters_in_view() -> anyhow::Result<()> {
    let (mut storage, items) = populated()?;

    let visible = storage.cull_cpu(&camera());
    assert_eq!(visible.len(), 3);
    assert_eq!(visible[0].len(), 2);
    assert_eq!(visible[1].len(), 1);
    assert_eq!(visible[2].len(), 1);
    assert_eq!(visible[0][1].first_meshlet, 1);
    assert_eq!(visible[0][1].meshlet_count, 1);

    // Behind the camera.
    storage
        .item_mut(&items[1])
        .context("static object is alive")?
        .set_obj_matrix(Mat4::from_translation(Vec3::new(0.0, 0.0, 30.0)));
    let visible = storage.cull_cpu(&camera());
    assert!(visible[1].is_empty());
    assert_eq!(visible[2].len(), 1);
    Ok(())
}

#[test]
fn freed_clusters_are_never_visible() -> anyhow::Result<()> {
    let (mut storage, mut items) = populated()?;
    let land = items.remove(0);
    storage.release(land);

    let visible = storage.cull_cpu(&camera());
    assert!(visible[0].is_empty());
    assert_eq!(visible[1].len(), 1);
    Ok(())
}

