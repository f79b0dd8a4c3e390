use std::sync::Arc;

use drawstore::{
    rt_scene::RtInstanceFlags,
    types::{AlphaFunc, ObjectType},
};
use drawstore_test::{anim_mesh, material, packed_clusters, static_mesh, storage, textured};
use glam::{Mat4, Vec3};

#[test]
fn only_traceable_geometry_requests_a_rebuild() {
    let (_device, mut storage) = storage();
    let mesh = static_mesh(1);
    assert!(!storage.needs_tlas_update());

    let _moving = storage.alloc(&mesh, &material(AlphaFunc::Solid), 0, 64, ObjectType::Movable);
    let _skinned = storage.alloc_animated(&anim_mesh(), &material(AlphaFunc::Solid), 0, 0, 64);
    let _blended = storage.alloc(&mesh, &material(AlphaFunc::Transparent), 0, 64, ObjectType::Static);
    assert!(!storage.needs_tlas_update());
    assert!(storage.build_rt_scene().is_none());

    let _fixed = storage.alloc(&mesh, &material(AlphaFunc::Solid), 0, 64, ObjectType::Static);
    assert!(storage.needs_tlas_update());
}

#[test]
fn build_gathers_landscape_and_instances() {
    let (_device, mut storage) = storage();
    let mesh = static_mesh(4);
    let leaves = textured(AlphaFunc::AlphaTest);

    let _land = storage.alloc_clustered(
        &mesh,
        &material(AlphaFunc::Solid),
        0,
        128,
        &packed_clusters(2),
        ObjectType::Landscape,
    );
    let rock = storage.alloc(&mesh, &material(AlphaFunc::Solid), 128, 64, ObjectType::Static);
    let _tree = storage.alloc(&mesh, &leaves, 192, 64, ObjectType::Static);
    let _moving = storage.alloc(&mesh, &material(AlphaFunc::Solid), 0, 64, ObjectType::Movable);

    let matrix = Mat4::from_translation(Vec3::new(0.0, 4.0, 0.0));
    storage.item_mut(&rock).unwrap().set_obj_matrix(matrix);

    let build = storage.build_rt_scene().unwrap();
    assert!(!storage.needs_tlas_update());
    assert!(storage.build_rt_scene().is_none());

    assert_eq!(build.static_opaque.len(), 1);
    let land = &build.static_opaque[0];
    assert!(Arc::ptr_eq(&land.mesh, &mesh));
    assert_eq!((land.first_index, land.index_len), (0, 128));

    assert_eq!(build.instances.len(), 2);
    assert_eq!(build.hit_slots.len(), 2);

    let rock = &build.instances[0];
    assert_eq!(rock.transform, matrix);
    assert_eq!(rock.flags, RtInstanceFlags::empty());
    assert_eq!(build.hit_slots[rock.hit_slot as usize].first_primitive, 128 / 3);

    let tree = &build.instances[1];
    assert_eq!(tree.flags, RtInstanceFlags::NON_OPAQUE);
    assert_eq!((tree.first_index, tree.index_len), (192, 64));
    let slot = &build.hit_slots[tree.hit_slot as usize];
    assert!(Arc::ptr_eq(slot.texture.as_ref().unwrap(), leaves.texture.as_ref().unwrap()));
}

#[test]
fn consecutive_copies_share_a_hit_slot() {
    let (_device, mut storage) = storage();
    let mesh = static_mesh(2);
    let x = material(AlphaFunc::Solid);

    let _a = storage.alloc(&mesh, &x, 0, 64, ObjectType::Static);
    let _b = storage.alloc(&mesh, &x, 0, 64, ObjectType::Static);
    let _c = storage.alloc(&mesh, &x, 64, 64, ObjectType::Static);

    let build = storage.build_rt_scene().unwrap();
    let slots: Vec<_> = build.instances.iter().map(|i| i.hit_slot).collect();
    assert_eq!(slots, [0, 0, 1]);
    assert_eq!(build.hit_slots.len(), 2);
}

#[test]
fn releasing_traceable_geometry_requests_a_rebuild() {
    let (_device, mut storage) = storage();
    let mesh = static_mesh(1);

    let a = storage.alloc(&mesh, &material(AlphaFunc::Solid), 0, 64, ObjectType::Static);
    let _b = storage.alloc(&mesh, &material(AlphaFunc::AlphaTest), 0, 64, ObjectType::Static);
    assert_eq!(storage.build_rt_scene().unwrap().instances.len(), 2);

    storage.release(a);
    assert!(storage.needs_tlas_update());

    let build = storage.build_rt_scene().unwrap();
    assert_eq!(build.instances.len(), 1);
    assert_eq!(build.instances[0].flags, RtInstanceFlags::NON_OPAQUE);
}
