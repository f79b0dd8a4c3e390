use drawstore::{
    managers::InstanceFlags,
    types::{AlphaFunc, ObjectType, WindMode},
    CommitState, DrawStorage, Item,
};
use drawstore_test::{material, packed_clusters, static_mesh, storage, MockDevice};
use glam::{Mat4, Vec3};

fn object(storage: &mut DrawStorage<MockDevice>) -> Item {
    let item = storage.alloc(&static_mesh(1), &material(AlphaFunc::Solid), 0, 64, ObjectType::Static);
    storage.commit().unwrap();
    assert_eq!(storage.state(), CommitState::Clean);
    item
}

fn wind_of(storage: &DrawStorage<MockDevice>, item: &Item) -> f32 {
    let slot = storage.item(item).unwrap().instance().unwrap();
    storage.instances().get(slot).wind
}

#[test]
fn wind_sway_reaches_the_instance() {
    let (_device, mut storage) = storage();
    let item = object(&mut storage);

    storage.item_mut(&item).unwrap().set_wind(WindMode::Wind, 2.0);
    storage.pre_frame_update(750);

    assert_eq!(storage.state(), CommitState::Dirty);
    assert!((wind_of(&storage, &item) - 2.0).abs() < 1e-4);

    storage.pre_frame_update(1500);
    assert!(wind_of(&storage, &item).abs() < 1e-4);
}

#[test]
fn disabling_wind_resets_the_sway() {
    let (_device, mut storage) = storage();
    let item = object(&mut storage);

    storage.item_mut(&item).unwrap().set_wind(WindMode::Wind2, 1.0);
    storage.pre_frame_update(375);
    storage.commit().unwrap();
    assert!(wind_of(&storage, &item) > 0.5);

    storage.item_mut(&item).unwrap().set_wind(WindMode::None, 1.0);
    assert_eq!(wind_of(&storage, &item), 0.0);
    assert_eq!(storage.state(), CommitState::Dirty);

    // Nothing sways any more, so frames no longer dirty the storage.
    storage.commit().unwrap();
    storage.pre_frame_update(1000);
    assert_eq!(storage.state(), CommitState::Clean);
}

#[test]
fn morph_layers_are_capped_and_expire() {
    let (_device, mut storage) = storage();
    let item = object(&mut storage);

    {
        let mut object = storage.item_mut(&item).unwrap();
        object.start_morph_anim(1, 1.0, 0, None);
        object.start_morph_anim(2, 1.0, 0, Some(100));
        object.start_morph_anim(3, 1.0, 0, None);
    }
    let anims = |storage: &DrawStorage<MockDevice>| -> Vec<u32> {
        storage.item(&item).unwrap().morph_layers().iter().map(|m| m.anim).collect()
    };
    assert_eq!(anims(&storage), [1, 2, 3]);

    storage.pre_frame_update(99);
    assert_eq!(anims(&storage), [1, 2, 3]);
    storage.pre_frame_update(100);
    assert_eq!(anims(&storage), [1, 3]);

    {
        let mut object = storage.item_mut(&item).unwrap();
        object.start_morph_anim(4, 0.5, 100, None);
        object.start_morph_anim(5, 0.5, 100, None);
    }
    assert_eq!(anims(&storage), [3, 4, 5]);
}

#[test]
fn ghost_and_fatness_land_in_the_instance() {
    let (_device, mut storage) = storage();
    let item = object(&mut storage);
    let slot = storage.item(&item).unwrap().instance().unwrap();

    storage.item_mut(&item).unwrap().set_as_ghost(true);
    assert_eq!(storage.state(), CommitState::Dirty);
    assert!(storage.instances().get(slot).flags().contains(InstanceFlags::GHOST));

    storage.item_mut(&item).unwrap().set_fatness(0.25);
    let desc = storage.instances().get(slot);
    assert_eq!(desc.fatness, 0.25);
    assert!(desc.flags().contains(InstanceFlags::GHOST));

    storage.item_mut(&item).unwrap().set_as_ghost(false);
    assert!(!storage.instances().get(slot).flags().contains(InstanceFlags::GHOST));
    assert_eq!(storage.instances().get(slot).fatness, 0.25);
}

#[test]
fn moving_an_object_moves_its_cluster() {
    let (_device, mut storage) = storage();
    let item = object(&mut storage);
    let target = Vec3::new(-3.0, 1.0, 8.0);
    let matrix = Mat4::from_scale_rotation_translation(Vec3::splat(2.0), Default::default(), target);

    storage.item_mut(&item).unwrap().set_obj_matrix(matrix);

    let view = storage.item(&item).unwrap();
    assert_eq!(view.position(), matrix);
    assert_eq!(storage.instances().get(view.instance().unwrap()).translation(), target);
    assert_eq!(storage.clusters().get(view.object().cluster).unwrap().center, target);
}

#[test]
fn landscape_is_not_instanced() {
    let (_device, mut storage) = storage();
    let item = storage.alloc_clustered(
        &static_mesh(2),
        &material(AlphaFunc::Solid),
        0,
        128,
        &packed_clusters(2),
        ObjectType::Landscape,
    );
    storage.commit().unwrap();

    let matrix = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
    storage.item_mut(&item).unwrap().set_obj_matrix(matrix);
    storage.item_mut(&item).unwrap().set_wind(WindMode::Wind, 1.0);
    storage.pre_frame_update(750);

    assert_eq!(storage.state(), CommitState::Clean);
    assert_eq!(storage.item(&item).unwrap().position(), matrix);
    assert_eq!(storage.instances().live_count(), 0);
}

#[test]
fn morph_layers_stay_out_of_the_instance() {
    let (_device, mut storage) = storage();
    let item = object(&mut storage);
    let slot = storage.item(&item).unwrap().instance().unwrap();
    let before = *storage.instances().get(slot);

    storage.item_mut(&item).unwrap().start_morph_anim(7, 0.75, 10, Some(500));
    storage.pre_frame_update(20);

    let view = storage.item(&item).unwrap();
    assert_eq!(view.morph_layers().len(), 1);
    assert_eq!(view.morph_layers()[0].intensity, 0.75);
    assert_eq!(*storage.instances().get(slot), before);
    assert_eq!(storage.state(), CommitState::Clean);
}
