use std::collections::BTreeSet;

use arrayvec::ArrayVec;
use glam::Mat4;

use crate::{
    managers::{BucketId, ClusterId, CommandId, InstanceSlot},
    types::{ObjectType, WindMode, MAX_MORPH_LAYERS, MESHLET_INDICES},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub usize);

/// One running morph animation layer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MorphAnim {
    pub anim: u32,
    pub intensity: f32,
    pub time_start: u64,
    /// `None` loops forever.
    pub time_until: Option<u64>,
}

impl MorphAnim {
    pub fn is_finished(&self, time_ms: u64) -> bool {
        self.time_until.is_some_and(|until| time_ms >= until)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub ty: ObjectType,
    pub ibo_offset: usize,
    pub ibo_len: usize,
    pub bucket: BucketId,
    /// `None` marks a free slot.
    pub command: Option<CommandId>,
    pub cluster: ClusterId,
    pub cluster_count: u32,
    pub instance: Option<InstanceSlot>,
    pub transform: Mat4,
    pub anim_ptr: u32,

    pub wind: WindMode,
    pub wind_intensity: f32,
    pub morph: ArrayVec<MorphAnim, MAX_MORPH_LAYERS>,
    pub fatness: f32,
    pub ghost: bool,
}

impl Object {
    pub fn empty() -> Self {
        Self {
            ty: ObjectType::Static,
            ibo_offset: 0,
            ibo_len: 0,
            bucket: BucketId(0),
            command: None,
            cluster: ClusterId(0),
            cluster_count: 0,
            instance: None,
            transform: Mat4::IDENTITY,
            anim_ptr: 0,
            wind: WindMode::None,
            wind_intensity: 0.0,
            morph: ArrayVec::new(),
            fatness: 0.0,
            ghost: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.command.is_none()
    }

    /// Amount of meshlets the object contributes to its command.
    pub fn meshlet_count(&self) -> u32 {
        (self.ibo_len / MESHLET_INDICES) as u32
    }

    pub fn first_meshlet(&self) -> u32 {
        (self.ibo_offset / MESHLET_INDICES) as u32
    }
}

/// Slot array of objects.
///
/// Freed slots are reused lowest first. Free slots at the end of the array are
/// dropped right away, so the array never ends with an empty object.
#[derive(Debug, Default)]
pub struct ObjectTable {
    objects: Vec<Object>,
    free: BTreeSet<usize>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: Object) -> ObjectId {
        debug_assert!(!object.is_empty());
        if let Some(idx) = self.free.pop_first() {
            self.objects[idx] = object;
            return ObjectId(idx);
        }
        self.objects.push(object);
        ObjectId(self.objects.len() - 1)
    }

    /// Takes the object out of its slot. `None` if the slot is already free.
    pub fn remove(&mut self, id: ObjectId) -> Option<Object> {
        let slot = self.objects.get_mut(id.0)?;
        if slot.is_empty() {
            return None;
        }
        let object = std::mem::replace(slot, Object::empty());
        self.free.insert(id.0);
        self.trim();
        Some(object)
    }

    fn trim(&mut self) {
        while self.objects.last().is_some_and(Object::is_empty) {
            self.objects.pop();
        }
        let _trimmed = self.free.split_off(&self.objects.len());
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0).filter(|o| !o.is_empty())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.0).filter(|o| !o.is_empty())
    }

    /// Every live object.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Object)> + '_ {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, o)| !o.is_empty())
            .map(|(idx, o)| (ObjectId(idx), o))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ObjectId, &mut Object)> + '_ {
        self.objects
            .iter_mut()
            .enumerate()
            .filter(|(_, o)| !o.is_empty())
            .map(|(idx, o)| (ObjectId(idx), o))
    }

    /// Size of the slot array, free slots included.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn live_count(&self) -> usize {
        self.objects.len() - self.free.len()
    }
}

#[cfg(test)]
mod test {
    use super::{MorphAnim, Object, ObjectId, ObjectTable};
    use crate::managers::CommandId;

    fn live() -> Object {
        Object {
            command: Some(CommandId(0)),
            ibo_len: 128,
            ..Object::empty()
        }
    }

    #[test]
    fn reuses_lowest_free_slot() {
        let mut table = ObjectTable::new();
        let ids: Vec<_> = (0..4).map(|_| table.insert(live())).collect();
        assert_eq!(ids, [ObjectId(0), ObjectId(1), ObjectId(2), ObjectId(3)]);

        table.remove(ObjectId(2)).unwrap();
        table.remove(ObjectId(0)).unwrap();
        assert_eq!(table.free_count(), 2);

        assert_eq!(table.insert(live()), ObjectId(0));
        assert_eq!(table.insert(live()), ObjectId(2));
        assert_eq!(table.insert(live()), ObjectId(4));
        assert_eq!(table.free_count(), 0);
    }

    #[test]
    fn trims_trailing_free_slots() {
        let mut table = ObjectTable::new();
        for _ in 0..3 {
            table.insert(live());
        }

        table.remove(ObjectId(1)).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.free_count(), 1);

        table.remove(ObjectId(2)).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.free_count(), 0);

        table.remove(ObjectId(0)).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn double_remove_is_rejected() {
        let mut table = ObjectTable::new();
        table.insert(live());
        table.insert(live());

        assert!(table.remove(ObjectId(0)).is_some());
        assert!(table.remove(ObjectId(0)).is_none());
        assert!(table.remove(ObjectId(7)).is_none());
        assert!(table.get(ObjectId(0)).is_none());
        assert_eq!(table.live_count(), 1);
    }

    #[test]
    fn meshlet_range_from_index_range() {
        let object = Object {
            ibo_offset: 192,
            ibo_len: 128,
            ..live()
        };
        assert_eq!(object.first_meshlet(), 3);
        assert_eq!(object.meshlet_count(), 2);
    }

    #[test]
    fn morph_layers_expire() {
        let looping = MorphAnim {
            anim: 0,
            intensity: 1.0,
            time_start: 0,
            time_until: None,
        };
        let timed = MorphAnim {
            time_until: Some(100),
            ..looping
        };
        assert!(!looping.is_finished(u64::MAX));
        assert!(!timed.is_finished(99));
        assert!(timed.is_finished(100));
    }
}
