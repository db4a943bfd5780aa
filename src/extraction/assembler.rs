use crate::extraction::sets::EntityKey;
use std::collections::HashMap;

/// Dense `(frames, entities, components)` array of f64, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultArray {
    frames: usize,
    entities: usize,
    components: usize,
    data: Vec<f64>,
}

impl ResultArray {
    pub fn zeros(frames: usize, entities: usize, components: usize) -> Self {
        Self {
            frames,
            entities,
            components,
            data: vec![0.0; frames * entities * components],
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.frames, self.entities, self.components)
    }

    pub fn get(&self, frame: usize, entity: usize, component: usize) -> f64 {
        self.data[self.offset(frame, entity, component)]
    }

    pub fn set(&mut self, frame: usize, entity: usize, component: usize, value: f64) {
        let offset = self.offset(frame, entity, component);
        self.data[offset] = value;
    }

    /// Values of one frame, entity-major.
    pub fn frame(&self, frame: usize) -> &[f64] {
        let width = self.entities * self.components;
        &self.data[frame * width..(frame + 1) * width]
    }

    fn offset(&self, frame: usize, entity: usize, component: usize) -> usize {
        debug_assert!(frame < self.frames && entity < self.entities && component < self.components);
        (frame * self.entities + entity) * self.components + component
    }

    fn truncate_frames(&mut self, frames: usize) {
        if frames < self.frames {
            self.frames = frames;
            self.data.truncate(frames * self.entities * self.components);
        }
    }
}

/// Places aggregated per-entity values at fixed positions of a preallocated
/// array. The entity order given at construction is the column order.
pub struct ResultArrayAssembler {
    entities: Vec<EntityKey>,
    index: HashMap<EntityKey, usize>,
    array: ResultArray,
    rows: usize,
}

impl ResultArrayAssembler {
    pub fn new(entities: Vec<EntityKey>, frames: usize, components: usize) -> Self {
        let index = entities
            .iter()
            .enumerate()
            .map(|(position, key)| (*key, position))
            .collect();
        let array = ResultArray::zeros(frames, entities.len(), components);

        Self {
            entities,
            index,
            array,
            rows: 0,
        }
    }

    pub fn position(&self, key: &EntityKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Writes one frame. Returns the first entity, in column order, that got
    /// no value; nothing is written in that case.
    pub fn write_frame(
        &mut self,
        row: usize,
        values: &HashMap<EntityKey, Vec<f64>>,
    ) -> std::result::Result<(), EntityKey> {
        let (_, entity_count, components) = self.array.shape();
        let mut placed: Vec<Option<&[f64]>> = vec![None; entity_count];

        for (key, value) in values {
            match self.position(key) {
                Some(position) => placed[position] = Some(value.as_slice()),
                None => tracing::trace!(entity = %key, "value outside the resolved set"),
            }
        }

        if let Some(missing) = placed.iter().position(Option::is_none) {
            return Err(self.entities[missing]);
        }

        for (entity, value) in placed.into_iter().enumerate() {
            for (component, x) in value.into_iter().flatten().take(components).enumerate() {
                self.array.set(row, entity, component, *x);
            }
        }
        self.rows = self.rows.max(row + 1);

        Ok(())
    }

    pub fn finish(mut self) -> (Vec<EntityKey>, ResultArray) {
        self.array.truncate_frames(self.rows);
        (self.entities, self.array)
    }
}
