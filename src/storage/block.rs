// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Mutable, size-bounded tuple container.
//!
//! A block accepts tuples until the next one would overflow its layout
//! capacity. Batch-mode inserts skip slot-directory maintenance; callers
//! finish a batch-written block with `rebuild()` before sealing it.

use crate::common::ids::{AttributeId, BlockId};
use crate::storage::block_layout::{BlockLayout, BLOCK_HEADER_BYTES, TUPLE_SLOT_BYTES};
use crate::types::tuple::Tuple;
use crate::types::value_accessor::ValueAccessor;

pub struct StorageBlock {
    id: BlockId,
    layout: BlockLayout,
    tuples: Vec<Tuple>,
    occupied_bytes: u64,
    // Byte offset of each tuple's data. Maintained eagerly by
    // insert_tuple, deferred by insert_tuple_in_batch until rebuild().
    slot_offsets: Vec<u64>,
    slots_consistent: bool,
}

impl StorageBlock {
    pub fn new(id: BlockId, layout: BlockLayout) -> Self {
        Self {
            id,
            layout,
            tuples: Vec::new(),
            occupied_bytes: BLOCK_HEADER_BYTES,
            slot_offsets: Vec::new(),
            slots_consistent: true,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    pub fn tuple_count(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn occupied_bytes(&self) -> u64 {
        self.occupied_bytes
    }

    fn fits(&self, tuple: &Tuple) -> bool {
        let need = TUPLE_SLOT_BYTES + tuple.byte_size();
        self.occupied_bytes.saturating_add(need) <= self.layout.capacity_bytes()
    }

    /// Insert one tuple, keeping the slot directory consistent. Returns
    /// false when the tuple does not fit; the block is unchanged.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> bool {
        if !self.fits(tuple) {
            return false;
        }
        self.slot_offsets.push(self.occupied_bytes + TUPLE_SLOT_BYTES);
        self.occupied_bytes += TUPLE_SLOT_BYTES + tuple.byte_size();
        self.tuples.push(tuple.clone());
        true
    }

    /// Insert one tuple without slot-directory maintenance. The caller
    /// must `rebuild()` before the block is sealed or scanned.
    pub fn insert_tuple_in_batch(&mut self, tuple: &Tuple) -> bool {
        if !self.fits(tuple) {
            return false;
        }
        self.occupied_bytes += TUPLE_SLOT_BYTES + tuple.byte_size();
        self.tuples.push(tuple.clone());
        self.slots_consistent = false;
        true
    }

    /// Absorb as many tuples from the accessor as fit, in accessor
    /// order. A tuple that does not fit is un-consumed via rewind, so
    /// the accessor resumes exactly there on the next block. Rebuilds
    /// the slot directory before returning.
    ///
    /// With an attribute map, each consumed tuple is first projected so
    /// that stored attribute `i` takes input attribute `map[i]`.
    pub fn bulk_insert_tuples(
        &mut self,
        accessor: &mut dyn ValueAccessor,
        attribute_map: Option<&[AttributeId]>,
    ) -> usize {
        let mut inserted = 0;
        while accessor.next() {
            let accepted = match attribute_map {
                Some(map) => {
                    let projected = accessor.current().project(map);
                    self.insert_tuple_in_batch(&projected)
                }
                None => {
                    let tuple = accessor.current();
                    self.insert_tuple_in_batch(tuple)
                }
            };
            if !accepted {
                let cursor = accessor.position();
                accessor.rewind_to(cursor);
                break;
            }
            inserted += 1;
        }
        self.rebuild();
        inserted
    }

    /// Recompute the slot directory from the stored tuples. Idempotent;
    /// required after batch-mode inserts and before sealing.
    pub fn rebuild(&mut self) {
        self.slot_offsets.clear();
        self.slot_offsets.reserve(self.tuples.len());
        let mut offset = BLOCK_HEADER_BYTES;
        for tuple in &self.tuples {
            self.slot_offsets.push(offset + TUPLE_SLOT_BYTES);
            offset += TUPLE_SLOT_BYTES + tuple.byte_size();
        }
        self.slots_consistent = true;
    }

    pub fn slots_consistent(&self) -> bool {
        self.slots_consistent
    }

    /// Data offset of the i-th tuple. Valid only while the slot
    /// directory is consistent.
    pub fn slot_offset(&self, index: usize) -> u64 {
        debug_assert!(self.slots_consistent);
        self.slot_offsets[index]
    }

    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }
}
