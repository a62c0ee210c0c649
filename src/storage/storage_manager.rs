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
//! Process-wide block store.
//!
//! `create_block` and `get_block` hand out pinned, exclusive
//! `BlockHandle`s. A block has at most one live handle in the whole
//! process; dropping the handle unpins. Eviction and persistence are
//! outside this subsystem.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::ids::{AttributeId, BlockId};
use crate::storage::block::StorageBlock;
use crate::storage::block_layout::BlockLayout;
use crate::storage::error::{Result, StorageError};
use crate::types::tuple::Tuple;
use crate::types::value_accessor::ValueAccessor;

struct BlockSlot {
    block: Arc<Mutex<StorageBlock>>,
    pinned: bool,
}

pub struct StorageManager {
    blocks: Mutex<HashMap<BlockId, BlockSlot>>,
    next_block_id: AtomicU64,
}

impl Default for StorageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageManager {
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(HashMap::new()),
            // Block id 0 is reserved as "invalid" by convention.
            next_block_id: AtomicU64::new(1),
        }
    }

    /// Create a new empty block with the given layout and pin it.
    pub fn create_block(self: &Arc<Self>, layout: &BlockLayout) -> Result<BlockHandle> {
        let id = BlockId::new(self.next_block_id.fetch_add(1, Ordering::Relaxed));
        let block = Arc::new(Mutex::new(StorageBlock::new(id, layout.clone())));
        let mut guard = self.blocks.lock();
        guard.insert(
            id,
            BlockSlot {
                block: Arc::clone(&block),
                pinned: true,
            },
        );
        Ok(BlockHandle {
            id,
            block,
            manager: Arc::clone(self),
        })
    }

    /// Load an existing block and pin it. Fails if the block is unknown
    /// or already checked out elsewhere.
    pub fn get_block(self: &Arc<Self>, id: BlockId) -> Result<BlockHandle> {
        let mut guard = self.blocks.lock();
        let slot = guard.get_mut(&id).ok_or_else(|| {
            StorageError::unavailable(format!("block {} is not known to the storage manager", id))
        })?;
        if slot.pinned {
            return Err(StorageError::unavailable(format!(
                "block {} is already checked out",
                id
            )));
        }
        slot.pinned = true;
        Ok(BlockHandle {
            id,
            block: Arc::clone(&slot.block),
            manager: Arc::clone(self),
        })
    }

    fn release(&self, id: BlockId) {
        let mut guard = self.blocks.lock();
        if let Some(slot) = guard.get_mut(&id) {
            debug_assert!(slot.pinned);
            slot.pinned = false;
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.lock().len()
    }

    /// Tuple count of a block, pinned or not. Read-only peek for
    /// operators that only need statistics.
    pub fn block_tuple_count(&self, id: BlockId) -> Option<usize> {
        let guard = self.blocks.lock();
        guard.get(&id).map(|slot| slot.block.lock().tuple_count())
    }
}

/// Exclusive, movable, non-copyable reference to one pinned block.
///
/// The pin transfers with the value; dropping the handle returns the
/// block to the manager unpinned.
pub struct BlockHandle {
    id: BlockId,
    block: Arc<Mutex<StorageBlock>>,
    manager: Arc<StorageManager>,
}

impl BlockHandle {
    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn insert_tuple(&self, tuple: &Tuple) -> bool {
        self.block.lock().insert_tuple(tuple)
    }

    pub fn insert_tuple_in_batch(&self, tuple: &Tuple) -> bool {
        self.block.lock().insert_tuple_in_batch(tuple)
    }

    pub fn bulk_insert_tuples(
        &self,
        accessor: &mut dyn ValueAccessor,
        attribute_map: Option<&[AttributeId]>,
    ) -> usize {
        self.block.lock().bulk_insert_tuples(accessor, attribute_map)
    }

    /// Finalize the block's slot directory before sealing.
    pub fn rebuild(&self) {
        self.block.lock().rebuild();
    }

    pub fn tuple_count(&self) -> usize {
        self.block.lock().tuple_count()
    }

    pub fn is_empty(&self) -> bool {
        self.block.lock().is_empty()
    }

    /// Snapshot of the block's tuples, for scans and diagnostics.
    pub fn tuples_snapshot(&self) -> Vec<Tuple> {
        self.block.lock().tuples().to_vec()
    }
}

impl Drop for BlockHandle {
    fn drop(&mut self) {
        self.manager.release(self.id);
    }
}
