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
//! Relation schema as seen by the storage layer: ordered attributes, a
//! default block layout, an optional partition scheme, and the directory
//! of blocks known to belong to the relation.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::partition_scheme::PartitionScheme;
use crate::common::ids::{AttributeId, BlockId, PartitionId, RelationId};
use crate::storage::block_layout::BlockLayout;
use crate::types::tuple::TypeKind;

/// One attribute of a relation.
#[derive(Clone, Debug)]
pub struct Attribute {
    pub id: AttributeId,
    pub name: String,
    pub type_kind: TypeKind,
}

#[derive(Copy, Clone, Debug)]
struct BlockDirectoryEntry {
    id: BlockId,
    partition: Option<PartitionId>,
}

/// Borrowed, read-only schema plus the relation's block directory.
///
/// The block directory is the only mutable part: insert destinations
/// append to it as blocks are created, recording each block's home
/// partition when the relation is partitioned.
pub struct Relation {
    id: RelationId,
    name: String,
    attributes: Vec<Attribute>,
    default_layout: BlockLayout,
    partition_scheme: Option<Arc<PartitionScheme>>,
    blocks: Mutex<Vec<BlockDirectoryEntry>>,
}

impl Relation {
    pub fn new(id: RelationId, name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            id,
            name: name.into(),
            attributes,
            default_layout: BlockLayout::default(),
            partition_scheme: None,
            blocks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default_layout(mut self, layout: BlockLayout) -> Self {
        self.default_layout = layout;
        self
    }

    pub fn with_partition_scheme(mut self, scheme: PartitionScheme) -> Self {
        self.partition_scheme = Some(Arc::new(scheme));
        self
    }

    pub fn id(&self) -> RelationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    pub fn has_attribute(&self, id: AttributeId) -> bool {
        id.as_usize() < self.attributes.len()
    }

    pub fn attribute(&self, id: AttributeId) -> Option<&Attribute> {
        self.attributes.get(id.as_usize())
    }

    pub fn default_layout(&self) -> &BlockLayout {
        &self.default_layout
    }

    pub fn partition_scheme(&self) -> Option<&Arc<PartitionScheme>> {
        self.partition_scheme.as_ref()
    }

    /// Record a block of an unpartitioned relation.
    pub fn add_block(&self, block: BlockId) {
        self.blocks.lock().push(BlockDirectoryEntry {
            id: block,
            partition: None,
        });
    }

    /// Record a block together with its home partition.
    pub fn add_block_in_partition(&self, block: BlockId, partition: PartitionId) {
        self.blocks.lock().push(BlockDirectoryEntry {
            id: block,
            partition: Some(partition),
        });
    }

    /// Block ids of this relation, in insertion order.
    pub fn blocks(&self) -> Vec<BlockId> {
        self.blocks.lock().iter().map(|e| e.id).collect()
    }

    /// Block ids with their home partitions, in insertion order.
    pub fn blocks_with_partitions(&self) -> Vec<(BlockId, Option<PartitionId>)> {
        self.blocks
            .lock()
            .iter()
            .map(|e| (e.id, e.partition))
            .collect()
    }
}
