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
//! Policies for routing produced tuples into storage blocks.
//!
//! Responsibilities:
//! - Checkout/return protocol handing exclusive block handles to worker
//!   threads, with per-tuple and bulk insert entry points on top.
//! - Sealing: a block that fills is rebuilt, logged as done, and
//!   announced to the foreman so downstream operators can consume it
//!   without waiting for the producer to finish.
//! - Three checkout policies behind one type: always-create, a
//!   first-fit pool of partially filled blocks, and a partition-aware
//!   pool with one lock per partition.
//!
//! Key exported interfaces:
//! - Types: `InsertDestination`, `RawBlockAccess`.
//!
//! Current limitations:
//! - Sorted insertion is owned by the run-building collaborator, which
//!   drives blocks directly through `RawBlockAccess`.
//! - `get_touched_blocks`/`get_partially_filled_blocks` are only
//!   defined on a quiesced destination; checked builds assert, release
//!   builds do not detect the race.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::partition_scheme::PartitionScheme;
use crate::catalog::relation::Relation;
use crate::common::ids::{AttributeId, BlockId, ClientId, PartitionId};
use crate::query_execution::message_bus::MessageBus;
use crate::query_execution::pipeline_notifier::PipelineNotifier;
use crate::stonework_logging::debug;
use crate::storage::block_layout::BlockLayout;
use crate::storage::descriptor::{InsertDestinationKind, InsertDestinationPb};
use crate::storage::error::{Result, StorageError};
use crate::storage::storage_manager::{BlockHandle, StorageManager};
use crate::types::tuple::Tuple;
use crate::types::value_accessor::{TupleVectorValueAccessor, ValueAccessor};

/// Pool of blocks available to one destination (or one partition of a
/// partition-aware destination).
#[derive(Default)]
struct BlockPoolState {
    // Loaded blocks ready for immediate insertion.
    available_refs: Vec<BlockHandle>,
    // Blocks known to belong to the relation but not loaded yet.
    available_ids: Vec<BlockId>,
    // Blocks sealed as full through this destination.
    done_ids: Vec<BlockId>,
}

struct PartitionAwareState {
    scheme: Arc<PartitionScheme>,
    // One lock per partition; a worker touches at most one at a time.
    partitions: Vec<Mutex<BlockPoolState>>,
    // Per-partition done ids are drained here so repeated touched-block
    // queries stay a single pass.
    all_done_ids: Mutex<Vec<BlockId>>,
}

enum InsertPolicy {
    /// Every checkout creates a fresh block; every return seals it.
    AlwaysCreate(Mutex<Vec<BlockId>>),
    /// First-fit reuse of partially filled blocks.
    BlockPool(Mutex<BlockPoolState>),
    /// Pool semantics applied per partition of the routing attribute.
    PartitionAware(PartitionAwareState),
}

/// Where the tuples produced by one relational operator go.
///
/// Many worker threads share one destination. All pool mutations happen
/// under short per-destination (or per-partition) mutexes; block I/O
/// through the storage manager may currently occur while the mutex is
/// held, which is the documented contention point of this type.
pub struct InsertDestination {
    storage_manager: Arc<StorageManager>,
    relation: Arc<Relation>,
    layout: BlockLayout,
    relational_op_index: u32,
    notifier: PipelineNotifier,
    policy: InsertPolicy,
    // Live checkouts; used to assert the quiesced-only contract of the
    // drain queries in checked builds.
    checked_out: AtomicUsize,
}

impl InsertDestination {
    pub fn always_create(
        storage_manager: Arc<StorageManager>,
        relation: Arc<Relation>,
        layout: Option<BlockLayout>,
        relational_op_index: u32,
        foreman_client_id: ClientId,
        bus: Arc<MessageBus>,
    ) -> Self {
        Self::with_policy(
            storage_manager,
            relation,
            layout,
            relational_op_index,
            foreman_client_id,
            bus,
            InsertPolicy::AlwaysCreate(Mutex::new(Vec::new())),
        )
    }

    pub fn block_pool(
        storage_manager: Arc<StorageManager>,
        relation: Arc<Relation>,
        layout: Option<BlockLayout>,
        relational_op_index: u32,
        foreman_client_id: ClientId,
        bus: Arc<MessageBus>,
    ) -> Self {
        Self::with_policy(
            storage_manager,
            relation,
            layout,
            relational_op_index,
            foreman_client_id,
            bus,
            InsertPolicy::BlockPool(Mutex::new(BlockPoolState::default())),
        )
    }

    pub fn partition_aware(
        storage_manager: Arc<StorageManager>,
        relation: Arc<Relation>,
        layout: Option<BlockLayout>,
        relational_op_index: u32,
        foreman_client_id: ClientId,
        bus: Arc<MessageBus>,
        scheme: Arc<PartitionScheme>,
    ) -> Self {
        let partitions = (0..scheme.num_partitions())
            .map(|_| Mutex::new(BlockPoolState::default()))
            .collect();
        Self::with_policy(
            storage_manager,
            relation,
            layout,
            relational_op_index,
            foreman_client_id,
            bus,
            InsertPolicy::PartitionAware(PartitionAwareState {
                scheme,
                partitions,
                all_done_ids: Mutex::new(Vec::new()),
            }),
        )
    }

    fn with_policy(
        storage_manager: Arc<StorageManager>,
        relation: Arc<Relation>,
        layout: Option<BlockLayout>,
        relational_op_index: u32,
        foreman_client_id: ClientId,
        bus: Arc<MessageBus>,
        policy: InsertPolicy,
    ) -> Self {
        let layout = layout.unwrap_or_else(|| relation.default_layout().clone());
        let notifier =
            PipelineNotifier::new(bus, foreman_client_id, relational_op_index, relation.id());
        Self {
            storage_manager,
            relation,
            layout,
            relational_op_index,
            notifier,
            policy,
            checked_out: AtomicUsize::new(0),
        }
    }

    /// Check that a serialized descriptor is fully formed against the
    /// target relation.
    pub fn proto_is_valid(proto: &InsertDestinationPb, relation: &Relation) -> bool {
        let Some(kind) = proto.kind.and_then(InsertDestinationKind::from_i32) else {
            return false;
        };
        if proto.relation_id != Some(relation.id().as_u32()) {
            return false;
        }
        if proto.relational_op_index.is_none() || proto.foreman_client_id.is_none() {
            return false;
        }
        if kind == InsertDestinationKind::PartitionAware {
            let Some(scheme) = proto.partition_scheme.as_ref() else {
                return false;
            };
            let Some(attr) = scheme.partitioning_attribute else {
                return false;
            };
            if !relation.has_attribute(AttributeId::new(attr)) {
                return false;
            }
            if scheme.num_partitions.unwrap_or(0) == 0 {
                return false;
            }
        }
        true
    }

    /// Build a destination from its serialized descriptor.
    pub fn reconstruct_from_proto(
        proto: &InsertDestinationPb,
        relation: Arc<Relation>,
        storage_manager: Arc<StorageManager>,
        bus: Arc<MessageBus>,
    ) -> Result<Self> {
        if !Self::proto_is_valid(proto, &relation) {
            return Err(StorageError::validation(format!(
                "malformed insert destination descriptor for relation {}",
                relation.id()
            )));
        }
        let kind = InsertDestinationKind::from_i32(proto.kind.expect("validated kind"))
            .expect("validated kind");
        let layout = proto
            .layout
            .as_ref()
            .and_then(|l| l.capacity_bytes)
            .map(BlockLayout::new);
        let relational_op_index = proto.relational_op_index.expect("validated op index");
        let foreman_client_id = ClientId::new(proto.foreman_client_id.expect("validated foreman"));
        Ok(match kind {
            InsertDestinationKind::AlwaysCreate => Self::always_create(
                storage_manager,
                relation,
                layout,
                relational_op_index,
                foreman_client_id,
                bus,
            ),
            InsertDestinationKind::BlockPool => Self::block_pool(
                storage_manager,
                relation,
                layout,
                relational_op_index,
                foreman_client_id,
                bus,
            ),
            InsertDestinationKind::PartitionAware => {
                let pb = proto.partition_scheme.as_ref().expect("validated scheme");
                let scheme = Arc::new(PartitionScheme::new(
                    AttributeId::new(pb.partitioning_attribute.expect("validated attribute")),
                    pb.num_partitions.expect("validated partition count"),
                ));
                Self::partition_aware(
                    storage_manager,
                    relation,
                    layout,
                    relational_op_index,
                    foreman_client_id,
                    bus,
                    scheme,
                )
            }
        })
    }

    pub fn relation(&self) -> &Arc<Relation> {
        &self.relation
    }

    pub fn relational_op_index(&self) -> u32 {
        self.relational_op_index
    }

    /// Routing attribute of the partition-aware policy; `None` for the
    /// unpartitioned policies.
    pub fn get_partitioning_attribute(&self) -> Option<AttributeId> {
        match &self.policy {
            InsertPolicy::PartitionAware(state) => Some(state.scheme.partitioning_attribute()),
            _ => None,
        }
    }

    /// Prime the pool with every block already recorded for the
    /// relation. Call once, before the first insert.
    pub fn add_all_blocks_from_relation(&self) {
        match &self.policy {
            InsertPolicy::AlwaysCreate(_) => {}
            InsertPolicy::BlockPool(state) => {
                let mut pool = state.lock();
                debug_assert!(pool.available_ids.is_empty() && pool.available_refs.is_empty());
                pool.available_ids.extend(self.relation.blocks());
            }
            InsertPolicy::PartitionAware(state) => {
                for (block, partition) in self.relation.blocks_with_partitions() {
                    let Some(partition) = partition else {
                        debug_assert!(false, "partitioned relation has unpartitioned block");
                        continue;
                    };
                    if let Some(pool) = state.partitions.get(partition.as_usize()) {
                        pool.lock().available_ids.push(block);
                    }
                }
            }
        }
    }

    /// Manually add one known block to a partition's pool. Call at most
    /// once per block, and not in combination with
    /// `add_all_blocks_from_relation`.
    pub fn add_block_to_pool(&self, block: BlockId, partition: PartitionId) {
        match &self.policy {
            InsertPolicy::PartitionAware(state) => {
                state.partitions[partition.as_usize()]
                    .lock()
                    .available_ids
                    .push(block);
            }
            _ => debug_assert!(false, "block pool by partition requires a partitioned policy"),
        }
    }

    /// Persist one tuple, sealing blocks that fill.
    pub fn insert_tuple(&self, tuple: &Tuple) -> Result<()> {
        self.insert_routed(tuple, false)
    }

    /// Persist one tuple without per-tuple slot-directory maintenance.
    /// The destination must be flushed (blocks rebuilt) before its
    /// blocks are sealed or scanned; the drain queries do this.
    pub fn insert_tuple_in_batch(&self, tuple: &Tuple) -> Result<()> {
        self.insert_routed(tuple, true)
    }

    fn insert_routed(&self, tuple: &Tuple, batch: bool) -> Result<()> {
        match &self.policy {
            InsertPolicy::PartitionAware(state) => {
                let partition = state.scheme.partition_for_tuple(tuple);
                self.insert_into_partition(tuple, batch, Some(partition))
            }
            _ => self.insert_into_partition(tuple, batch, None),
        }
    }

    fn insert_into_partition(
        &self,
        tuple: &Tuple,
        batch: bool,
        partition: Option<PartitionId>,
    ) -> Result<()> {
        let mut block = self.checkout(partition)?;
        loop {
            let accepted = if batch {
                block.insert_tuple_in_batch(tuple)
            } else {
                block.insert_tuple(tuple)
            };
            if accepted {
                break;
            }
            // An empty block refusing the tuple means no block ever fits it.
            if block.is_empty() {
                self.discard(block);
                return Err(StorageError::oversized_tuple(format!(
                    "tuple of {} bytes exceeds the capacity of an empty block of relation {}",
                    tuple.byte_size(),
                    self.relation.id()
                )));
            }
            block = self.seal_and_replace(block, partition)?;
        }
        self.give_back(block, false, partition)
    }

    /// Persist every tuple the accessor yields, from its current
    /// position to exhaustion. If `always_mark_full`, the final block
    /// is sealed regardless of fill level.
    pub fn bulk_insert_tuples(
        &self,
        accessor: &mut dyn ValueAccessor,
        always_mark_full: bool,
    ) -> Result<()> {
        match &self.policy {
            InsertPolicy::PartitionAware(_) => {
                self.bulk_insert_partitioned(None, accessor, always_mark_full)
            }
            _ => self.bulk_insert_pooled(None, accessor, always_mark_full, None),
        }
    }

    /// Like `bulk_insert_tuples`, but each tuple is first projected so
    /// that stored attribute `i` takes input attribute
    /// `attribute_map[i]`.
    pub fn bulk_insert_tuples_with_remapped_attributes(
        &self,
        attribute_map: &[AttributeId],
        accessor: &mut dyn ValueAccessor,
        always_mark_full: bool,
    ) -> Result<()> {
        match &self.policy {
            InsertPolicy::PartitionAware(_) => {
                self.bulk_insert_partitioned(Some(attribute_map), accessor, always_mark_full)
            }
            _ => self.bulk_insert_pooled(Some(attribute_map), accessor, always_mark_full, None),
        }
    }

    /// Bulk loop for one pool (the whole destination, or one partition
    /// with `partition` set): absorb as much of the accessor as each
    /// block takes, sealing every block that leaves the loop full.
    fn bulk_insert_pooled(
        &self,
        attribute_map: Option<&[AttributeId]>,
        accessor: &mut dyn ValueAccessor,
        always_mark_full: bool,
        partition: Option<PartitionId>,
    ) -> Result<()> {
        while !accessor.is_exhausted() {
            let block = self.checkout(partition)?;
            let inserted = block.bulk_insert_tuples(accessor, attribute_map);
            if inserted == 0 && block.is_empty() && !accessor.is_exhausted() {
                self.discard(block);
                return Err(StorageError::oversized_tuple(format!(
                    "tuple exceeds the capacity of an empty block of relation {}",
                    self.relation.id()
                )));
            }
            let full = !accessor.is_exhausted() || always_mark_full;
            self.give_back(block, full, partition)?;
        }
        Ok(())
    }

    /// Partition-aware bulk: split the accessor into per-partition runs
    /// in one pass (keeping accessor order within each partition), then
    /// run the pool loop per partition. `always_mark_full` applies per
    /// partition: each partition's final block is sealed.
    fn bulk_insert_partitioned(
        &self,
        attribute_map: Option<&[AttributeId]>,
        accessor: &mut dyn ValueAccessor,
        always_mark_full: bool,
    ) -> Result<()> {
        let InsertPolicy::PartitionAware(state) = &self.policy else {
            unreachable!("partitioned bulk insert on unpartitioned policy");
        };
        let num_partitions = state.scheme.num_partitions() as usize;
        let mut runs: Vec<Vec<Tuple>> = (0..num_partitions).map(|_| Vec::new()).collect();
        while accessor.next() {
            // Remapping happens before routing: the partitioning
            // attribute is positioned in the destination schema.
            let tuple = match attribute_map {
                Some(map) => accessor.current().project(map),
                None => accessor.current().clone(),
            };
            let partition = state.scheme.partition_for_tuple(&tuple);
            runs[partition.as_usize()].push(tuple);
        }
        for (partition, run) in runs.into_iter().enumerate() {
            if run.is_empty() {
                continue;
            }
            let mut sub_accessor = TupleVectorValueAccessor::new(run);
            self.bulk_insert_pooled(
                None,
                &mut sub_accessor,
                always_mark_full,
                Some(PartitionId::new(partition as u32)),
            )?;
        }
        Ok(())
    }

    /// Persist a slice of tuples with batch-mode bookkeeping, flushing
    /// the final block back to the pool at the end.
    pub fn insert_tuples_from_vector(&self, tuples: &[Tuple]) -> Result<()> {
        if tuples.is_empty() {
            return Ok(());
        }
        if matches!(self.policy, InsertPolicy::PartitionAware(_)) {
            for tuple in tuples {
                self.insert_tuple_in_batch(tuple)?;
            }
            return Ok(());
        }
        let mut block = self.checkout(None)?;
        for tuple in tuples {
            while !block.insert_tuple_in_batch(tuple) {
                if block.is_empty() {
                    self.discard(block);
                    return Err(StorageError::oversized_tuple(format!(
                        "tuple of {} bytes exceeds the capacity of an empty block of relation {}",
                        tuple.byte_size(),
                        self.relation.id()
                    )));
                }
                block = self.seal_and_replace(block, None)?;
            }
        }
        self.give_back(block, false, None)
    }

    /// Ids of every block sealed through this destination.
    ///
    /// Only defined on a quiesced destination: no concurrent inserters,
    /// all handles returned.
    pub fn get_touched_blocks(&self) -> Vec<BlockId> {
        debug_assert_eq!(
            self.checked_out.load(Ordering::Acquire),
            0,
            "touched-block query with checkouts in flight"
        );
        match &self.policy {
            InsertPolicy::AlwaysCreate(done) => done.lock().clone(),
            InsertPolicy::BlockPool(state) => state.lock().done_ids.clone(),
            InsertPolicy::PartitionAware(state) => {
                let mut all = state.all_done_ids.lock();
                for pool in &state.partitions {
                    all.append(&mut pool.lock().done_ids);
                }
                all.clone()
            }
        }
    }

    /// Transfer every unsealed available block to `out`, leaving the
    /// pool empty. Blocks written in batch mode are rebuilt on the way
    /// out. Same quiescence contract as `get_touched_blocks`.
    pub fn get_partially_filled_blocks(&self, out: &mut Vec<BlockHandle>) {
        debug_assert_eq!(
            self.checked_out.load(Ordering::Acquire),
            0,
            "partial-block drain with checkouts in flight"
        );
        match &self.policy {
            InsertPolicy::AlwaysCreate(_) => {}
            InsertPolicy::BlockPool(state) => {
                let mut pool = state.lock();
                Self::drain_partials(&mut pool, out);
            }
            InsertPolicy::PartitionAware(state) => {
                for pool in &state.partitions {
                    let mut pool = pool.lock();
                    Self::drain_partials(&mut pool, out);
                }
            }
        }
    }

    fn drain_partials(pool: &mut BlockPoolState, out: &mut Vec<BlockHandle>) {
        for handle in pool.available_refs.drain(..) {
            handle.rebuild();
            out.push(handle);
        }
    }

    /// Narrow checkout interface for the sorted-run builder, which
    /// controls block boundaries itself. Not available on
    /// partition-aware destinations.
    pub fn raw_block_access(&self) -> Result<RawBlockAccess<'_>> {
        if matches!(self.policy, InsertPolicy::PartitionAware(_)) {
            return Err(StorageError::validation(
                "raw block access requires an unpartitioned destination",
            ));
        }
        Ok(RawBlockAccess { destination: self })
    }

    fn checkout(&self, partition: Option<PartitionId>) -> Result<BlockHandle> {
        let handle = match (&self.policy, partition) {
            (InsertPolicy::AlwaysCreate(_), None) => self.create_new_block(None)?,
            (InsertPolicy::BlockPool(state), None) => {
                // Block load and creation happen under the pool mutex;
                // acceptable while checkout traffic is pool-bound.
                let mut pool = state.lock();
                self.checkout_pooled(&mut pool, None)?
            }
            (InsertPolicy::PartitionAware(state), Some(partition)) => {
                let mut pool = state.partitions[partition.as_usize()].lock();
                self.checkout_pooled(&mut pool, Some(partition))?
            }
            _ => {
                return Err(StorageError::validation(
                    "checkout does not match the destination's partitioning",
                ))
            }
        };
        self.checked_out.fetch_add(1, Ordering::AcqRel);
        Ok(handle)
    }

    fn checkout_pooled(
        &self,
        pool: &mut BlockPoolState,
        partition: Option<PartitionId>,
    ) -> Result<BlockHandle> {
        if let Some(handle) = pool.available_refs.pop() {
            return Ok(handle);
        }
        if let Some(id) = pool.available_ids.pop() {
            return self.storage_manager.get_block(id);
        }
        self.create_new_block(partition)
    }

    fn create_new_block(&self, partition: Option<PartitionId>) -> Result<BlockHandle> {
        let handle = self.storage_manager.create_block(&self.layout)?;
        match partition {
            Some(partition) => self
                .relation
                .add_block_in_partition(handle.id(), partition),
            None => self.relation.add_block(handle.id()),
        }
        self.notifier
            .notify_block_created(handle.id(), partition)
            .map_err(StorageError::bus_send)?;
        debug!(
            "created block {} for relation {} (partition {:?})",
            handle.id(),
            self.relation.id(),
            partition.map(|p| p.as_u32())
        );
        Ok(handle)
    }

    /// Seal `block` and hand back a replacement from the same pool.
    fn seal_and_replace(
        &self,
        block: BlockHandle,
        partition: Option<PartitionId>,
    ) -> Result<BlockHandle> {
        self.give_back(block, true, partition)?;
        self.checkout(partition)
    }

    /// Return a checked-out block. `full` seals it: rebuild, log as
    /// done, announce downstream, unpin. Otherwise the block goes back
    /// to the pool (the always-create policy seals regardless, having
    /// no pool to return to).
    fn give_back(
        &self,
        block: BlockHandle,
        full: bool,
        partition: Option<PartitionId>,
    ) -> Result<()> {
        self.checked_out.fetch_sub(1, Ordering::AcqRel);
        match (&self.policy, partition) {
            (InsertPolicy::AlwaysCreate(done), None) => self.seal(block, done),
            (InsertPolicy::BlockPool(state), None) => {
                if full {
                    self.seal_pooled(block, state)
                } else {
                    state.lock().available_refs.push(block);
                    Ok(())
                }
            }
            (InsertPolicy::PartitionAware(state), Some(partition)) => {
                let pool = &state.partitions[partition.as_usize()];
                if full {
                    self.seal_pooled(block, pool)
                } else {
                    pool.lock().available_refs.push(block);
                    Ok(())
                }
            }
            _ => Err(StorageError::validation(
                "returned block does not match the destination's partitioning",
            )),
        }
    }

    fn seal(&self, block: BlockHandle, done: &Mutex<Vec<BlockId>>) -> Result<()> {
        let id = block.id();
        block.rebuild();
        done.lock().push(id);
        self.notifier
            .notify_block_sealed(id)
            .map_err(StorageError::bus_send)?;
        debug!("sealed block {} of relation {}", id, self.relation.id());
        drop(block);
        Ok(())
    }

    fn seal_pooled(&self, block: BlockHandle, pool: &Mutex<BlockPoolState>) -> Result<()> {
        let id = block.id();
        block.rebuild();
        pool.lock().done_ids.push(id);
        self.notifier
            .notify_block_sealed(id)
            .map_err(StorageError::bus_send)?;
        debug!("sealed block {} of relation {}", id, self.relation.id());
        drop(block);
        Ok(())
    }

    /// Drop a handle obtained from `checkout` without returning it to
    /// any pool. Used on insert-error paths.
    fn discard(&self, block: BlockHandle) {
        self.checked_out.fetch_sub(1, Ordering::AcqRel);
        drop(block);
    }
}

/// Direct block checkout for the sorted-run builder.
///
/// Runs must land contiguously in blocks of the builder's choosing, so
/// the builder bypasses the tuple entry points and drives blocks
/// itself. Every checked-out block must still be returned.
pub struct RawBlockAccess<'a> {
    destination: &'a InsertDestination,
}

impl RawBlockAccess<'_> {
    pub fn checkout(&self) -> Result<BlockHandle> {
        self.destination.checkout(None)
    }

    pub fn return_block(&self, block: BlockHandle, full: bool) -> Result<()> {
        self.destination.give_back(block, full, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::relation::Attribute;
    use crate::common::ids::RelationId;
    use crate::query_execution::client_id_map::ClientIdMap;
    use crate::query_execution::message_types::QueryExecutionMessageType;
    use crate::storage::block_layout::{BLOCK_HEADER_BYTES, TUPLE_SLOT_BYTES};
    use crate::types::tuple::{Datum, TypeKind};

    struct Fixture {
        storage_manager: Arc<StorageManager>,
        relation: Arc<Relation>,
        bus: Arc<MessageBus>,
        foreman: ClientId,
    }

    fn layout_for_ints(tuples_per_block: u64) -> BlockLayout {
        BlockLayout::new(BLOCK_HEADER_BYTES + tuples_per_block * (TUPLE_SLOT_BYTES + 4))
    }

    fn fixture(tuples_per_block: u64) -> Fixture {
        let relation = Arc::new(
            Relation::new(
                RelationId::new(1),
                "r",
                vec![Attribute {
                    id: AttributeId::new(0),
                    name: "a".to_string(),
                    type_kind: TypeKind::Int,
                }],
            )
            .with_default_layout(layout_for_ints(tuples_per_block)),
        );
        let bus = Arc::new(MessageBus::new());
        let worker = bus.connect();
        let foreman = bus.connect();
        // Tests drive the destination from the current thread, which
        // plays the worker.
        if ClientIdMap::instance().lookup_current().is_none() {
            ClientIdMap::instance().register_current(worker);
        }
        Fixture {
            storage_manager: Arc::new(StorageManager::new()),
            relation,
            bus,
            foreman,
        }
    }

    fn drain_sealed(bus: &MessageBus, foreman: ClientId) -> Vec<BlockId> {
        let mut sealed = Vec::new();
        while let Some(msg) = bus.try_receive(foreman) {
            if msg.message.message_type == QueryExecutionMessageType::DataPipeline.as_code() {
                let decoded =
                    crate::query_execution::messages::DataPipelineMessage::decode(&msg.message.payload)
                        .expect("decode");
                sealed.push(decoded.block_id);
            }
        }
        sealed
    }

    fn int_tuple(v: i32) -> Tuple {
        Tuple::new(vec![Datum::Int(v)])
    }

    #[test]
    fn always_create_seals_every_returned_block() {
        let f = fixture(4);
        let dest = InsertDestination::always_create(
            Arc::clone(&f.storage_manager),
            Arc::clone(&f.relation),
            None,
            0,
            f.foreman,
            Arc::clone(&f.bus),
        );
        for i in 0..3 {
            dest.insert_tuple(&int_tuple(i)).expect("insert");
        }
        let touched = dest.get_touched_blocks();
        assert_eq!(touched.len(), 3);
        let mut partials = Vec::new();
        dest.get_partially_filled_blocks(&mut partials);
        assert!(partials.is_empty());
        let sealed = drain_sealed(&f.bus, f.foreman);
        assert_eq!(sealed, touched);
        ClientIdMap::instance().unregister_current();
    }

    #[test]
    fn block_pool_reuses_partial_blocks() {
        let f = fixture(4);
        let dest = InsertDestination::block_pool(
            Arc::clone(&f.storage_manager),
            Arc::clone(&f.relation),
            None,
            0,
            f.foreman,
            Arc::clone(&f.bus),
        );
        for i in 0..6 {
            dest.insert_tuple(&int_tuple(i)).expect("insert");
        }
        // 6 tuples over 4-tuple blocks: one sealed, one partial with 2.
        assert_eq!(dest.get_touched_blocks().len(), 1);
        let mut partials = Vec::new();
        dest.get_partially_filled_blocks(&mut partials);
        assert_eq!(partials.len(), 1);
        assert_eq!(partials[0].tuple_count(), 2);
        // The drain empties the pool.
        let mut again = Vec::new();
        dest.get_partially_filled_blocks(&mut again);
        assert!(again.is_empty());
        ClientIdMap::instance().unregister_current();
    }

    #[test]
    fn bulk_insert_seals_all_but_last_block() {
        let f = fixture(4);
        let dest = InsertDestination::block_pool(
            Arc::clone(&f.storage_manager),
            Arc::clone(&f.relation),
            None,
            0,
            f.foreman,
            Arc::clone(&f.bus),
        );
        let mut acc = TupleVectorValueAccessor::new((0..10).map(int_tuple).collect());
        dest.bulk_insert_tuples(&mut acc, false).expect("bulk");
        assert!(acc.is_exhausted());
        assert_eq!(dest.get_touched_blocks().len(), 2);
        let mut partials = Vec::new();
        dest.get_partially_filled_blocks(&mut partials);
        assert_eq!(partials.len(), 1);
        assert_eq!(partials[0].tuple_count(), 2);
        assert_eq!(drain_sealed(&f.bus, f.foreman).len(), 2);
        ClientIdMap::instance().unregister_current();
    }

    #[test]
    fn bulk_insert_always_mark_full_seals_final_block() {
        let f = fixture(4);
        let dest = InsertDestination::block_pool(
            Arc::clone(&f.storage_manager),
            Arc::clone(&f.relation),
            None,
            0,
            f.foreman,
            Arc::clone(&f.bus),
        );
        let mut acc = TupleVectorValueAccessor::new((0..10).map(int_tuple).collect());
        dest.bulk_insert_tuples(&mut acc, true).expect("bulk");
        assert_eq!(dest.get_touched_blocks().len(), 3);
        let mut partials = Vec::new();
        dest.get_partially_filled_blocks(&mut partials);
        assert!(partials.is_empty());
        assert_eq!(drain_sealed(&f.bus, f.foreman).len(), 3);
        ClientIdMap::instance().unregister_current();
    }

    #[test]
    fn batch_inserts_flush_through_partial_drain() {
        let f = fixture(4);
        let dest = InsertDestination::block_pool(
            Arc::clone(&f.storage_manager),
            Arc::clone(&f.relation),
            None,
            0,
            f.foreman,
            Arc::clone(&f.bus),
        );
        for i in 0..3 {
            dest.insert_tuple_in_batch(&int_tuple(i)).expect("insert");
        }
        let mut partials = Vec::new();
        dest.get_partially_filled_blocks(&mut partials);
        assert_eq!(partials.len(), 1);
        assert_eq!(partials[0].tuple_count(), 3);
        assert!(dest.get_touched_blocks().is_empty());
        ClientIdMap::instance().unregister_current();
    }

    #[test]
    fn oversized_tuple_is_reported_not_looped() {
        let f = fixture(2);
        let dest = InsertDestination::block_pool(
            Arc::clone(&f.storage_manager),
            Arc::clone(&f.relation),
            None,
            0,
            f.foreman,
            Arc::clone(&f.bus),
        );
        let huge = Tuple::new(vec![Datum::Varchar("x".repeat(4096))]);
        let err = dest.insert_tuple(&huge).expect_err("oversized");
        assert_eq!(err.kind, crate::storage::error::StorageErrorKind::OversizedTuple);
        ClientIdMap::instance().unregister_current();
    }

    #[test]
    fn descriptor_reconstruction_matches_direct_construction() {
        let f = fixture(4);
        let proto = InsertDestinationPb {
            kind: Some(InsertDestinationKind::BlockPool as i32),
            relation_id: Some(f.relation.id().as_u32()),
            layout: None,
            relational_op_index: Some(7),
            foreman_client_id: Some(f.foreman.as_u32()),
            partition_scheme: None,
        };
        assert!(InsertDestination::proto_is_valid(&proto, &f.relation));
        let dest = InsertDestination::reconstruct_from_proto(
            &proto,
            Arc::clone(&f.relation),
            Arc::clone(&f.storage_manager),
            Arc::clone(&f.bus),
        )
        .expect("reconstruct");
        assert_eq!(dest.relational_op_index(), 7);
        assert_eq!(dest.get_partitioning_attribute(), None);
        ClientIdMap::instance().unregister_current();
    }

    #[test]
    fn partition_aware_descriptor_requires_scheme() {
        let f = fixture(4);
        let mut proto = InsertDestinationPb {
            kind: Some(InsertDestinationKind::PartitionAware as i32),
            relation_id: Some(f.relation.id().as_u32()),
            layout: None,
            relational_op_index: Some(0),
            foreman_client_id: Some(f.foreman.as_u32()),
            partition_scheme: None,
        };
        assert!(!InsertDestination::proto_is_valid(&proto, &f.relation));
        proto.partition_scheme = Some(crate::storage::descriptor::PartitionSchemePb {
            partitioning_attribute: Some(9),
            num_partitions: Some(4),
        });
        // Partitioning attribute outside the schema is still invalid.
        assert!(!InsertDestination::proto_is_valid(&proto, &f.relation));
        ClientIdMap::instance().unregister_current();
    }

    #[test]
    fn raw_block_access_refuses_partitioned_destinations() {
        let f = fixture(4);
        let scheme = Arc::new(PartitionScheme::new(AttributeId::new(0), 2));
        let dest = InsertDestination::partition_aware(
            Arc::clone(&f.storage_manager),
            Arc::clone(&f.relation),
            None,
            0,
            f.foreman,
            Arc::clone(&f.bus),
            scheme,
        );
        assert!(dest.raw_block_access().is_err());
        ClientIdMap::instance().unregister_current();
    }

    #[test]
    fn raw_block_access_checkout_and_return() {
        let f = fixture(4);
        let dest = InsertDestination::block_pool(
            Arc::clone(&f.storage_manager),
            Arc::clone(&f.relation),
            None,
            0,
            f.foreman,
            Arc::clone(&f.bus),
        );
        let access = dest.raw_block_access().expect("access");
        let block = access.checkout().expect("checkout");
        assert!(block.insert_tuple(&int_tuple(1)));
        access.return_block(block, true).expect("return");
        assert_eq!(dest.get_touched_blocks().len(), 1);
        ClientIdMap::instance().unregister_current();
    }
}
