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
//! Shared fixtures for insert-destination integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use stonework::stonework_logging;

use stonework::catalog::relation::{Attribute, Relation};
use stonework::common::ids::{AttributeId, BlockId, ClientId, RelationId};
use stonework::query_execution::client_id_map::ClientIdMap;
use stonework::query_execution::message_bus::MessageBus;
use stonework::query_execution::message_types::QueryExecutionMessageType;
use stonework::query_execution::messages::DataPipelineMessage;
use stonework::storage::block_layout::{BlockLayout, BLOCK_HEADER_BYTES, TUPLE_SLOT_BYTES};
use stonework::storage::storage_manager::StorageManager;
use stonework::types::tuple::{Datum, Tuple, TypeKind};

pub struct TestRig {
    pub storage_manager: Arc<StorageManager>,
    pub bus: Arc<MessageBus>,
    pub worker: ClientId,
    pub foreman: ClientId,
}

impl TestRig {
    /// Build the shared collaborators and register the calling thread
    /// as the worker.
    pub fn new() -> Self {
        stonework_logging::init_with_level("warn");
        let bus = Arc::new(MessageBus::new());
        let worker = bus.connect();
        let foreman = bus.connect();
        ClientIdMap::instance().register_current(worker);
        Self {
            storage_manager: Arc::new(StorageManager::new()),
            bus,
            worker,
            foreman,
        }
    }

    /// Pop every queued foreman message, returning the sealed block ids
    /// from data-pipeline announcements in arrival order.
    pub fn drain_sealed_announcements(&self) -> Vec<BlockId> {
        let mut sealed = Vec::new();
        while let Some(msg) = self.bus.try_receive(self.foreman) {
            if msg.message.message_type == QueryExecutionMessageType::DataPipeline.as_code() {
                let decoded =
                    DataPipelineMessage::decode(&msg.message.payload).expect("pipeline payload");
                sealed.push(decoded.block_id);
            }
        }
        sealed
    }
}

impl Drop for TestRig {
    fn drop(&mut self) {
        ClientIdMap::instance().unregister_current();
    }
}

/// Layout sized for exactly `tuples_per_block` single-int tuples.
pub fn int_block_layout(tuples_per_block: u64) -> BlockLayout {
    BlockLayout::new(BLOCK_HEADER_BYTES + tuples_per_block * (TUPLE_SLOT_BYTES + 4))
}

/// Layout sized for `tuples_per_block` two-int tuples.
pub fn int_pair_block_layout(tuples_per_block: u64) -> BlockLayout {
    BlockLayout::new(BLOCK_HEADER_BYTES + tuples_per_block * (TUPLE_SLOT_BYTES + 8))
}

pub fn single_int_relation(id: u32, tuples_per_block: u64) -> Arc<Relation> {
    Arc::new(
        Relation::new(
            RelationId::new(id),
            "r",
            vec![Attribute {
                id: AttributeId::new(0),
                name: "a".to_string(),
                type_kind: TypeKind::Int,
            }],
        )
        .with_default_layout(int_block_layout(tuples_per_block)),
    )
}

pub fn int_pair_attributes() -> Vec<Attribute> {
    vec![
        Attribute {
            id: AttributeId::new(0),
            name: "a".to_string(),
            type_kind: TypeKind::Int,
        },
        Attribute {
            id: AttributeId::new(1),
            name: "p".to_string(),
            type_kind: TypeKind::Int,
        },
    ]
}

pub fn int_tuple(v: i32) -> Tuple {
    Tuple::new(vec![Datum::Int(v)])
}

pub fn int_pair_tuple(a: i32, p: i32) -> Tuple {
    Tuple::new(vec![Datum::Int(a), Datum::Int(p)])
}
