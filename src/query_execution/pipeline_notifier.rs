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
//! Foreman-facing announcements for one insert destination.
//!
//! The notifier resolves the sending worker's bus client id through the
//! process-wide `ClientIdMap` at each send, because different worker
//! threads drive the same destination. A rejected send is retried once;
//! the second rejection is surfaced to the caller, which aborts the
//! query (a dropped announcement would stall the foreman).

use std::sync::Arc;

use crate::common::ids::{BlockId, ClientId, PartitionId, RelationId};
use crate::query_execution::client_id_map::ClientIdMap;
use crate::query_execution::message_bus::{MessageBus, TaggedMessage};
use crate::query_execution::message_types::QueryExecutionMessageType;
use crate::query_execution::messages::{DataPipelineMessage, RelationNewBlockMessage};
use crate::stonework_logging::warn;

pub struct PipelineNotifier {
    bus: Arc<MessageBus>,
    foreman_client_id: ClientId,
    operator_index: u32,
    relation_id: RelationId,
}

impl PipelineNotifier {
    pub fn new(
        bus: Arc<MessageBus>,
        foreman_client_id: ClientId,
        operator_index: u32,
        relation_id: RelationId,
    ) -> Self {
        Self {
            bus,
            foreman_client_id,
            operator_index,
            relation_id,
        }
    }

    pub fn foreman_client_id(&self) -> ClientId {
        self.foreman_client_id
    }

    /// Announce a sealed block so downstream operators can start
    /// consuming it.
    pub fn notify_block_sealed(&self, block_id: BlockId) -> Result<(), String> {
        let payload = DataPipelineMessage {
            operator_index: self.operator_index,
            relation_id: self.relation_id,
            block_id,
        }
        .encode();
        self.send_with_retry(QueryExecutionMessageType::DataPipeline, payload.to_vec())
    }

    /// Announce a freshly created block so the catalog's block directory
    /// on the foreman side stays current.
    pub fn notify_block_created(
        &self,
        block_id: BlockId,
        partition_id: Option<PartitionId>,
    ) -> Result<(), String> {
        let payload = RelationNewBlockMessage {
            relation_id: self.relation_id,
            block_id,
            partition_id,
        }
        .encode();
        self.send_with_retry(
            QueryExecutionMessageType::CatalogRelationNewBlock,
            payload.to_vec(),
        )
    }

    fn send_with_retry(
        &self,
        message_type: QueryExecutionMessageType,
        payload: Vec<u8>,
    ) -> Result<(), String> {
        let sender = ClientIdMap::instance()
            .lookup_current()
            .ok_or_else(|| "sending thread has no registered bus client id".to_string())?;
        let first = self.bus.send(
            sender,
            self.foreman_client_id,
            TaggedMessage {
                message_type: message_type.as_code(),
                payload: payload.clone(),
            },
        );
        let Err(err) = first else {
            return Ok(());
        };
        warn!(
            "pipeline send rejected, retrying once: relation={} operator={} error={}",
            self.relation_id, self.operator_index, err
        );
        self.bus.send(
            sender,
            self.foreman_client_id,
            TaggedMessage {
                message_type: message_type.as_code(),
                payload,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_execution::messages::DataPipelineMessage;

    #[test]
    fn sealed_announcement_reaches_foreman() {
        let bus = Arc::new(MessageBus::new());
        let worker = bus.connect();
        let foreman = bus.connect();
        ClientIdMap::instance().register_current(worker);

        let notifier = PipelineNotifier::new(Arc::clone(&bus), foreman, 2, RelationId::new(8));
        notifier
            .notify_block_sealed(BlockId::new(41))
            .expect("notify");

        let msg = bus.try_receive(foreman).expect("message");
        assert_eq!(msg.sender, worker);
        assert_eq!(
            msg.message.message_type,
            QueryExecutionMessageType::DataPipeline.as_code()
        );
        let decoded = DataPipelineMessage::decode(&msg.message.payload).expect("decode");
        assert_eq!(decoded.block_id, BlockId::new(41));
        assert_eq!(decoded.operator_index, 2);

        ClientIdMap::instance().unregister_current();
    }

    #[test]
    fn unregistered_thread_cannot_send() {
        let bus = Arc::new(MessageBus::new());
        let foreman = bus.connect();
        let notifier = PipelineNotifier::new(Arc::clone(&bus), foreman, 0, RelationId::new(1));
        assert!(notifier.notify_block_sealed(BlockId::new(1)).is_err());
    }
}
