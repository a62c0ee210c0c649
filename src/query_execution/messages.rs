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
//! Wire payloads for insert-destination announcements to the foreman.
//!
//! Both payloads are fixed-width little-endian records; the message-type
//! code travels in the bus envelope, not in the payload.

use crate::common::ids::{BlockId, PartitionId, RelationId};

/// Sentinel for "no partition" in the new-block payload.
const NO_PARTITION: u32 = u32::MAX;

/// "Block B of relation R from operator op is sealed."
///
/// Layout: `operator_index : u32 | relation_id : u32 | block_id : u64`,
/// all little-endian, 16 bytes total.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DataPipelineMessage {
    pub operator_index: u32,
    pub relation_id: RelationId,
    pub block_id: BlockId,
}

impl DataPipelineMessage {
    pub const ENCODED_LEN: usize = 16;

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut buf = [0u8; Self::ENCODED_LEN];
        buf[0..4].copy_from_slice(&self.operator_index.to_le_bytes());
        buf[4..8].copy_from_slice(&self.relation_id.as_u32().to_le_bytes());
        buf[8..16].copy_from_slice(&self.block_id.as_u64().to_le_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(format!(
                "invalid data pipeline payload: expected {} bytes, got {}",
                Self::ENCODED_LEN,
                bytes.len()
            ));
        }
        let operator_index = u32::from_le_bytes(
            bytes[0..4]
                .try_into()
                .map_err(|_| "decode operator index failed".to_string())?,
        );
        let relation_id = u32::from_le_bytes(
            bytes[4..8]
                .try_into()
                .map_err(|_| "decode relation id failed".to_string())?,
        );
        let block_id = u64::from_le_bytes(
            bytes[8..16]
                .try_into()
                .map_err(|_| "decode block id failed".to_string())?,
        );
        Ok(Self {
            operator_index,
            relation_id: RelationId::new(relation_id),
            block_id: BlockId::new(block_id),
        })
    }
}

/// "Relation R grew a new block B (in partition P, if partitioned)."
///
/// Layout: `relation_id : u32 | block_id : u64 | partition_id : u32`,
/// little-endian; `partition_id` is `u32::MAX` for unpartitioned
/// relations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RelationNewBlockMessage {
    pub relation_id: RelationId,
    pub block_id: BlockId,
    pub partition_id: Option<PartitionId>,
}

impl RelationNewBlockMessage {
    pub const ENCODED_LEN: usize = 16;

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut buf = [0u8; Self::ENCODED_LEN];
        buf[0..4].copy_from_slice(&self.relation_id.as_u32().to_le_bytes());
        buf[4..12].copy_from_slice(&self.block_id.as_u64().to_le_bytes());
        let partition = self
            .partition_id
            .map(PartitionId::as_u32)
            .unwrap_or(NO_PARTITION);
        buf[12..16].copy_from_slice(&partition.to_le_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(format!(
                "invalid relation new block payload: expected {} bytes, got {}",
                Self::ENCODED_LEN,
                bytes.len()
            ));
        }
        let relation_id = u32::from_le_bytes(
            bytes[0..4]
                .try_into()
                .map_err(|_| "decode relation id failed".to_string())?,
        );
        let block_id = u64::from_le_bytes(
            bytes[4..12]
                .try_into()
                .map_err(|_| "decode block id failed".to_string())?,
        );
        let partition = u32::from_le_bytes(
            bytes[12..16]
                .try_into()
                .map_err(|_| "decode partition id failed".to_string())?,
        );
        Ok(Self {
            relation_id: RelationId::new(relation_id),
            block_id: BlockId::new(block_id),
            partition_id: (partition != NO_PARTITION).then(|| PartitionId::new(partition)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_pipeline_payload_round_trips() {
        let msg = DataPipelineMessage {
            operator_index: 3,
            relation_id: RelationId::new(17),
            block_id: BlockId::new(0xDEAD_BEEF_CAFE),
        };
        let decoded = DataPipelineMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn data_pipeline_payload_is_little_endian() {
        let msg = DataPipelineMessage {
            operator_index: 1,
            relation_id: RelationId::new(2),
            block_id: BlockId::new(3),
        };
        let bytes = msg.encode();
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
        assert_eq!(&bytes[8..16], &[3, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn new_block_payload_encodes_missing_partition_as_sentinel() {
        let msg = RelationNewBlockMessage {
            relation_id: RelationId::new(5),
            block_id: BlockId::new(9),
            partition_id: None,
        };
        let bytes = msg.encode();
        assert_eq!(&bytes[12..16], &[0xFF, 0xFF, 0xFF, 0xFF]);
        let decoded = RelationNewBlockMessage::decode(&bytes).unwrap();
        assert_eq!(decoded.partition_id, None);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        assert!(DataPipelineMessage::decode(&[0u8; 15]).is_err());
        assert!(RelationNewBlockMessage::decode(&[0u8; 17]).is_err());
    }
}
