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
use crate::common::config;

/// Fixed per-block header: block metadata written ahead of the first
/// tuple slot.
pub const BLOCK_HEADER_BYTES: u64 = 64;

/// Per-tuple slot-directory entry.
pub const TUPLE_SLOT_BYTES: u64 = 8;

/// Physical description stamped onto newly created blocks.
///
/// A destination uses the layout from its descriptor when present,
/// otherwise the relation's default layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockLayout {
    capacity_bytes: u64,
}

impl BlockLayout {
    pub fn new(capacity_bytes: u64) -> Self {
        debug_assert!(capacity_bytes > BLOCK_HEADER_BYTES + TUPLE_SLOT_BYTES);
        Self { capacity_bytes }
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    /// Bytes available for tuple slots and tuple data.
    pub fn usable_bytes(&self) -> u64 {
        self.capacity_bytes.saturating_sub(BLOCK_HEADER_BYTES)
    }
}

impl Default for BlockLayout {
    fn default() -> Self {
        Self::new(config::default_block_capacity_bytes())
    }
}
