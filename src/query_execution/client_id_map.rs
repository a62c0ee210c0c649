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
//! Process-wide thread-id to bus-client-id registry.
//!
//! Insert destinations send pipeline announcements from deep inside the
//! storage stack, far below the worker's entry point, so the sending
//! thread's bus client id cannot be threaded through every call
//! signature. Workers register here on start and unregister on exit;
//! the send site looks the id up by the calling thread.
//!
//! Ordering: the registry outlives every worker. It is created lazily
//! before the first worker registers and is never torn down within a
//! process; a worker must unregister before its thread exits.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::thread::{self, ThreadId};

use crate::common::ids::ClientId;

pub struct ClientIdMap {
    inner: Mutex<HashMap<ThreadId, ClientId>>,
}

static INSTANCE: OnceLock<ClientIdMap> = OnceLock::new();

impl ClientIdMap {
    pub fn instance() -> &'static ClientIdMap {
        INSTANCE.get_or_init(|| ClientIdMap {
            inner: Mutex::new(HashMap::new()),
        })
    }

    /// Bind the calling thread to its bus client id. Called once by a
    /// worker before it starts executing work orders.
    pub fn register_current(&self, client: ClientId) {
        let mut guard = self.inner.lock().expect("client id map lock");
        let previous = guard.insert(thread::current().id(), client);
        debug_assert!(previous.is_none(), "thread registered twice");
    }

    /// Client id of the calling thread, if registered.
    pub fn lookup_current(&self) -> Option<ClientId> {
        let guard = self.inner.lock().expect("client id map lock");
        guard.get(&thread::current().id()).copied()
    }

    /// Remove the calling thread's binding. Called by a worker on exit.
    pub fn unregister_current(&self) {
        let mut guard = self.inner.lock().expect("client id map lock");
        guard.remove(&thread::current().id());
    }
}
