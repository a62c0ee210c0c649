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
//! In-process typed message bus.
//!
//! Every registered client owns a mailbox. `send` is non-blocking and
//! preserves order per sender/receiver pair; `receive` blocks until a
//! message arrives or the optional timeout elapses.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::common::ids::ClientId;
use crate::query_execution::message_types::QueryExecutionMessageType;

/// A payload tagged with its reserved message-type code.
#[derive(Clone, Debug)]
pub struct TaggedMessage {
    pub message_type: u32,
    pub payload: Vec<u8>,
}

impl TaggedMessage {
    pub fn new(message_type: QueryExecutionMessageType, payload: Vec<u8>) -> Self {
        Self {
            message_type: message_type.as_code(),
            payload,
        }
    }
}

/// A delivered message annotated with its sender.
#[derive(Clone, Debug)]
pub struct AnnotatedMessage {
    pub sender: ClientId,
    pub message: TaggedMessage,
}

struct Mailbox {
    mu: Mutex<VecDeque<AnnotatedMessage>>,
    cv: Condvar,
}

impl Mailbox {
    fn new() -> Self {
        Self {
            mu: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
        }
    }
}

pub struct MessageBus {
    clients: Mutex<HashMap<ClientId, Arc<Mailbox>>>,
    next_client_id: AtomicU32,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_client_id: AtomicU32::new(1),
        }
    }

    /// Register a client and allocate its id.
    pub fn connect(&self) -> ClientId {
        let id = ClientId::new(self.next_client_id.fetch_add(1, Ordering::Relaxed));
        let mut guard = self.clients.lock().expect("bus clients lock");
        guard.insert(id, Arc::new(Mailbox::new()));
        id
    }

    /// Drop a client and its undelivered messages.
    pub fn disconnect(&self, client: ClientId) {
        let mut guard = self.clients.lock().expect("bus clients lock");
        guard.remove(&client);
    }

    fn mailbox(&self, client: ClientId) -> Option<Arc<Mailbox>> {
        let guard = self.clients.lock().expect("bus clients lock");
        guard.get(&client).cloned()
    }

    /// Enqueue a message into the receiver's mailbox. Non-blocking;
    /// messages between one sender/receiver pair are delivered in send
    /// order.
    pub fn send(
        &self,
        sender: ClientId,
        receiver: ClientId,
        message: TaggedMessage,
    ) -> Result<(), String> {
        let mailbox = self
            .mailbox(receiver)
            .ok_or_else(|| format!("bus receiver {} is not connected", receiver))?;
        let mut queue = mailbox.mu.lock().expect("mailbox lock");
        queue.push_back(AnnotatedMessage { sender, message });
        mailbox.cv.notify_all();
        Ok(())
    }

    /// Pop the next message without waiting.
    pub fn try_receive(&self, client: ClientId) -> Option<AnnotatedMessage> {
        let mailbox = self.mailbox(client)?;
        let mut queue = mailbox.mu.lock().expect("mailbox lock");
        queue.pop_front()
    }

    /// Block until a message arrives or `timeout` elapses.
    pub fn receive_timeout(&self, client: ClientId, timeout: Duration) -> Option<AnnotatedMessage> {
        let mailbox = self.mailbox(client)?;
        let start = Instant::now();
        let mut queue = mailbox.mu.lock().expect("mailbox lock");
        loop {
            if let Some(message) = queue.pop_front() {
                return Some(message);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return None;
            }
            let (guard, _) = mailbox
                .cv
                .wait_timeout(queue, timeout - elapsed)
                .expect("mailbox wait");
            queue = guard;
        }
    }
}
