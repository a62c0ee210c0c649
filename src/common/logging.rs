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
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use chrono::Local;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};

use crate::query_execution::client_id_map::ClientIdMap;

static INIT: OnceLock<()> = OnceLock::new();

// Stable tag for threads that never register a bus client id (the
// foreman, tests, short-lived helpers).
static NEXT_THREAD_TAG: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TAG: u64 = NEXT_THREAD_TAG.fetch_add(1, Ordering::Relaxed);
}

fn glog_level(level: &tracing::Level) -> char {
    match *level {
        tracing::Level::ERROR => 'E',
        tracing::Level::WARN => 'W',
        tracing::Level::INFO => 'I',
        tracing::Level::DEBUG => 'D',
        tracing::Level::TRACE => 'T',
    }
}

/// Single-line events in the engine's glog shape:
/// `Lyyyymmdd hh:mm:ss.uuuuuu tag file:line] message`.
///
/// The tag names the emitting thread. Worker threads registered in the
/// `ClientIdMap` are tagged `c<bus client id>`, so a log line from deep
/// in the storage stack can be matched to the pipeline messages the
/// same thread sends; unregistered threads get a process-local
/// `t<seq>`.
struct GlogFormatter;

impl<S, N> FormatEvent<S, N> for GlogFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        write!(
            writer,
            "{}{} ",
            glog_level(metadata.level()),
            Local::now().format("%Y%m%d %H:%M:%S%.6f"),
        )?;

        match ClientIdMap::instance().lookup_current() {
            Some(client) => write!(writer, "c{} ", client)?,
            None => THREAD_TAG.with(|tag| write!(writer, "t{} ", tag))?,
        }

        write!(
            writer,
            "{}:{}] ",
            metadata.file().unwrap_or("unknown"),
            metadata.line().unwrap_or(0)
        )?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

pub fn init_with_level(level: &str) {
    INIT.get_or_init(|| {
        // Build filter directly from the provided level/filter string. The
        // caller (via config) is responsible for per-target filters.
        let env_filter = EnvFilter::new(level);

        // Emit ANSI colors only when stderr is a terminal; redirected logs
        // must stay free of escape codes.
        let use_ansi = atty::is(atty::Stream::Stderr);
        let _ = tracing_fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(use_ansi)
            .event_format(GlogFormatter)
            .try_init();
    });
}

pub fn init() {
    init_with_level("info");
}

/// Initialize with the filter expression from the process config,
/// falling back to `info` when no config is loadable.
pub fn init_from_config() {
    let filter = crate::common::app_config::config()
        .map(|c| c.log_filter_expression().to_string())
        .unwrap_or_else(|_| "info".to_string());
    init_with_level(&filter);
}

pub use tracing::instrument;
pub use tracing::{debug, error, info, trace, warn};

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn level_chars_follow_glog() {
        assert_eq!(glog_level(&tracing::Level::ERROR), 'E');
        assert_eq!(glog_level(&tracing::Level::WARN), 'W');
        assert_eq!(glog_level(&tracing::Level::TRACE), 'T');
    }

    #[test]
    fn fallback_thread_tags_are_distinct() {
        let mine = THREAD_TAG.with(|tag| *tag);
        let other = thread::spawn(|| THREAD_TAG.with(|tag| *tag))
            .join()
            .expect("join");
        assert_ne!(mine, other);
    }
}
