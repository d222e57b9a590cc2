/*
 * Licensed to the Apache Software Foundation (ASF) under one or more
 * contributor license agreements.  See the NOTICE file distributed with
 * this work for additional information regarding copyright ownership.
 * The ASF licenses this file to You under the Apache License, Version 2.0
 * (the "License"); you may not use this file except in compliance with
 * the License.  You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use quill_base::Url;
use quill_logger::tracing::warn;

static SERVICE_STATISTICS: Lazy<DashMap<String, Arc<RpcStatus>>> = Lazy::new(DashMap::new);
static METHOD_STATISTICS: Lazy<DashMap<String, Arc<RpcStatus>>> = Lazy::new(DashMap::new);

/// Live call statistics for one service or one (service, method) pair.
/// Records are created on first reference and live for the process; all
/// counters are plain atomics so readers never block writers.
#[derive(Debug, Default)]
pub struct RpcStatus {
    values: DashMap<String, String>,
    active: AtomicUsize,
    total: AtomicUsize,
    failed: AtomicUsize,
    total_elapsed: AtomicU64,
    failed_elapsed: AtomicU64,
    max_elapsed: AtomicU64,
    failed_max_elapsed: AtomicU64,
    succeeded_max_elapsed: AtomicU64,
}

impl RpcStatus {
    /// Statistics record for the instance as a whole. The `entry` call is the
    /// publication point: concurrent first references race on one shard lock
    /// and all of them leave holding the same record.
    pub fn get_status(url: &Url) -> Arc<RpcStatus> {
        SERVICE_STATISTICS
            .entry(url.to_identity_string())
            .or_default()
            .clone()
    }

    pub fn get_method_status(url: &Url, method_name: &str) -> Arc<RpcStatus> {
        METHOD_STATISTICS
            .entry(url.to_identity_string_with_method(method_name))
            .or_default()
            .clone()
    }

    pub fn remove_status(url: &Url) {
        SERVICE_STATISTICS.remove(&url.to_identity_string());
    }

    pub fn remove_method_status(url: &Url, method_name: &str) {
        METHOD_STATISTICS.remove(&url.to_identity_string_with_method(method_name));
    }

    /// Marks one call in flight on both the instance record and the method
    /// record. Must be paired with exactly one `end_invoke`; prefer `begin`,
    /// whose guard cannot forget the pairing.
    pub fn begin_invoke(url: &Url, method_name: &str) {
        Self::get_status(url).incr_active();
        Self::get_method_status(url, method_name).incr_active();
    }

    pub fn end_invoke(url: &Url, method_name: &str, elapsed_millis: u64, succeeded: bool) {
        Self::get_status(url).complete(elapsed_millis, succeeded);
        Self::get_method_status(url, method_name).complete(elapsed_millis, succeeded);
    }

    /// Brackets one call with an RAII guard. The guard measures elapsed time
    /// itself; dropping it without `succeed` records the call as failed, so
    /// the active counter comes back down on every exit path.
    pub fn begin(url: &Url, method_name: &str) -> ActiveGuard {
        Self::begin_invoke(url, method_name);
        ActiveGuard {
            url: url.clone(),
            method_name: method_name.to_string(),
            start: Instant::now(),
            done: false,
        }
    }

    fn incr_active(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    fn complete(&self, elapsed_millis: u64, succeeded: bool) {
        // decrement saturates: an unpaired end is a caller bug and must not
        // wrap the gauge around
        if self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_err()
        {
            warn!("end_invoke without matching begin_invoke, active already 0");
        }
        self.total.fetch_add(1, Ordering::SeqCst);
        self.total_elapsed.fetch_add(elapsed_millis, Ordering::SeqCst);
        self.max_elapsed.fetch_max(elapsed_millis, Ordering::SeqCst);
        if succeeded {
            self.succeeded_max_elapsed
                .fetch_max(elapsed_millis, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
            self.failed_elapsed.fetch_add(elapsed_millis, Ordering::SeqCst);
            self.failed_max_elapsed
                .fetch_max(elapsed_millis, Ordering::SeqCst);
        }
    }

    /// Point-in-time in-flight count. Inherently racy, read as a load signal.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn total_elapsed(&self) -> u64 {
        self.total_elapsed.load(Ordering::SeqCst)
    }

    pub fn failed_elapsed(&self) -> u64 {
        self.failed_elapsed.load(Ordering::SeqCst)
    }

    pub fn max_elapsed(&self) -> u64 {
        self.max_elapsed.load(Ordering::SeqCst)
    }

    pub fn failed_max_elapsed(&self) -> u64 {
        self.failed_max_elapsed.load(Ordering::SeqCst)
    }

    pub fn succeeded_max_elapsed(&self) -> u64 {
        self.succeeded_max_elapsed.load(Ordering::SeqCst)
    }

    pub fn succeeded(&self) -> usize {
        self.total().saturating_sub(self.failed())
    }

    pub fn succeeded_elapsed(&self) -> u64 {
        self.total_elapsed().saturating_sub(self.failed_elapsed())
    }

    pub fn succeeded_average_elapsed(&self) -> u64 {
        let succeeded = self.succeeded();
        if succeeded == 0 {
            return 0;
        }
        self.succeeded_elapsed() / succeeded as u64
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.clone())
    }
}

/// Scoped begin/end bracket around one real call.
pub struct ActiveGuard {
    url: Url,
    method_name: String,
    start: Instant,
    done: bool,
}

impl ActiveGuard {
    pub fn succeed(mut self) {
        self.complete(true);
    }

    pub fn fail(mut self) {
        self.complete(false);
    }

    fn complete(&mut self, succeeded: bool) {
        if !self.done {
            self.done = true;
            RpcStatus::end_invoke(
                &self.url,
                &self.method_name,
                self.start.elapsed().as_millis() as u64,
                succeeded,
            );
        }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.complete(false);
    }
}
