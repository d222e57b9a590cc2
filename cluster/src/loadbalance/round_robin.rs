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
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use dashmap::DashMap;
use quill_base::{Node, Url};

use crate::{
    error::ClusterError,
    invocation::RpcInvocation,
    invoker::{BoxInvoker, InvokersContainer},
    loadbalance::{candidate_fingerprint, weight::get_weight, LoadBalance, Metadata},
};

/// Smooth weighted round robin. Each tick every candidate's cursor grows by
/// its effective weight, the largest cursor wins and pays the whole round's
/// weight back. Selections come out proportional to weight without the
/// bursty runs of naive repeat-N round robin.
#[derive(Debug)]
pub struct RoundRobinLoadBalance {
    pub metadata: Metadata,
    method_cursors: DashMap<String, Arc<RoundRobinState>>,
}

/// Cursor snapshot for one (service, method) key. `fingerprint` names the
/// candidate identity set the cells were built for; a different set means
/// the snapshot is stale and a fresh one replaces it wholesale, so cursors
/// of departed invokers never skew a new cycle.
#[derive(Debug)]
struct RoundRobinState {
    fingerprint: u64,
    cursors: HashMap<String, AtomicI64>,
}

impl RoundRobinLoadBalance {
    pub fn new() -> Self {
        RoundRobinLoadBalance {
            metadata: Metadata::new("roundrobin"),
            method_cursors: DashMap::new(),
        }
    }

    fn state_for(
        &self,
        key: &str,
        identities: &[String],
        fingerprint: u64,
    ) -> Arc<RoundRobinState> {
        if let Some(state) = self.method_cursors.get(key) {
            if state.fingerprint == fingerprint {
                return state.clone();
            }
        }
        let rebuilt = Arc::new(RoundRobinState {
            fingerprint,
            cursors: identities
                .iter()
                .map(|identity| (identity.clone(), AtomicI64::new(0)))
                .collect(),
        });
        self.method_cursors.insert(key.to_string(), rebuilt.clone());
        rebuilt
    }
}

impl Default for RoundRobinLoadBalance {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalance for RoundRobinLoadBalance {
    fn do_select(
        &self,
        invokers: InvokersContainer,
        _url: Option<Url>,
        invocation: Arc<RpcInvocation>,
    ) -> Result<BoxInvoker, ClusterError> {
        let identities: Vec<String> = invokers
            .iter()
            .map(|invoker| invoker.get_url().to_identity_string())
            .collect();
        let state = self.state_for(
            &invocation.unique_fingerprint(),
            &identities,
            candidate_fingerprint(&invokers),
        );

        let mut total_weight = 0i64;
        let mut max_cursor = i64::MIN;
        let mut selected: Option<(usize, &AtomicI64)> = None;
        for (i, invoker) in invokers.iter().enumerate() {
            let weight = get_weight(invoker, &invocation);
            let cursor = state.cursors.get(&identities[i]).ok_or_else(|| {
                ClusterError::RoutingInvariantViolation(format!(
                    "no round robin cursor for {}",
                    identities[i]
                ))
            })?;
            let advanced = cursor.fetch_add(weight, Ordering::SeqCst) + weight;
            total_weight += weight;
            if advanced > max_cursor {
                max_cursor = advanced;
                selected = Some((i, cursor));
            }
        }
        let (index, cursor) = selected.ok_or_else(|| {
            ClusterError::RoutingInvariantViolation("no candidate advanced a cursor".to_string())
        })?;
        cursor.fetch_sub(total_weight, Ordering::SeqCst);
        Ok(invokers[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use quill_base::Node;

    use crate::loadbalance::{get_test_invocation, get_test_invokers};

    use super::*;

    fn cycle_counts(
        round_robin: &RoundRobinLoadBalance,
        invokers: InvokersContainer,
        invocation: Arc<RpcInvocation>,
        ticks: usize,
    ) -> HashMap<String, usize> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..ticks {
            let selected = round_robin
                .do_select(invokers.clone(), None, invocation.clone())
                .unwrap();
            *counts
                .entry(selected.get_url().get_ip_port())
                .or_default() += 1;
        }
        counts
    }

    #[test]
    fn test_full_cycle_matches_weight_shares() {
        let round_robin = RoundRobinLoadBalance::new();
        let invokers = get_test_invokers(&[
            "quill://10.3.0.1:8000/org.example.Robin?weight=1",
            "quill://10.3.0.2:8000/org.example.Robin?weight=2",
            "quill://10.3.0.3:8000/org.example.Robin?weight=3",
        ]);
        let invocation = get_test_invocation("org.example.Robin", "hello");
        // one full cycle has length 1 + 2 + 3
        let counts = cycle_counts(&round_robin, invokers, invocation, 6);
        assert_eq!(counts["10.3.0.1:8000"], 1);
        assert_eq!(counts["10.3.0.2:8000"], 2);
        assert_eq!(counts["10.3.0.3:8000"], 3);
    }

    #[test]
    fn test_selection_is_smooth_not_bursty() {
        let round_robin = RoundRobinLoadBalance::new();
        let invokers = get_test_invokers(&[
            "quill://10.3.1.1:8000/org.example.Robin?weight=1",
            "quill://10.3.1.2:8000/org.example.Robin?weight=4",
        ]);
        let invocation = get_test_invocation("org.example.Robin", "hello");
        let mut picks = Vec::new();
        for _ in 0..10 {
            let selected = round_robin
                .do_select(invokers.clone(), None, invocation.clone())
                .unwrap();
            picks.push(selected.get_url().get_ip_port());
        }
        // the light invoker appears once per cycle, never twice in a row
        let light = "10.3.1.1:8000";
        assert_eq!(picks.iter().filter(|p| *p == light).count(), 2);
        for pair in picks.windows(2) {
            assert!(!(pair[0] == light && pair[1] == light));
        }
    }

    #[test]
    fn test_equal_weights_alternate() {
        let round_robin = RoundRobinLoadBalance::new();
        let invokers = get_test_invokers(&[
            "quill://10.3.2.1:8000/org.example.Robin",
            "quill://10.3.2.2:8000/org.example.Robin",
        ]);
        let invocation = get_test_invocation("org.example.Robin", "hello");
        let counts = cycle_counts(&round_robin, invokers, invocation, 10);
        assert_eq!(counts["10.3.2.1:8000"], 5);
        assert_eq!(counts["10.3.2.2:8000"], 5);
    }

    #[test]
    fn test_topology_change_resets_the_cycle() {
        let round_robin = RoundRobinLoadBalance::new();
        let invocation = get_test_invocation("org.example.Robin", "hello");
        let before = get_test_invokers(&[
            "quill://10.3.3.1:8000/org.example.Robin?weight=1",
            "quill://10.3.3.2:8000/org.example.Robin?weight=5",
        ]);
        for _ in 0..4 {
            round_robin
                .do_select(before.clone(), None, invocation.clone())
                .unwrap();
        }
        // one invoker leaves, another joins: stale cursors must not leak
        let after = get_test_invokers(&[
            "quill://10.3.3.2:8000/org.example.Robin?weight=1",
            "quill://10.3.3.3:8000/org.example.Robin?weight=1",
        ]);
        let counts = cycle_counts(&round_robin, after, invocation, 8);
        assert_eq!(counts["10.3.3.2:8000"], 4);
        assert_eq!(counts["10.3.3.3:8000"], 4);
    }

    #[test]
    fn test_methods_keep_independent_cycles() {
        let round_robin = RoundRobinLoadBalance::new();
        let invokers = get_test_invokers(&[
            "quill://10.3.4.1:8000/org.example.Robin",
            "quill://10.3.4.2:8000/org.example.Robin",
        ]);
        let first = round_robin
            .do_select(
                invokers.clone(),
                None,
                get_test_invocation("org.example.Robin", "alpha"),
            )
            .unwrap();
        let second = round_robin
            .do_select(
                invokers.clone(),
                None,
                get_test_invocation("org.example.Robin", "beta"),
            )
            .unwrap();
        // a fresh cycle starts at the same spot for every method
        assert_eq!(
            first.get_url().get_ip_port(),
            second.get_url().get_ip_port()
        );
    }
}
