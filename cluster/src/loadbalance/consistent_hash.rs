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
    collections::BTreeMap,
    fmt::{Debug, Formatter},
    sync::Arc,
};

use dashmap::DashMap;
use quill_base::{
    constants::{
        DEFAULT_HASH_ARGUMENTS, DEFAULT_HASH_NODES, HASH_ARGUMENTS_KEY, HASH_NODES_KEY,
    },
    hash::hash_to_u64,
    Node, Url,
};
use quill_logger::tracing::warn;

use crate::{
    error::ClusterError,
    invocation::{Invocation, RpcInvocation},
    invoker::{BoxInvoker, InvokersContainer},
    loadbalance::{candidate_fingerprint, LoadBalance, Metadata},
};

/// Route equal request keys to the same provider. Each invoker spreads a
/// configured number of virtual nodes over a hash ring; a key is owned by
/// the first ring position at or after its hash. Removing one of N invokers
/// remaps only the keys its own virtual nodes held.
pub struct ConsistentHashLoadBalance {
    pub metadata: Metadata,
    selectors: DashMap<String, Arc<ConsistentHashSelector>>,
}

impl ConsistentHashLoadBalance {
    pub fn new() -> Self {
        ConsistentHashLoadBalance {
            metadata: Metadata::new("consistenthash"),
            selectors: DashMap::new(),
        }
    }
}

impl Default for ConsistentHashLoadBalance {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ConsistentHashLoadBalance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsistentHashLoadBalance")
            .field("name", &self.metadata.name)
            .finish()
    }
}

impl LoadBalance for ConsistentHashLoadBalance {
    fn do_select(
        &self,
        invokers: InvokersContainer,
        _url: Option<Url>,
        invocation: Arc<RpcInvocation>,
    ) -> Result<BoxInvoker, ClusterError> {
        let key = invocation.unique_fingerprint();
        let fingerprint = candidate_fingerprint(&invokers);
        if let Some(selector) = self.selectors.get(&key) {
            if selector.fingerprint == fingerprint {
                return selector.select(&invocation);
            }
        }
        // candidate set changed: build a fresh ring off to the side and
        // publish it wholesale, readers keep using the old snapshot meanwhile
        let selector = Arc::new(ConsistentHashSelector::new(
            &invokers,
            &invocation.get_method_name(),
            fingerprint,
        ));
        self.selectors.insert(key, selector.clone());
        selector.select(&invocation)
    }
}

/// Immutable ring snapshot for one (service, method) key and one candidate
/// identity set.
struct ConsistentHashSelector {
    virtual_invokers: BTreeMap<u64, BoxInvoker>,
    argument_indexes: Vec<usize>,
    fingerprint: u64,
}

impl ConsistentHashSelector {
    fn new(invokers: &[BoxInvoker], method_name: &str, fingerprint: u64) -> Self {
        let config_url = invokers[0].get_url();
        let replica_number = replica_number(&config_url, method_name);
        let argument_indexes = argument_indexes(&config_url, method_name);

        let mut virtual_invokers = BTreeMap::new();
        for invoker in invokers {
            let identity = invoker.get_url().to_identity_string();
            for replica in 0..replica_number {
                virtual_invokers.insert(
                    hash_to_u64(&format!("{}#{}", identity, replica)),
                    invoker.clone(),
                );
            }
        }
        ConsistentHashSelector {
            virtual_invokers,
            argument_indexes,
            fingerprint,
        }
    }

    fn select(&self, invocation: &RpcInvocation) -> Result<BoxInvoker, ClusterError> {
        let key = self.to_key(&invocation.get_arguments());
        let hash = hash_to_u64(&key);
        self.virtual_invokers
            .range(hash..)
            .next()
            .or_else(|| self.virtual_invokers.iter().next())
            .map(|(_, invoker)| invoker.clone())
            .ok_or_else(|| {
                ClusterError::RoutingInvariantViolation(format!(
                    "hash ring owns no node for key {:?}",
                    key
                ))
            })
    }

    fn to_key(&self, arguments: &[String]) -> String {
        let mut key = String::new();
        for index in self.argument_indexes.iter() {
            if let Some(argument) = arguments.get(*index) {
                key.push_str(argument);
            }
        }
        key
    }
}

fn replica_number(url: &Url, method_name: &str) -> usize {
    match url.get_method_param(method_name, HASH_NODES_KEY) {
        Some(raw) => match raw.parse::<usize>() {
            Ok(value) if value > 0 => value,
            _ => {
                warn!(
                    "invalid {} value {:?}, using {}",
                    HASH_NODES_KEY, raw, DEFAULT_HASH_NODES
                );
                DEFAULT_HASH_NODES
            }
        },
        None => DEFAULT_HASH_NODES,
    }
}

fn argument_indexes(url: &Url, method_name: &str) -> Vec<usize> {
    let raw = url
        .get_method_param(method_name, HASH_ARGUMENTS_KEY)
        .unwrap_or_else(|| DEFAULT_HASH_ARGUMENTS.to_string());
    let indexes: Vec<usize> = raw
        .split(',')
        .filter_map(|part| match part.trim().parse::<usize>() {
            Ok(index) => Some(index),
            Err(_) => {
                warn!("invalid {} element {:?}, skipped", HASH_ARGUMENTS_KEY, part);
                None
            }
        })
        .collect();
    if indexes.is_empty() {
        // nothing usable configured, fall back to the first argument
        vec![0]
    } else {
        indexes
    }
}
