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
use std::{collections::HashMap, fmt::Debug, sync::Arc, sync::RwLock};

use lazy_static::lazy_static;
use quill_base::{
    constants::{DEFAULT_LOADBALANCE, LOADBALANCE_KEY},
    hash::hash_to_u64,
    Node, Url,
};
use quill_logger::tracing::{debug, warn};

use crate::{
    error::ClusterError,
    invocation::{Invocation, RpcInvocation},
    invoker::{BoxInvoker, InvokersContainer},
};

use self::{
    consistent_hash::ConsistentHashLoadBalance, least_active::LeastActiveLoadBalance,
    random::RandomLoadBalance, round_robin::RoundRobinLoadBalance,
    shortest_response::ShortestResponseLoadBalance,
};

pub mod consistent_hash;
pub mod least_active;
pub mod random;
pub mod round_robin;
pub mod shortest_response;
pub mod weight;

pub type BoxLoadBalance = Arc<dyn LoadBalance + Send + Sync>;

/// One selection strategy. Implementations may assume `invokers` is not
/// empty; the dispatcher enforces that before delegating.
pub trait LoadBalance: Debug {
    fn do_select(
        &self,
        invokers: InvokersContainer,
        url: Option<Url>,
        invocation: Arc<RpcInvocation>,
    ) -> Result<BoxInvoker, ClusterError>;
}

#[derive(Debug)]
pub struct Metadata {
    pub name: &'static str,
}

impl Metadata {
    pub fn new(name: &'static str) -> Self {
        Metadata { name }
    }
}

lazy_static! {
    static ref LOAD_BALANCE_EXTENSIONS: RwLock<HashMap<String, BoxLoadBalance>> =
        RwLock::new(init_loadbalance_extensions());
}

fn init_loadbalance_extensions() -> HashMap<String, BoxLoadBalance> {
    let mut loadbalance_map: HashMap<String, BoxLoadBalance> = HashMap::new();
    loadbalance_map.insert("random".to_string(), Arc::new(RandomLoadBalance::new()));
    loadbalance_map.insert(
        "roundrobin".to_string(),
        Arc::new(RoundRobinLoadBalance::new()),
    );
    loadbalance_map.insert(
        "leastactive".to_string(),
        Arc::new(LeastActiveLoadBalance::new()),
    );
    loadbalance_map.insert(
        "consistenthash".to_string(),
        Arc::new(ConsistentHashLoadBalance::new()),
    );
    loadbalance_map.insert(
        "shortestresponse".to_string(),
        Arc::new(ShortestResponseLoadBalance::new()),
    );
    loadbalance_map
}

/// Binds `loadbalance` under `name`, replacing any previous binding. New
/// strategies plug in here; dispatch code never changes for them.
pub fn register_loadbalance(name: &str, loadbalance: BoxLoadBalance) {
    LOAD_BALANCE_EXTENSIONS
        .write()
        .unwrap()
        .insert(name.to_string(), loadbalance);
}

fn resolve_loadbalance(name: &str) -> BoxLoadBalance {
    let extensions = LOAD_BALANCE_EXTENSIONS.read().unwrap();
    match extensions.get(name) {
        Some(loadbalance) => loadbalance.clone(),
        None => {
            warn!(
                "unknown loadbalance {:?}, falling back to {:?}",
                name, DEFAULT_LOADBALANCE
            );
            extensions
                .get(DEFAULT_LOADBALANCE)
                .expect("default loadbalance is always registered")
                .clone()
        }
    }
}

/// Order independent fingerprint of a candidate set's identities. Strategies
/// that keep per-topology state compare it to decide when to rebuild.
pub(crate) fn candidate_fingerprint(invokers: &[BoxInvoker]) -> u64 {
    let mut identities: Vec<String> = invokers
        .iter()
        .map(|invoker| invoker.get_url().to_identity_string())
        .collect();
    identities.sort();
    hash_to_u64(&identities)
}

/// Entry point for one selection: applies the shared shortcuts, resolves the
/// configured strategy and delegates.
pub struct LoadBalanceDispatcher;

impl LoadBalanceDispatcher {
    pub fn select(
        invokers: InvokersContainer,
        url: Option<Url>,
        invocation: Arc<RpcInvocation>,
    ) -> Result<BoxInvoker, ClusterError> {
        if invokers.is_empty() {
            return Err(ClusterError::NoAvailableInvoker(
                invocation.get_target_service_unique_name(),
            ));
        }
        // trivial set: no weight or activity computation, no randomness
        if invokers.len() == 1 {
            return Ok(invokers[0].clone());
        }
        let name = url
            .as_ref()
            .and_then(|u| u.get_method_param(&invocation.get_method_name(), LOADBALANCE_KEY))
            .unwrap_or_else(|| DEFAULT_LOADBALANCE.to_string());
        let loadbalance = resolve_loadbalance(&name);
        let candidates = Self::retain_weighted(invokers, &invocation);
        debug!(
            "selecting one of {} candidates via {:?} for {}",
            candidates.len(),
            name,
            invocation.unique_fingerprint()
        );
        loadbalance.do_select(candidates, url, invocation)
    }

    // Invokers ramped or configured down to zero weight take no traffic
    // unless nothing else is left.
    fn retain_weighted(
        invokers: InvokersContainer,
        invocation: &RpcInvocation,
    ) -> InvokersContainer {
        let weighted: Vec<BoxInvoker> = invokers
            .iter()
            .filter(|invoker| weight::get_weight(invoker, invocation) > 0)
            .cloned()
            .collect();
        if weighted.is_empty() || weighted.len() == invokers.len() {
            invokers
        } else {
            Arc::new(weighted)
        }
    }
}

#[cfg(test)]
pub(crate) fn get_test_invokers(urls: &[&str]) -> InvokersContainer {
    use crate::invoker::BaseInvoker;

    Arc::new(
        urls.iter()
            .map(|u| {
                Arc::new(BaseInvoker::new(Url::from_url(u).expect("test url"))) as BoxInvoker
            })
            .collect(),
    )
}

#[cfg(test)]
pub(crate) fn get_test_invocation(service: &str, method: &str) -> Arc<RpcInvocation> {
    Arc::new(
        RpcInvocation::default()
            .with_service_unique_name(service.to_string())
            .with_method_name(method.to_string()),
    )
}
