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

use std::sync::Arc;

use quill_base::{Node, Url};
use quill_cluster::{
    error::ClusterError,
    invocation::RpcInvocation,
    invoker::{BaseInvoker, BoxInvoker, InvokersContainer},
    loadbalance::LoadBalanceDispatcher,
    rpc_status::RpcStatus,
};

fn invokers(urls: &[&str]) -> InvokersContainer {
    Arc::new(
        urls.iter()
            .map(|u| Arc::new(BaseInvoker::new(Url::from_url(u).expect("test url"))) as BoxInvoker)
            .collect(),
    )
}

fn invocation(service: &str, method: &str) -> Arc<RpcInvocation> {
    Arc::new(
        RpcInvocation::default()
            .with_service_unique_name(service.to_string())
            .with_method_name(method.to_string())
            .with_arguments(vec!["arg0".to_string()]),
    )
}

fn consumer(service: &str, strategy: &str) -> Option<Url> {
    Url::from_url(&format!(
        "quill://192.168.0.10:7070/{}?loadbalance={}",
        service, strategy
    ))
}

#[test]
fn every_strategy_short_circuits_a_single_candidate() {
    quill_logger::init();
    for strategy in [
        "random",
        "roundrobin",
        "leastactive",
        "consistenthash",
        "shortestresponse",
    ] {
        let single = invokers(&["quill://172.16.0.1:9000/org.example.Single"]);
        let selected = LoadBalanceDispatcher::select(
            single,
            consumer("org.example.Single", strategy),
            invocation("org.example.Single", "ping"),
        )
        .unwrap();
        assert_eq!(
            selected.get_url().get_ip_port(),
            "172.16.0.1:9000",
            "strategy {} did not return the only candidate",
            strategy
        );
    }
}

#[test]
fn every_strategy_rejects_an_empty_candidate_set() {
    for strategy in [
        "random",
        "roundrobin",
        "leastactive",
        "consistenthash",
        "shortestresponse",
    ] {
        let result = LoadBalanceDispatcher::select(
            Arc::new(Vec::new()),
            consumer("org.example.None", strategy),
            invocation("org.example.None", "ping"),
        );
        assert!(matches!(result, Err(ClusterError::NoAvailableInvoker(_))));
    }
}

#[test]
fn guarded_calls_feed_the_next_selection() {
    let candidates = invokers(&[
        "quill://172.16.1.1:9000/org.example.Guarded",
        "quill://172.16.1.2:9000/org.example.Guarded",
    ]);
    let consumer = consumer("org.example.Guarded", "leastactive");
    let invocation = invocation("org.example.Guarded", "work");

    // first call goes out and stays in flight
    let first = LoadBalanceDispatcher::select(
        candidates.clone(),
        consumer.clone(),
        invocation.clone(),
    )
    .unwrap();
    let guard = RpcStatus::begin(&first.get_url(), "work");

    // while it is in flight, selection prefers the idle instance
    for _ in 0..20 {
        let next = LoadBalanceDispatcher::select(
            candidates.clone(),
            consumer.clone(),
            invocation.clone(),
        )
        .unwrap();
        assert_ne!(
            next.get_url().get_ip_port(),
            first.get_url().get_ip_port()
        );
    }

    // once finished both are idle again and either may win
    guard.succeed();
    let status = RpcStatus::get_method_status(&first.get_url(), "work");
    assert_eq!(status.active(), 0);
    assert_eq!(status.total(), 1);
}

#[test]
fn sticky_routing_survives_selector_reuse_across_calls() {
    let candidates = invokers(&[
        "quill://172.16.2.1:9000/org.example.Session",
        "quill://172.16.2.2:9000/org.example.Session",
        "quill://172.16.2.3:9000/org.example.Session",
    ]);
    let consumer = consumer("org.example.Session", "consistenthash");
    let keyed = |key: &str| {
        Arc::new(
            RpcInvocation::default()
                .with_service_unique_name("org.example.Session".to_string())
                .with_method_name("lookup".to_string())
                .with_arguments(vec![key.to_string()]),
        )
    };

    let owner = LoadBalanceDispatcher::select(candidates.clone(), consumer.clone(), keyed("s-9"))
        .unwrap();
    for _ in 0..30 {
        let again =
            LoadBalanceDispatcher::select(candidates.clone(), consumer.clone(), keyed("s-9"))
                .unwrap();
        assert_eq!(
            owner.get_url().get_ip_port(),
            again.get_url().get_ip_port()
        );
    }
}

#[test]
fn round_robin_cycle_is_weight_proportional_end_to_end() {
    let candidates = invokers(&[
        "quill://172.16.3.1:9000/org.example.Cycle?weight=2",
        "quill://172.16.3.2:9000/org.example.Cycle?weight=4",
    ]);
    let consumer = consumer("org.example.Cycle", "roundrobin");
    let invocation = invocation("org.example.Cycle", "tick");

    let mut light = 0usize;
    let mut heavy = 0usize;
    for _ in 0..6 {
        let selected =
            LoadBalanceDispatcher::select(candidates.clone(), consumer.clone(), invocation.clone())
                .unwrap();
        match selected.get_url().get_ip_port().as_str() {
            "172.16.3.1:9000" => light += 1,
            "172.16.3.2:9000" => heavy += 1,
            other => panic!("unexpected invoker {}", other),
        }
    }
    assert_eq!(light, 2);
    assert_eq!(heavy, 4);
}
