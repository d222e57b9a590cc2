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
use rand::{seq::SliceRandom, thread_rng, Rng};

use crate::{
    error::ClusterError,
    invocation::{Invocation, RpcInvocation},
    invoker::{BoxInvoker, InvokersContainer},
    loadbalance::{weight::get_weight, LoadBalance, Metadata},
    rpc_status::RpcStatus,
};

/// Select the provider with the shortest estimated response time, the
/// success average elapsed scaled by the calls currently in flight. Ties
/// resolve exactly like the least active strategy: weighted draw when the
/// tie set weights differ, even draw otherwise.
#[derive(Debug)]
pub struct ShortestResponseLoadBalance {
    pub metadata: Metadata,
}

impl ShortestResponseLoadBalance {
    pub fn new() -> Self {
        ShortestResponseLoadBalance {
            metadata: Metadata::new("shortestresponse"),
        }
    }
}

impl Default for ShortestResponseLoadBalance {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalance for ShortestResponseLoadBalance {
    fn do_select(
        &self,
        invokers: InvokersContainer,
        _url: Option<Url>,
        invocation: Arc<RpcInvocation>,
    ) -> Result<BoxInvoker, ClusterError> {
        let length = invokers.len();
        let mut shortest_response: i64 = -1;
        let mut shortest_count = 0usize;
        let mut shortest_indexes = vec![0usize; length];
        let mut weights = vec![0i64; length];
        let mut total_weight: i64 = 0;
        let mut first_weight: i64 = 0;
        let mut same_weight = true;

        for (i, invoker) in invokers.iter().enumerate() {
            let status = RpcStatus::get_method_status(
                &invoker.get_url(),
                &invocation.get_method_name(),
            );
            // in flight calls queue behind the observed latency
            let estimate =
                status.succeeded_average_elapsed() as i64 * status.active() as i64;
            let weight = get_weight(invoker, &invocation);
            weights[i] = weight;
            if shortest_response == -1 || estimate < shortest_response {
                shortest_response = estimate;
                shortest_count = 1;
                shortest_indexes[0] = i;
                total_weight = weight;
                first_weight = weight;
                same_weight = true;
            } else if estimate == shortest_response {
                shortest_indexes[shortest_count] = i;
                shortest_count += 1;
                total_weight += weight;
                if same_weight && weight != first_weight {
                    same_weight = false;
                }
            }
        }

        if shortest_count == 1 {
            return Ok(invokers[shortest_indexes[0]].clone());
        }
        if !same_weight && total_weight > 0 {
            let mut offset = thread_rng().gen_range(0..total_weight);
            for &shortest_index in shortest_indexes.iter().take(shortest_count) {
                offset -= weights[shortest_index];
                if offset < 0 {
                    return Ok(invokers[shortest_index].clone());
                }
            }
        }
        shortest_indexes[..shortest_count]
            .choose(&mut thread_rng())
            .map(|&index| invokers[index].clone())
            .ok_or_else(|| {
                ClusterError::NoAvailableInvoker(invocation.get_target_service_unique_name())
            })
    }
}
