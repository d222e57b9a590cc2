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

/// Select the provider with the fewest calls in flight. The in-flight count
/// is the capacity signal; weight only breaks ties between equally loaded
/// providers and never overrides it.
#[derive(Debug)]
pub struct LeastActiveLoadBalance {
    pub metadata: Metadata,
}

impl LeastActiveLoadBalance {
    pub fn new() -> Self {
        LeastActiveLoadBalance {
            metadata: Metadata::new("leastactive"),
        }
    }
}

impl Default for LeastActiveLoadBalance {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalance for LeastActiveLoadBalance {
    fn do_select(
        &self,
        invokers: InvokersContainer,
        _url: Option<Url>,
        invocation: Arc<RpcInvocation>,
    ) -> Result<BoxInvoker, ClusterError> {
        let length = invokers.len();
        // The least active value of all invokers
        let mut least_active: i64 = -1;
        // The number of invokers having the same least active value
        let mut least_count = 0usize;
        // The index of invokers having the same least active value
        let mut least_indexes = vec![0usize; length];
        // the weight of every invoker, saved for the tie break walk
        let mut weights = vec![0i64; length];
        // The sum of the weights of all the least active invokers
        let mut total_weight: i64 = 0;
        // The weight of the first least active invoker
        let mut first_weight: i64 = 0;
        // Every least active invoker has the same weight value?
        let mut same_weight = true;

        for (i, invoker) in invokers.iter().enumerate() {
            let active = RpcStatus::get_method_status(
                &invoker.get_url(),
                &invocation.get_method_name(),
            )
            .active() as i64;
            let weight = get_weight(invoker, &invocation);
            weights[i] = weight;
            if least_active == -1 || active < least_active {
                // Smaller least active value found, restart the tie set on it
                least_active = active;
                least_count = 1;
                least_indexes[0] = i;
                total_weight = weight;
                first_weight = weight;
                same_weight = true;
            } else if active == least_active {
                // Current invoker joins the tie set
                least_indexes[least_count] = i;
                least_count += 1;
                total_weight += weight;
                if same_weight && weight != first_weight {
                    same_weight = false;
                }
            }
        }

        if least_count == 1 {
            // Exactly one invoker has the least active value, return it directly
            return Ok(invokers[least_indexes[0]].clone());
        }
        if !same_weight && total_weight > 0 {
            // Unequal weights inside the tie set: draw across their weight segments
            let mut offset = thread_rng().gen_range(0..total_weight);
            for &least_index in least_indexes.iter().take(least_count) {
                offset -= weights[least_index];
                if offset < 0 {
                    return Ok(invokers[least_index].clone());
                }
            }
        }
        // All tie set weights equal, or nothing weighted: pick evenly
        least_indexes[..least_count]
            .choose(&mut thread_rng())
            .map(|&index| invokers[index].clone())
            .ok_or_else(|| {
                ClusterError::NoAvailableInvoker(invocation.get_target_service_unique_name())
            })
    }
}
