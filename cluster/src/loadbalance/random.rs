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

use quill_base::Url;
use rand::{seq::SliceRandom, thread_rng, Rng};

use crate::{
    error::ClusterError,
    invocation::{Invocation, RpcInvocation},
    invoker::{BoxInvoker, InvokersContainer},
    loadbalance::{weight::get_weight, LoadBalance, Metadata},
};

/// Select one provider randomly, proportionally to effective weight.
#[derive(Debug)]
pub struct RandomLoadBalance {
    pub metadata: Metadata,
}

impl RandomLoadBalance {
    pub fn new() -> Self {
        RandomLoadBalance {
            metadata: Metadata::new("random"),
        }
    }
}

impl Default for RandomLoadBalance {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalance for RandomLoadBalance {
    fn do_select(
        &self,
        invokers: InvokersContainer,
        _url: Option<Url>,
        invocation: Arc<RpcInvocation>,
    ) -> Result<BoxInvoker, ClusterError> {
        let weights: Vec<i64> = invokers
            .iter()
            .map(|invoker| get_weight(invoker, &invocation))
            .collect();
        let same_weight = weights.windows(2).all(|pair| pair[0] == pair[1]);
        let total_weight: i64 = weights.iter().sum();

        if !same_weight && total_weight > 0 {
            // land a uniform draw on the weight segments laid end to end
            let mut offset = thread_rng().gen_range(0..total_weight);
            for (i, weight) in weights.iter().enumerate() {
                offset -= weight;
                if offset < 0 {
                    return Ok(invokers[i].clone());
                }
            }
        }
        // equal weights, or nothing weighted at all: pick evenly
        invokers
            .choose(&mut thread_rng())
            .cloned()
            .ok_or_else(|| {
                ClusterError::NoAvailableInvoker(invocation.get_target_service_unique_name())
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use quill_base::Node;

    use crate::loadbalance::{get_test_invocation, get_test_invokers};

    use super::*;

    fn selection_counts(
        loadbalance: &RandomLoadBalance,
        invokers: InvokersContainer,
        invocation: Arc<RpcInvocation>,
        trials: usize,
    ) -> HashMap<String, usize> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..trials {
            let selected = loadbalance
                .do_select(invokers.clone(), None, invocation.clone())
                .unwrap();
            *counts
                .entry(selected.get_url().get_ip_port())
                .or_default() += 1;
        }
        counts
    }

    #[test]
    fn test_equal_weights_spread_evenly() {
        let random = RandomLoadBalance::new();
        let invokers = get_test_invokers(&[
            "quill://10.2.0.1:8000/org.example.Rand",
            "quill://10.2.0.2:8000/org.example.Rand",
            "quill://10.2.0.3:8000/org.example.Rand",
        ]);
        let invocation = get_test_invocation("org.example.Rand", "hello");
        let counts = selection_counts(&random, invokers, invocation, 30_000);
        for count in counts.values() {
            let share = *count as f64 / 30_000.0;
            assert!((share - 1.0 / 3.0).abs() < 0.03, "share was {}", share);
        }
    }

    #[test]
    fn test_weighted_draw_follows_weights() {
        let random = RandomLoadBalance::new();
        let invokers = get_test_invokers(&[
            "quill://10.2.1.1:8000/org.example.Rand?weight=100",
            "quill://10.2.1.2:8000/org.example.Rand?weight=300",
        ]);
        let invocation = get_test_invocation("org.example.Rand", "hello");
        let counts = selection_counts(&random, invokers, invocation, 40_000);
        let heavy = counts["10.2.1.2:8000"] as f64 / 40_000.0;
        assert!((heavy - 0.75).abs() < 0.03, "share was {}", heavy);
    }

    #[test]
    fn test_zero_weight_candidate_is_never_drawn() {
        let random = RandomLoadBalance::new();
        let invokers = get_test_invokers(&[
            "quill://10.2.2.1:8000/org.example.Rand?weight=0",
            "quill://10.2.2.2:8000/org.example.Rand?weight=100",
        ]);
        let invocation = get_test_invocation("org.example.Rand", "hello");
        let counts = selection_counts(&random, invokers, invocation, 2_000);
        assert!(!counts.contains_key("10.2.2.1:8000"));
    }
}
