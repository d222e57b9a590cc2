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
use std::time::{SystemTime, UNIX_EPOCH};

use quill_base::{
    constants::{DEFAULT_WARMUP, DEFAULT_WEIGHT, TIMESTAMP_KEY, WARMUP_KEY, WEIGHT_KEY},
    Node, Url,
};
use quill_logger::tracing::warn;

use crate::invocation::{Invocation, RpcInvocation};
use crate::invoker::BoxInvoker;

/// Effective weight of `invoker` for this call. The configured weight is
/// ramped while the instance is still inside its warm-up window, so a
/// freshly started provider takes a trickle of traffic instead of its full
/// share.
pub fn get_weight(invoker: &BoxInvoker, invocation: &RpcInvocation) -> i64 {
    let url = invoker.get_url();
    let method = invocation.get_method_name();
    let mut weight = method_param_i64(&url, &method, WEIGHT_KEY, DEFAULT_WEIGHT);
    if weight > 0 {
        if let Some(timestamp) = positive_param_i64(&url, TIMESTAMP_KEY) {
            let uptime = (now_millis() - timestamp).max(0);
            let warmup = method_param_i64(&url, &method, WARMUP_KEY, DEFAULT_WARMUP);
            if warmup > 0 && uptime < warmup {
                weight = calculate_warmup_weight(uptime, warmup, weight);
            }
        }
    }
    weight.max(0)
}

/// Linear ramp from 1 to `weight` across the warm-up window. Never returns 0:
/// an instance that just came up still has to see minimal traffic, or its
/// caches never warm at all.
fn calculate_warmup_weight(uptime: i64, warmup: i64, weight: i64) -> i64 {
    let ramped = uptime * weight / warmup;
    if ramped < 1 {
        1
    } else {
        ramped.min(weight)
    }
}

fn method_param_i64(url: &Url, method: &str, key: &str, default: i64) -> i64 {
    match url.get_method_param(method, key) {
        Some(raw) => parse_non_negative(url, key, &raw).unwrap_or(default),
        None => default,
    }
}

fn positive_param_i64(url: &Url, key: &str) -> Option<i64> {
    let raw = url.get_param(key)?;
    parse_non_negative(url, key, &raw)
}

// malformed numeric config is not fatal, the default takes over
fn parse_non_negative(url: &Url, key: &str, raw: &str) -> Option<i64> {
    match raw.parse::<i64>() {
        Ok(value) if value >= 0 => Some(value),
        _ => {
            warn!(
                "invalid {} value {:?} on {}, substituting the default",
                key,
                raw,
                url.get_ip_port()
            );
            None
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
