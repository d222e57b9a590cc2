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

pub const GROUP_KEY: &str = "group";

pub const INTERFACE_KEY: &str = "interface";

pub const VERSION_KEY: &str = "version";

pub const ANYHOST_KEY: &str = "anyhost";

/**
 * Epoch millis at which the provider instance came up; drives warm-up ramping.
 */
pub const TIMESTAMP_KEY: &str = "timestamp";

pub const WEIGHT_KEY: &str = "weight";

pub const DEFAULT_WEIGHT: i64 = 100;

pub const WARMUP_KEY: &str = "warmup";

pub const DEFAULT_WARMUP: i64 = 10 * 60 * 1000;

pub const LOADBALANCE_KEY: &str = "loadbalance";

pub const DEFAULT_LOADBALANCE: &str = "random";

/**
 * Number of ring positions each invoker contributes to a consistent-hash ring.
 */
pub const HASH_NODES_KEY: &str = "hash.nodes";

pub const DEFAULT_HASH_NODES: usize = 160;

/**
 * Comma separated argument positions that form the consistent-hash request key.
 */
pub const HASH_ARGUMENTS_KEY: &str = "hash.arguments";

pub const DEFAULT_HASH_ARGUMENTS: &str = "0";
