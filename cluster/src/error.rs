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

use thiserror::Error;

/// Failures on the selection path, surfaced to whoever drives the dispatcher.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("no available invoker for service {0}")]
    NoAvailableInvoker(String),

    /// A correct selector never produces this; it exists as an assertable
    /// contract for the ring and round-robin snapshots.
    #[error("routing invariant violated: {0}")]
    RoutingInvariantViolation(String),
}

/// Failure of the remote call itself, carried inside an `Output`.
#[derive(Error, Debug)]
pub enum InvokerError {
    #[error("invoker call failed: {0}")]
    CallFailed(String),

    #[error("invoker {0} is not available")]
    Unavailable(String),
}
