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

pub trait Invocation {
    fn get_target_service_unique_name(&self) -> String;
    fn get_method_name(&self) -> String;
    fn get_arguments(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Default)]
pub struct RpcInvocation {
    target_service_unique_name: String,
    method_name: String,
    // string form of the call arguments, in declaration order; consistent
    // hashing keys on a configured subset of these
    arguments: Vec<String>,
}

impl RpcInvocation {
    pub fn with_service_unique_name(mut self, service_unique_name: String) -> Self {
        self.target_service_unique_name = service_unique_name;
        self
    }

    pub fn with_method_name(mut self, method_name: String) -> Self {
        self.method_name = method_name;
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn unique_fingerprint(&self) -> String {
        format!("{}#{}", self.target_service_unique_name, self.method_name)
    }
}

impl Invocation for RpcInvocation {
    fn get_target_service_unique_name(&self) -> String {
        self.target_service_unique_name.clone()
    }

    fn get_method_name(&self) -> String {
        self.method_name.clone()
    }

    fn get_arguments(&self) -> Vec<String> {
        self.arguments.clone()
    }
}
