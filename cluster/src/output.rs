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
use std::{any::Any, fmt::Debug, sync::Arc};

use dashmap::DashMap;

use crate::error::InvokerError;

pub type AttachmentsMap = DashMap<String, String>;

// role of Output is same to Result, because of preload std::result::Result
pub trait Output<R> {
    fn set_error(&mut self, error: Arc<InvokerError>);
    fn error(&self) -> Option<Arc<InvokerError>>;
    fn set(&mut self, result: R);
    fn get(&self) -> Option<Arc<R>>;
    fn add_attachment(&mut self, key: &str, value: &str);
    fn get_attachment_or_default(&self, key: &str, default_value: &str) -> String;
}

pub type BoxOutput<R> = Arc<dyn Output<R> + Send + Sync + 'static>;

pub struct RpcOutput<R: Any + Debug> {
    error: Option<Arc<InvokerError>>,
    result: Option<Arc<R>>,
    attachments: AttachmentsMap,
}

impl<R> Default for RpcOutput<R>
where
    R: Any + Debug,
{
    fn default() -> Self {
        RpcOutput {
            error: None,
            result: None,
            attachments: AttachmentsMap::new(),
        }
    }
}

impl<R> Output<R> for RpcOutput<R>
where
    R: Any + Debug,
{
    fn set_error(&mut self, error: Arc<InvokerError>) {
        self.error = Some(error);
    }

    fn error(&self) -> Option<Arc<InvokerError>> {
        self.error.clone()
    }

    fn set(&mut self, result: R) {
        self.result = Some(Arc::new(result))
    }

    fn get(&self) -> Option<Arc<R>> {
        self.result.clone()
    }

    fn add_attachment(&mut self, key: &str, value: &str) {
        self.attachments.insert(key.to_string(), value.to_string());
    }

    fn get_attachment_or_default(&self, key: &str, default_value: &str) -> String {
        self.attachments
            .get(key)
            .map(|v| v.clone())
            .unwrap_or_else(|| default_value.to_string())
    }
}
