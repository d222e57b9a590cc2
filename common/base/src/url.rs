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

use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
};

use crate::constants::{GROUP_KEY, INTERFACE_KEY, VERSION_KEY};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Url {
    pub raw_url_string: String,
    // value of scheme is different to base name, eg. triple -> tri://
    pub scheme: String,
    pub location: String,
    pub ip: String,
    pub port: String,
    // serviceKey format: '{group}/{interfaceName}:{version}'
    pub service_key: String,
    // same to interfaceName
    pub service_name: String,
    pub params: HashMap<String, String>,
}

impl Url {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_url(url: &str) -> Option<Self> {
        // url: quill://127.0.0.1:8888/helloworld.Greeter?weight=200
        let uri = url
            .parse::<http::Uri>()
            .map_err(|err| {
                quill_logger::tracing::error!("fail to parse url({}), err: {:?}", url, err);
            })
            .ok()?;
        let query = uri.path_and_query().and_then(|pq| pq.query());
        let mut url_inst = Self {
            raw_url_string: url.to_string(),
            scheme: uri.scheme_str()?.to_string(),
            ip: uri.authority()?.host().to_string(),
            port: uri.authority()?.port()?.to_string(),
            location: uri.authority()?.to_string(),
            service_key: uri.path().trim_start_matches('/').to_string(),
            service_name: uri.path().trim_start_matches('/').to_string(),
            params: match query {
                Some(q) => Url::decode(q),
                None => HashMap::new(),
            },
        };
        url_inst.renew_raw_url_string();
        Some(url_inst)
    }

    pub fn get_service_key(&self) -> String {
        self.service_key.clone()
    }

    pub fn get_service_name(&self) -> String {
        self.service_name.clone()
    }

    pub fn get_param(&self, key: &str) -> Option<String> {
        self.params.get(key).cloned()
    }

    /// Method-scoped parameter lookup: `{method}.{key}` wins over the bare key.
    pub fn get_method_param(&self, method: &str, key: &str) -> Option<String> {
        self.params
            .get(&format!("{}.{}", method, key))
            .or_else(|| self.params.get(key))
            .cloned()
    }

    pub fn set_param(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_string(), value.to_string());
        self.renew_raw_url_string();
    }

    pub fn params_count(&self) -> usize {
        self.params.len()
    }

    fn encode_param(&self) -> String {
        let mut params_vec: Vec<String> = Vec::new();
        for (k, v) in self.params.iter() {
            params_vec.push(format!("{}={}", k, v));
        }
        if params_vec.is_empty() {
            "".to_string()
        } else {
            format!("?{}", params_vec.join("&"))
        }
    }

    fn decode(raw_query_string: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();
        let p: Vec<String> = raw_query_string
            .split('&')
            .map(|v| v.trim().to_string())
            .collect();
        for v in p.iter() {
            let values: Vec<String> = v.split('=').map(|v| v.trim().to_string()).collect();
            if values.len() != 2 {
                continue;
            }
            params.insert(values[0].clone(), values[1].clone());
        }
        params
    }

    pub fn raw_url_string(&self) -> String {
        self.raw_url_string.clone()
    }

    pub fn encoded_raw_url_string(&self) -> String {
        urlencoding::encode(self.raw_url_string.as_str()).to_string()
    }

    fn build_service_key(&self) -> String {
        format!(
            "{group}/{interface}:{version}",
            group = self.get_param(GROUP_KEY).unwrap_or("default".to_string()),
            interface = self
                .get_param(INTERFACE_KEY)
                .unwrap_or_else(|| self.service_name.clone()),
            version = self.get_param(VERSION_KEY).unwrap_or("1.0.0".to_string())
        )
    }

    pub fn to_url(&self) -> String {
        self.raw_url_string()
    }

    fn renew_raw_url_string(&mut self) {
        self.raw_url_string = format!(
            "{}://{}:{}/{}{}",
            self.scheme,
            self.ip,
            self.port,
            self.service_name,
            self.encode_param()
        );
        self.service_key = self.build_service_key()
    }

    /// Stable identity of the instance this url points at. Two urls that differ
    /// only in volatile params map to the same identity.
    pub fn to_identity_string(&self) -> String {
        format!(
            "{}://{}:{}/{}",
            self.scheme, self.ip, self.port, self.service_key
        )
    }

    pub fn to_identity_string_with_method(&self, method_name: &str) -> String {
        format!("{}#{}", self.to_identity_string(), method_name)
    }

    // short_url is used for tcp listening
    pub fn short_url(&self) -> String {
        format!(
            "{}://{}:{}/{}",
            self.scheme, self.ip, self.port, self.service_name
        )
    }

    pub fn protocol(&self) -> String {
        self.scheme.clone()
    }

    pub fn get_ip_port(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl Display for Url {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.raw_url_string().as_str())
    }
}

impl From<&str> for Url {
    fn from(url: &str) -> Self {
        Url::from_url(url).unwrap_or_default()
    }
}
