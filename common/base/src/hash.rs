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

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// 64-bit hash over any hashable value. `DefaultHasher::new()` carries fixed
/// keys, so the result is stable across calls and threads, unlike values
/// hashed through a `HashMap`'s `RandomState`.
pub fn hash_to_u64<T: Hash>(t: &T) -> u64 {
    let mut s = DefaultHasher::new();
    t.hash(&mut s);
    s.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let key = String::from("quill://127.0.0.1:8888/demo#0");
        assert_eq!(hash_to_u64(&key), hash_to_u64(&key));
    }

    #[test]
    fn test_hash_spreads() {
        assert_ne!(hash_to_u64(&"a"), hash_to_u64(&"b"));
    }
}
