/*
 * Copyright 2023 Aon Cyber Solutions
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

pub mod base_block;
pub mod cell_key_node;
pub mod cell_key_value;
pub mod domain_f;
pub mod err;
pub mod hash_decrypt;
pub mod hive;
pub mod log;
pub(crate) mod macros;
pub mod registry;
pub mod sam_registry;
pub mod scanner;
pub mod sub_key_list;
pub mod system_registry;
pub mod user_f;
pub mod user_v;
pub mod util;

#[cfg(test)]
pub(crate) mod mock_registry;
