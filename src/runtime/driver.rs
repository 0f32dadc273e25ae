// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Driver/mclass registries. The RPC schema encodes per-driver
//! construction arguments as a tagged variant (`ModuleArg`/`PortArg`);
//! dispatch routes through these registries rather than a compile-time
//! switch over every driver (spec §9).

use std::collections::HashMap;
use std::sync::Arc;

use super::error::RuntimeResult;
use super::module::Attribute;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrMode {
    Read,
    Write,
    Update,
}

impl AttrMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttrMode::Read => "read",
            AttrMode::Write => "write",
            AttrMode::Update => "update",
        }
    }
}

/// Per-mclass construction argument. A real deployment would carry one
/// variant per registered driver crate; this control core ships the
/// handful exercised by spec §8's testable scenarios.
#[derive(Debug, Clone)]
pub enum ModuleArg {
    Source,
    Sink,
}

pub struct ModuleSpec {
    pub desc: String,
    pub num_igates: u32,
    pub num_ogates: u32,
    pub attrs: Vec<Attribute>,
    /// `tasks[i] == true` means the driver declared task slot `i`.
    pub tasks: Vec<bool>,
}

pub trait ModuleDriver: Send + Sync {
    fn name(&self) -> &str;
    fn help(&self) -> &str;
    fn construct(&self, module_name: &str, arg: &ModuleArg) -> RuntimeResult<ModuleSpec>;
}

/// Generates packets; no inputs, one task slot driving one output gate.
struct SourceDriver;

impl ModuleDriver for SourceDriver {
    fn name(&self) -> &str {
        "Source"
    }

    fn help(&self) -> &str {
        "Generates packets out of thin air on a single task-driven ogate"
    }

    fn construct(&self, _module_name: &str, arg: &ModuleArg) -> RuntimeResult<ModuleSpec> {
        match arg {
            ModuleArg::Source => Ok(ModuleSpec {
                desc: "packet generator".to_string(),
                num_igates: 0,
                num_ogates: 1,
                attrs: Vec::new(),
                tasks: vec![true],
            }),
            other => Err(super::error::RuntimeError::invalid(format!(
                "Source module requires source_arg, got {other:?}"
            ))),
        }
    }
}

/// Consumes packets on its single igate; no outputs, no tasks of its own.
struct SinkDriver;

impl ModuleDriver for SinkDriver {
    fn name(&self) -> &str {
        "Sink"
    }

    fn help(&self) -> &str {
        "Discards every packet delivered to its single igate"
    }

    fn construct(&self, _module_name: &str, arg: &ModuleArg) -> RuntimeResult<ModuleSpec> {
        match arg {
            ModuleArg::Sink => Ok(ModuleSpec {
                desc: "packet sink".to_string(),
                num_igates: 1,
                num_ogates: 0,
                attrs: Vec::new(),
                tasks: Vec::new(),
            }),
            other => Err(super::error::RuntimeError::invalid(format!(
                "Sink module requires sink_arg, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PortArg {
    Dummy,
}

pub trait PortDriver: Send + Sync {
    fn name(&self) -> &str;
    fn help(&self) -> &str;
    fn construct(
        &self,
        port_name: &str,
        num_inc_q: u32,
        num_out_q: u32,
        arg: &PortArg,
    ) -> RuntimeResult<()>;
}

/// Accepts any queue configuration and does no real I/O. Lets
/// `CreatePort`/`DestroyPort`/`GetPortStats` be exercised without NIC
/// access (out of scope per spec §1).
struct DummyPortDriver;

impl PortDriver for DummyPortDriver {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn help(&self) -> &str {
        "No-op port driver with in-memory queue configuration only"
    }

    fn construct(
        &self,
        _port_name: &str,
        _num_inc_q: u32,
        _num_out_q: u32,
        arg: &PortArg,
    ) -> RuntimeResult<()> {
        match arg {
            PortArg::Dummy => Ok(()),
        }
    }
}

pub struct DriverRegistry {
    mclasses: HashMap<String, Arc<dyn ModuleDriver>>,
    port_drivers: HashMap<String, Arc<dyn PortDriver>>,
}

impl DriverRegistry {
    pub fn with_builtins() -> Self {
        let mut mclasses: HashMap<String, Arc<dyn ModuleDriver>> = HashMap::new();
        mclasses.insert("Source".to_string(), Arc::new(SourceDriver));
        mclasses.insert("Sink".to_string(), Arc::new(SinkDriver));

        let mut port_drivers: HashMap<String, Arc<dyn PortDriver>> = HashMap::new();
        port_drivers.insert("Dummy".to_string(), Arc::new(DummyPortDriver));

        Self {
            mclasses,
            port_drivers,
        }
    }

    pub fn find_mclass(&self, name: &str) -> Option<Arc<dyn ModuleDriver>> {
        self.mclasses.get(name).cloned()
    }

    pub fn find_driver(&self, name: &str) -> Option<Arc<dyn PortDriver>> {
        self.port_drivers.get(name).cloned()
    }

    pub fn list_drivers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.port_drivers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_source_and_sink_are_registered() {
        let registry = DriverRegistry::with_builtins();
        assert!(registry.find_mclass("Source").is_some());
        assert!(registry.find_mclass("Sink").is_some());
        assert!(registry.find_mclass("Nonexistent").is_none());
    }

    #[test]
    fn source_driver_declares_one_ogate_and_one_task() {
        let driver = SourceDriver;
        let spec = driver.construct("src", &ModuleArg::Source).unwrap();
        assert_eq!(spec.num_ogates, 1);
        assert_eq!(spec.num_igates, 0);
        assert_eq!(spec.tasks, vec![true]);
    }
}
