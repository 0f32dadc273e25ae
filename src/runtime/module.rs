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

//! Directed multigraph of modules connected by gates (spec §4.6). Modules
//! are referenced by stable name, gate peers by `(module, index)` handles
//! rather than owning pointers, so cyclic pipelines and safe teardown of
//! cycles both fall out for free (spec §9).

use std::collections::HashMap;

use super::driver::{AttrMode, DriverRegistry};
use super::error::{RuntimeError, RuntimeResult};
use super::namespace::{NameKind, Namespace};
use super::task::Task;
use super::tc::TcTable;

/// Defensive cap on gate-array growth; not specified numerically by the
/// spec, chosen to bound a single misbehaving client request.
pub const MAX_GATES: u32 = 256;

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub size: u64,
    pub mode: AttrMode,
    pub offset: u64,
}

#[derive(Debug, Clone, Default)]
pub struct OGateCell {
    pub peer_module: String,
    pub peer_igate: u32,
    pub cnt: u64,
    pub pkts: u64,
    pub tcpdump_fifo: Option<String>,
}

pub struct Module {
    pub name: String,
    pub mclass: String,
    pub desc: String,
    /// `igates[i]` is the list of `(producer module, ogate index)` pairs
    /// feeding this igate. Empty means inactive.
    pub igates: Vec<Vec<(String, u32)>>,
    /// `ogates[o]` is `Some` while connected (an ogate has at most one
    /// peer); `None` means inactive.
    pub ogates: Vec<Option<OGateCell>>,
    pub attrs: Vec<Attribute>,
    pub tasks: Vec<Option<Task>>,
}

impl Module {
    fn ensure_igate(&mut self, igate: u32) -> RuntimeResult<()> {
        if igate >= MAX_GATES {
            return Err(RuntimeError::invalid(format!(
                "igate {igate} exceeds the maximum gate count"
            )));
        }
        if igate as usize >= self.igates.len() {
            self.igates.resize((igate + 1) as usize, Vec::new());
        }
        Ok(())
    }

    fn ensure_ogate(&mut self, ogate: u32) -> RuntimeResult<()> {
        if ogate >= MAX_GATES {
            return Err(RuntimeError::invalid(format!(
                "ogate {ogate} exceeds the maximum gate count"
            )));
        }
        if ogate as usize >= self.ogates.len() {
            self.ogates.resize_with((ogate + 1) as usize, || None);
        }
        Ok(())
    }

    pub fn is_igate_active(&self, igate: u32) -> bool {
        self.igates
            .get(igate as usize)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    pub fn is_ogate_active(&self, ogate: u32) -> bool {
        self.ogates
            .get(ogate as usize)
            .map(|c| c.is_some())
            .unwrap_or(false)
    }
}

pub struct ModuleBrief {
    pub name: String,
    pub mclass: String,
    pub desc: String,
}

pub struct IGateInfo {
    pub igate: u32,
    /// `(ogate index, producer module name)` pairs feeding this igate.
    pub ogates: Vec<(u32, String)>,
}

pub struct OGateInfo {
    pub ogate: u32,
    pub peer_module: String,
    pub peer_igate: u32,
    pub cnt: u64,
    pub pkts: u64,
}

pub struct ModuleInfo {
    pub name: String,
    pub mclass: String,
    pub desc: String,
    pub igates: Vec<IGateInfo>,
    pub ogates: Vec<OGateInfo>,
    pub attrs: Vec<Attribute>,
}

#[derive(Default)]
pub struct ModuleGraph {
    modules: HashMap<String, Module>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules.get_mut(name)
    }

    pub fn create(
        &mut self,
        namespace: &mut Namespace,
        drivers: &DriverRegistry,
        name: &str,
        mclass: &str,
        args: &super::driver::ModuleArg,
    ) -> RuntimeResult<()> {
        if mclass.is_empty() {
            return Err(RuntimeError::invalid("Missing 'mclass' field"));
        }
        if name.is_empty() {
            return Err(RuntimeError::invalid("Missing 'name' field"));
        }
        if !Namespace::is_valid_name(name) {
            return Err(RuntimeError::invalid(format!("'{name}' is an invalid name")));
        }
        if namespace.exists(name) {
            return Err(RuntimeError::conflict(format!(
                "Name '{name}' already exists"
            )));
        }

        let driver = drivers
            .find_mclass(mclass)
            .ok_or_else(|| RuntimeError::not_found(format!("No mclass '{mclass}' found")))?;

        let spec = driver.construct(name, args)?;

        namespace.insert(name, NameKind::Module);
        self.modules.insert(
            name.to_string(),
            Module {
                name: name.to_string(),
                mclass: mclass.to_string(),
                desc: spec.desc,
                igates: vec![Vec::new(); spec.num_igates as usize],
                ogates: (0..spec.num_ogates).map(|_| None).collect(),
                attrs: spec.attrs,
                tasks: spec.tasks.into_iter().map(|declared| declared.then(Task::default)).collect(),
            },
        );
        Ok(())
    }

    /// Disconnects every incident edge, detaches tasks, and removes the
    /// module from the namespace (spec §4.6, invariant I7's "client must
    /// destroy/detach first" is enforced at the task level by detaching
    /// here — module destruction always succeeds once tasks are only
    /// attached, never pins the TC itself).
    pub fn destroy(&mut self, namespace: &mut Namespace, tcs: &mut TcTable, name: &str) -> RuntimeResult<()> {
        if name.is_empty() {
            return Err(RuntimeError::invalid("Argument must be a name in str"));
        }
        if !self.modules.contains_key(name) {
            return Err(RuntimeError::not_found(format!("No module '{name}' found")));
        }

        // Tear down outgoing edges.
        let ogate_count = self.modules[name].ogates.len() as u32;
        for ogate in 0..ogate_count {
            let _ = self.disconnect_internal(name, ogate);
        }

        // Tear down incoming edges (this module as the peer of others' ogates).
        let producers: Vec<(String, u32)> = self
            .modules
            .iter()
            .flat_map(|(producer, m)| {
                m.ogates.iter().enumerate().filter_map(move |(o, cell)| {
                    cell.as_ref()
                        .filter(|c| c.peer_module == name)
                        .map(|_| (producer.clone(), o as u32))
                })
            })
            .collect();
        for (producer, ogate) in producers {
            let _ = self.disconnect_internal(&producer, ogate);
        }

        // Detach tasks.
        if let Some(m) = self.modules.get(name) {
            let tc_names: Vec<String> = m.tasks.iter().flatten().filter_map(|t| t.attached_tc.clone()).collect();
            for tc_name in tc_names {
                tcs.detach_task(&tc_name);
            }
        }

        self.modules.remove(name);
        namespace.remove(name);
        Ok(())
    }

    pub fn connect(
        &mut self,
        m1: &str,
        ogate: u32,
        m2: &str,
        igate: u32,
    ) -> RuntimeResult<()> {
        if m1.is_empty() || m2.is_empty() {
            return Err(RuntimeError::invalid("Missing 'm1' or 'm2' field"));
        }
        if !self.modules.contains_key(m1) {
            return Err(RuntimeError::not_found(format!("No module '{m1}' found")));
        }
        if !self.modules.contains_key(m2) {
            return Err(RuntimeError::not_found(format!("No module '{m2}' found")));
        }

        {
            let src = self.modules.get_mut(m1).unwrap();
            src.ensure_ogate(ogate)?;
            if src.is_ogate_active(ogate) {
                return Err(RuntimeError::conflict(format!(
                    "ogate {ogate} of '{m1}' is already connected"
                )));
            }
        }
        self.modules.get_mut(m2).unwrap().ensure_igate(igate)?;

        self.modules.get_mut(m1).unwrap().ogates[ogate as usize] = Some(OGateCell {
            peer_module: m2.to_string(),
            peer_igate: igate,
            cnt: 0,
            pkts: 0,
            tcpdump_fifo: None,
        });
        self.modules.get_mut(m2).unwrap().igates[igate as usize].push((m1.to_string(), ogate));

        Ok(())
    }

    pub fn disconnect(&mut self, name: &str, ogate: u32) -> RuntimeResult<()> {
        if name.is_empty() {
            return Err(RuntimeError::invalid("Missing 'name' field"));
        }
        if !self.modules.contains_key(name) {
            return Err(RuntimeError::not_found(format!("No module '{name}' found")));
        }
        self.disconnect_internal(name, ogate)
    }

    fn disconnect_internal(&mut self, name: &str, ogate: u32) -> RuntimeResult<()> {
        let cell = self
            .modules
            .get_mut(name)
            .and_then(|m| m.ogates.get_mut(ogate as usize))
            .and_then(|c| c.take());

        let cell = match cell {
            Some(c) => c,
            None => {
                return Err(RuntimeError::not_found(format!(
                    "Disconnection {name}:{ogate} failed: not connected"
                )))
            }
        };

        if let Some(peer) = self.modules.get_mut(&cell.peer_module) {
            if let Some(upstream) = peer.igates.get_mut(cell.peer_igate as usize) {
                upstream.retain(|(m, o)| !(m == name && *o == ogate));
            }
        }

        Ok(())
    }

    pub fn info(&self, name: &str) -> RuntimeResult<ModuleInfo> {
        if name.is_empty() {
            return Err(RuntimeError::invalid("Missing 'name' field"));
        }
        let m = self
            .modules
            .get(name)
            .ok_or_else(|| RuntimeError::not_found(format!("No module '{name}' found")))?;

        let igates = m
            .igates
            .iter()
            .enumerate()
            .filter(|(_, producers)| !producers.is_empty())
            .map(|(i, producers)| IGateInfo {
                igate: i as u32,
                ogates: producers
                    .iter()
                    .map(|(module, ogate)| (*ogate, module.clone()))
                    .collect(),
            })
            .collect();

        let ogates = m
            .ogates
            .iter()
            .enumerate()
            .filter_map(|(o, cell)| {
                cell.as_ref().map(|c| OGateInfo {
                    ogate: o as u32,
                    peer_module: c.peer_module.clone(),
                    peer_igate: c.peer_igate,
                    cnt: c.cnt,
                    pkts: c.pkts,
                })
            })
            .collect();

        Ok(ModuleInfo {
            name: m.name.clone(),
            mclass: m.mclass.clone(),
            desc: m.desc.clone(),
            igates,
            ogates,
            attrs: m.attrs.clone(),
        })
    }

    pub fn list(&self) -> Vec<ModuleBrief> {
        self.modules
            .values()
            .map(|m| ModuleBrief {
                name: m.name.clone(),
                mclass: m.mclass.clone(),
                desc: m.desc.clone(),
            })
            .collect()
    }

    pub fn reset(&mut self, namespace: &mut Namespace, tcs: &mut TcTable) {
        loop {
            let next = match self.modules.keys().next() {
                Some(name) => name.clone(),
                None => break,
            };
            let _ = self.destroy(namespace, tcs, &next);
        }
    }

    pub fn enable_tcpdump(&mut self, name: &str, ogate: u32, fifo: &str) -> RuntimeResult<()> {
        if name.is_empty() {
            return Err(RuntimeError::invalid("Missing 'name' field"));
        }
        let m = self
            .modules
            .get_mut(name)
            .ok_or_else(|| RuntimeError::not_found(format!("No module '{name}' found")))?;
        if ogate as usize >= m.ogates.len() {
            return Err(RuntimeError::invalid(format!(
                "Output gate '{ogate}' does not exist"
            )));
        }
        match m.ogates.get_mut(ogate as usize).and_then(|c| c.as_mut()) {
            Some(cell) => {
                cell.tcpdump_fifo = Some(fifo.to_string());
                Ok(())
            }
            None => Err(RuntimeError::invalid(format!(
                "Enabling tcpdump {name}:{ogate} failed: gate not connected"
            ))),
        }
    }

    pub fn disable_tcpdump(&mut self, name: &str, ogate: u32) -> RuntimeResult<()> {
        if name.is_empty() {
            return Err(RuntimeError::invalid("Missing 'name' field"));
        }
        let m = self
            .modules
            .get_mut(name)
            .ok_or_else(|| RuntimeError::not_found(format!("No module '{name}' found")))?;
        if ogate as usize >= m.ogates.len() {
            return Err(RuntimeError::invalid(format!(
                "Output gate '{ogate}' does not exist"
            )));
        }
        if let Some(cell) = m.ogates.get_mut(ogate as usize).and_then(|c| c.as_mut()) {
            cell.tcpdump_fifo = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::driver::DriverRegistry;

    fn setup() -> (Namespace, ModuleGraph, DriverRegistry) {
        (Namespace::new(), ModuleGraph::new(), DriverRegistry::with_builtins())
    }

    #[test]
    fn create_connect_get_info_round_trip() {
        let (mut ns, mut graph, drivers) = setup();
        graph
            .create(&mut ns, &drivers, "src", "Source", &super::super::driver::ModuleArg::Source)
            .unwrap();
        graph
            .create(&mut ns, &drivers, "snk", "Sink", &super::super::driver::ModuleArg::Sink)
            .unwrap();
        graph.connect("src", 0, "snk", 0).unwrap();

        let src = graph.get("src").unwrap();
        assert!(src.is_ogate_active(0));
        let snk = graph.get("snk").unwrap();
        assert!(snk.is_igate_active(0));
    }

    #[test]
    fn connect_refuses_reconnecting_an_active_ogate() {
        let (mut ns, mut graph, drivers) = setup();
        graph
            .create(&mut ns, &drivers, "src", "Source", &super::super::driver::ModuleArg::Source)
            .unwrap();
        graph
            .create(&mut ns, &drivers, "snk", "Sink", &super::super::driver::ModuleArg::Sink)
            .unwrap();
        graph
            .create(&mut ns, &drivers, "snk2", "Sink", &super::super::driver::ModuleArg::Sink)
            .unwrap();
        graph.connect("src", 0, "snk", 0).unwrap();
        let err = graph.connect("src", 0, "snk2", 0).unwrap_err();
        assert_eq!(err.errno(), super::super::error::EEXIST);
    }

    #[test]
    fn disconnect_then_reconnect_restores_inactive_gates() {
        let (mut ns, mut graph, drivers) = setup();
        graph
            .create(&mut ns, &drivers, "src", "Source", &super::super::driver::ModuleArg::Source)
            .unwrap();
        graph
            .create(&mut ns, &drivers, "snk", "Sink", &super::super::driver::ModuleArg::Sink)
            .unwrap();
        graph.connect("src", 0, "snk", 0).unwrap();
        graph.disconnect("src", 0).unwrap();

        assert!(!graph.get("src").unwrap().is_ogate_active(0));
        assert!(!graph.get("snk").unwrap().is_igate_active(0));
    }

    #[test]
    fn disconnect_unconnected_ogate_fails() {
        let (mut ns, mut graph, drivers) = setup();
        graph
            .create(&mut ns, &drivers, "src", "Source", &super::super::driver::ModuleArg::Source)
            .unwrap();
        let err = graph.disconnect("src", 0).unwrap_err();
        assert_eq!(err.errno(), super::super::error::ENOENT);
    }

    #[test]
    fn destroy_tears_down_upstream_link() {
        let (mut ns, mut graph, drivers) = setup();
        let mut tcs = TcTable::new();
        graph
            .create(&mut ns, &drivers, "src", "Source", &super::super::driver::ModuleArg::Source)
            .unwrap();
        graph
            .create(&mut ns, &drivers, "snk", "Sink", &super::super::driver::ModuleArg::Sink)
            .unwrap();
        graph.connect("src", 0, "snk", 0).unwrap();

        graph.destroy(&mut ns, &mut tcs, "src").unwrap();
        assert!(!graph.get("snk").unwrap().is_igate_active(0));
        assert!(!ns.exists("src"));
    }
}
