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

//! Named packet I/O endpoints bound to a driver (spec §4.7).

use std::collections::HashMap;

use super::driver::{DriverRegistry, PortArg};
use super::error::{RuntimeError, RuntimeResult};
use super::namespace::{NameKind, Namespace};

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionStats {
    pub packets: u64,
    pub dropped: u64,
    pub bytes: u64,
}

pub struct Port {
    pub name: String,
    pub driver: String,
    pub num_inc_q: u32,
    pub num_out_q: u32,
    pub size_inc_q: u32,
    pub size_out_q: u32,
    pub mac_addr: String,
    pub inc_stats: DirectionStats,
    pub out_stats: DirectionStats,
}

pub struct PortBrief {
    pub name: String,
    pub driver: String,
}

#[derive(Default)]
pub struct PortTable {
    ports: HashMap<String, Port>,
}

impl PortTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        namespace: &mut Namespace,
        drivers: &DriverRegistry,
        name: &str,
        driver_name: &str,
        num_inc_q: u32,
        num_out_q: u32,
        size_inc_q: u32,
        size_out_q: u32,
        mac_addr: &str,
        arg: &PortArg,
    ) -> RuntimeResult<()> {
        if driver_name.is_empty() {
            return Err(RuntimeError::invalid("Missing 'driver' field"));
        }
        let driver = drivers
            .find_driver(driver_name)
            .ok_or_else(|| RuntimeError::not_found(format!("No port driver '{driver_name}' found")))?;

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

        driver.construct(name, num_inc_q, num_out_q, arg)?;

        namespace.insert(name, NameKind::Port);
        self.ports.insert(
            name.to_string(),
            Port {
                name: name.to_string(),
                driver: driver_name.to_string(),
                num_inc_q,
                num_out_q,
                size_inc_q,
                size_out_q,
                mac_addr: mac_addr.to_string(),
                inc_stats: DirectionStats::default(),
                out_stats: DirectionStats::default(),
            },
        );
        Ok(())
    }

    pub fn destroy(&mut self, namespace: &mut Namespace, name: &str) -> RuntimeResult<()> {
        if name.is_empty() {
            return Err(RuntimeError::invalid("Argument must be a name in str"));
        }
        if !self.ports.contains_key(name) {
            return Err(RuntimeError::not_found(format!("No port `{name}' found")));
        }
        self.ports.remove(name);
        namespace.remove(name);
        Ok(())
    }

    pub fn get_stats(&self, name: &str) -> RuntimeResult<(DirectionStats, DirectionStats)> {
        if name.is_empty() {
            return Err(RuntimeError::invalid("Argument must be a name in str"));
        }
        let p = self
            .ports
            .get(name)
            .ok_or_else(|| RuntimeError::not_found(format!("No port '{name}' found")))?;
        Ok((p.inc_stats, p.out_stats))
    }

    pub fn list(&self) -> Vec<PortBrief> {
        self.ports
            .values()
            .map(|p| PortBrief {
                name: p.name.clone(),
                driver: p.driver.clone(),
            })
            .collect()
    }

    pub fn reset(&mut self, namespace: &mut Namespace) {
        let names: Vec<String> = self.ports.keys().cloned().collect();
        for name in names {
            let _ = self.destroy(namespace, &name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_destroy_round_trip() {
        let mut ns = Namespace::new();
        let drivers = DriverRegistry::with_builtins();
        let mut ports = PortTable::new();

        ports
            .create(&mut ns, &drivers, "p0", "Dummy", 1, 1, 64, 64, "", &PortArg::Dummy)
            .unwrap();
        assert!(ns.exists("p0"));

        ports.destroy(&mut ns, "p0").unwrap();
        assert!(!ns.exists("p0"));
    }

    #[test]
    fn create_rejects_unknown_driver() {
        let mut ns = Namespace::new();
        let drivers = DriverRegistry::with_builtins();
        let mut ports = PortTable::new();

        let err = ports
            .create(&mut ns, &drivers, "p0", "Nonexistent", 1, 1, 64, 64, "", &PortArg::Dummy)
            .unwrap_err();
        assert_eq!(err.errno(), super::super::error::ENOENT);
    }
}
