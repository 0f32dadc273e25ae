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

use std::net::{Ipv4Addr, SocketAddr};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Process-level configuration. No state here outlives the process; the
/// dataflow graph itself is never persisted (see spec Non-goals).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowCtlConfig {
    pub grpc_addr: SocketAddr,
    pub tracing_filter: String,
}

impl Default for FlowCtlConfig {
    fn default() -> Self {
        Self {
            grpc_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 6670)),
            tracing_filter: "info".to_string(),
        }
    }
}

impl FlowCtlConfig {
    /// Loads configuration the way `cloud-service` does: compiled-in
    /// defaults, overridden by an optional TOML file, overridden by
    /// `FLOWCTL_`-prefixed environment variables.
    pub fn load(config_file: Option<&str>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(FlowCtlConfig::default()));

        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("FLOWCTL_")).extract()
    }

    pub fn to_safe_string(&self) -> String {
        format!(
            "grpc_addr: {}\ntracing_filter: {}",
            self.grpc_addr, self.tracing_filter
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file() {
        let config = FlowCtlConfig::load(None).unwrap();
        assert_eq!(config.grpc_addr.port(), 6670);
        assert_eq!(config.tracing_filter, "info");
    }
}
