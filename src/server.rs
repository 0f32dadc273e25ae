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

use clap::Parser;
use tracing_subscriber::EnvFilter;

use flowctl::bootstrap;
use flowctl::config::FlowCtlConfig;

#[derive(Parser, Debug)]
#[command(name = "flowctld", about = "Control-plane daemon for a packet-switching dataflow graph")]
struct Args {
    /// Optional TOML config file, merged over the built-in defaults and
    /// overridden by `FLOWCTL_`-prefixed environment variables.
    #[arg(long, value_name = "PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = FlowCtlConfig::load(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.tracing_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("{}", config.to_safe_string());

    bootstrap::run(config).await
}
