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

//! Wires a [`Runtime`] and serves [`ControlService`] over gRPC, the way
//! `cloud-service::bootstrap` builds a `Services` value and
//! `cloud-service::grpcapi` serves it.

use std::net::SocketAddr;

use tonic::transport::Server;
use tracing::info;

use crate::config::FlowCtlConfig;
use crate::grpcapi::ControlApi;
use crate::proto::control_service_server::ControlServiceServer;
use crate::proto::FILE_DESCRIPTOR_SET;
use crate::runtime::Runtime;

/// Builds a fresh, empty [`Runtime`]. Split out from [`run`] so tests and
/// the binary entry point share the same construction path.
pub fn build_runtime() -> std::sync::Arc<Runtime> {
    Runtime::new()
}

/// Serves `ControlService` on `config.grpc_addr` until the process is
/// signaled to stop. Registers gRPC health checking and reflection
/// alongside the service, mirroring `start_grpc_server`.
pub async fn run(config: FlowCtlConfig) -> anyhow::Result<()> {
    let runtime = build_runtime();

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<ControlServiceServer<ControlApi>>()
        .await;

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let addr: SocketAddr = config.grpc_addr;
    info!(%addr, "starting flowctld control-plane server");

    Server::builder()
        .add_service(health_service)
        .add_service(reflection_service)
        .add_service(ControlServiceServer::new(ControlApi::new(runtime)))
        .serve(addr)
        .await?;

    Ok(())
}
