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

//! Translates `ControlService` gRPC calls onto [`Runtime`] methods. Domain
//! failures are folded into each response's `Error` field rather than
//! returned as a non-OK `tonic::Status` (spec §7): a handler only returns
//! `Err(Status)` for a transport-level failure, which none of these
//! produce.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::proto::control_service_server::ControlService;
use crate::proto::*;
use crate::runtime::driver::{ModuleArg, PortArg};
use crate::runtime::error::RuntimeError;
use crate::runtime::tc::{ResourceCounts as RtResourceCounts, TcCreateParams};
use crate::runtime::Runtime;

fn ok_error() -> Error {
    Error {
        err: 0,
        errmsg: String::new(),
    }
}

fn err_error(e: RuntimeError) -> Error {
    Error {
        err: e.errno(),
        errmsg: e.to_string(),
    }
}

fn empty_response(result: Result<(), RuntimeError>) -> EmptyResponse {
    EmptyResponse {
        error: Some(match result {
            Ok(()) => ok_error(),
            Err(e) => err_error(e),
        }),
    }
}

fn to_proto_counts(c: RtResourceCounts) -> ResourceCounts {
    ResourceCounts {
        schedules: c.schedules,
        cycles: c.cycles,
        packets: c.packets,
        bits: c.bits,
    }
}

fn from_proto_counts(c: ResourceCounts) -> RtResourceCounts {
    RtResourceCounts {
        schedules: c.schedules,
        cycles: c.cycles,
        packets: c.packets,
        bits: c.bits,
    }
}

pub struct ControlApi {
    runtime: Arc<Runtime>,
}

impl ControlApi {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }
}

#[async_trait::async_trait]
impl ControlService for ControlApi {
    // --- Lifecycle ---

    async fn reset_all(&self, _request: Request<Empty>) -> Result<Response<EmptyResponse>, Status> {
        let result = self.runtime.reset_all().await;
        Ok(Response::new(empty_response(result)))
    }

    async fn pause_all(&self, _request: Request<Empty>) -> Result<Response<EmptyResponse>, Status> {
        self.runtime.pause_all().await;
        Ok(Response::new(empty_response(Ok(()))))
    }

    async fn resume_all(&self, _request: Request<Empty>) -> Result<Response<EmptyResponse>, Status> {
        self.runtime.resume_all();
        Ok(Response::new(empty_response(Ok(()))))
    }

    async fn kill_bess(&self, _request: Request<Empty>) -> Result<Response<EmptyResponse>, Status> {
        self.runtime.kill_bess();
        Ok(Response::new(empty_response(Ok(()))))
    }

    // --- Workers ---

    async fn add_worker(
        &self,
        request: Request<AddWorkerRequest>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let req = request.into_inner();
        let result = self.runtime.add_worker(req.wid, req.core).await;
        Ok(Response::new(empty_response(result)))
    }

    async fn list_workers(&self, _request: Request<Empty>) -> Result<Response<ListWorkersResponse>, Status> {
        let statuses = self.runtime.list_workers().await;
        let workers_status = statuses
            .into_iter()
            .map(|w| WorkerStatus {
                wid: w.wid,
                running: w.running,
                core: w.core,
                num_tcs: w.num_tcs,
                silent_drops: w.silent_drops,
            })
            .collect();
        Ok(Response::new(ListWorkersResponse {
            workers_status,
            error: Some(ok_error()),
        }))
    }

    async fn reset_workers(&self, _request: Request<Empty>) -> Result<Response<EmptyResponse>, Status> {
        let result = self.runtime.reset_workers().await;
        Ok(Response::new(empty_response(result)))
    }

    // --- Traffic classes ---

    async fn add_tc(&self, request: Request<AddTcRequest>) -> Result<Response<EmptyResponse>, Status> {
        let req = request.into_inner();
        let result = match req.class {
            Some(class) => {
                self.runtime
                    .add_tc(TcCreateParams {
                        name: class.name,
                        wid: class.wid,
                        priority: class.priority,
                        limit: class.limit.map(from_proto_counts),
                        max_burst: class.max_burst.map(from_proto_counts),
                    })
                    .await
            }
            None => Err(RuntimeError::invalid("Missing 'class' field")),
        };
        Ok(Response::new(empty_response(result)))
    }

    async fn list_tcs(&self, request: Request<ListTcsRequest>) -> Result<Response<ListTcsResponse>, Status> {
        let req = request.into_inner();
        let response = match self.runtime.list_tcs(req.wid).await {
            Ok(classes) => {
                let classes_status = classes
                    .into_iter()
                    .map(|c| TrafficClassStatus {
                        parent: c.parent,
                        tasks: c.tasks as u64,
                        name: c.name,
                        priority: c.priority,
                        wid: c.wid.map(|w| w as i64).unwrap_or(-1),
                        limit: Some(to_proto_counts(c.limit)),
                        max_burst: Some(to_proto_counts(c.max_burst)),
                    })
                    .collect();
                ListTcsResponse {
                    classes_status,
                    error: Some(ok_error()),
                }
            }
            Err(e) => ListTcsResponse {
                classes_status: Vec::new(),
                error: Some(err_error(e)),
            },
        };
        Ok(Response::new(response))
    }

    async fn get_tc_stats(
        &self,
        request: Request<GetTcStatsRequest>,
    ) -> Result<Response<GetTcStatsResponse>, Status> {
        let req = request.into_inner();
        let response = match self.runtime.get_tc_stats(&req.name).await {
            Ok((usage, timestamp)) => GetTcStatsResponse {
                timestamp,
                count: usage.schedules,
                cycles: usage.cycles,
                packets: usage.packets,
                bits: usage.bits,
                error: Some(ok_error()),
            },
            Err(e) => GetTcStatsResponse {
                timestamp: 0,
                count: 0,
                cycles: 0,
                packets: 0,
                bits: 0,
                error: Some(err_error(e)),
            },
        };
        Ok(Response::new(response))
    }

    async fn reset_tcs(&self, _request: Request<Empty>) -> Result<Response<EmptyResponse>, Status> {
        let result = self.runtime.reset_tcs().await;
        Ok(Response::new(empty_response(result)))
    }

    // --- Drivers ---

    async fn list_drivers(&self, _request: Request<Empty>) -> Result<Response<ListDriversResponse>, Status> {
        Ok(Response::new(ListDriversResponse {
            driver_names: self.runtime.list_drivers(),
            error: Some(ok_error()),
        }))
    }

    async fn get_driver_info(
        &self,
        request: Request<GetDriverInfoRequest>,
    ) -> Result<Response<GetDriverInfoResponse>, Status> {
        let req = request.into_inner();
        let response = match self.runtime.get_driver_info(&req.driver_name) {
            Ok((name, help)) => GetDriverInfoResponse {
                name,
                help,
                error: Some(ok_error()),
            },
            Err(e) => GetDriverInfoResponse {
                name: String::new(),
                help: String::new(),
                error: Some(err_error(e)),
            },
        };
        Ok(Response::new(response))
    }

    // --- Ports ---

    async fn create_port(
        &self,
        request: Request<CreatePortRequest>,
    ) -> Result<Response<CreatePortResponse>, Status> {
        let req = request.into_inner();

        let port = match req.port {
            Some(p) => p,
            None => {
                return Ok(Response::new(CreatePortResponse {
                    name: String::new(),
                    error: Some(err_error(RuntimeError::invalid("Missing 'port' field"))),
                }))
            }
        };
        let arg = match req.arg {
            Some(create_port_request::Arg::DummyArg(_)) => PortArg::Dummy,
            None => {
                return Ok(Response::new(CreatePortResponse {
                    name: String::new(),
                    error: Some(err_error(RuntimeError::invalid("Missing driver argument"))),
                }))
            }
        };

        let result = self
            .runtime
            .create_port(
                &port.name,
                &port.driver,
                req.num_inc_q,
                req.num_out_q,
                req.size_inc_q,
                req.size_out_q,
                &req.mac_addr,
                arg,
            )
            .await;

        let response = match result {
            Ok(()) => CreatePortResponse {
                name: port.name,
                error: Some(ok_error()),
            },
            Err(e) => CreatePortResponse {
                name: String::new(),
                error: Some(err_error(e)),
            },
        };
        Ok(Response::new(response))
    }

    async fn destroy_port(
        &self,
        request: Request<DestroyPortRequest>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let req = request.into_inner();
        let result = self.runtime.destroy_port(&req.name).await;
        Ok(Response::new(empty_response(result)))
    }

    async fn list_ports(&self, _request: Request<Empty>) -> Result<Response<ListPortsResponse>, Status> {
        let ports = self
            .runtime
            .list_ports()
            .await
            .into_iter()
            .map(|p| Port {
                name: p.name,
                driver: p.driver,
            })
            .collect();
        Ok(Response::new(ListPortsResponse {
            ports,
            error: Some(ok_error()),
        }))
    }

    async fn get_port_stats(
        &self,
        request: Request<GetPortStatsRequest>,
    ) -> Result<Response<GetPortStatsResponse>, Status> {
        let req = request.into_inner();
        let response = match self.runtime.get_port_stats(&req.name).await {
            Ok((inc, out)) => GetPortStatsResponse {
                inc: Some(PortStat {
                    packets: inc.packets,
                    dropped: inc.dropped,
                    bytes: inc.bytes,
                }),
                out: Some(PortStat {
                    packets: out.packets,
                    dropped: out.dropped,
                    bytes: out.bytes,
                }),
                timestamp: 0,
                error: Some(ok_error()),
            },
            Err(e) => GetPortStatsResponse {
                inc: None,
                out: None,
                timestamp: 0,
                error: Some(err_error(e)),
            },
        };
        Ok(Response::new(response))
    }

    async fn reset_ports(&self, _request: Request<Empty>) -> Result<Response<EmptyResponse>, Status> {
        let result = self.runtime.reset_ports().await;
        Ok(Response::new(empty_response(result)))
    }

    // --- Modules ---

    async fn create_module(
        &self,
        request: Request<CreateModuleRequest>,
    ) -> Result<Response<CreateModuleResponse>, Status> {
        let req = request.into_inner();
        let arg = match req.arg {
            Some(create_module_request::Arg::SourceArg(_)) => ModuleArg::Source,
            Some(create_module_request::Arg::SinkArg(_)) => ModuleArg::Sink,
            None => {
                return Ok(Response::new(CreateModuleResponse {
                    name: String::new(),
                    error: Some(err_error(RuntimeError::invalid("Missing mclass argument"))),
                }))
            }
        };

        let result = self.runtime.create_module(&req.name, &req.mclass, arg).await;
        let response = match result {
            Ok(()) => CreateModuleResponse {
                name: req.name,
                error: Some(ok_error()),
            },
            Err(e) => CreateModuleResponse {
                name: String::new(),
                error: Some(err_error(e)),
            },
        };
        Ok(Response::new(response))
    }

    async fn destroy_module(
        &self,
        request: Request<DestroyModuleRequest>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let req = request.into_inner();
        let result = self.runtime.destroy_module(&req.name).await;
        Ok(Response::new(empty_response(result)))
    }

    async fn get_module_info(
        &self,
        request: Request<GetModuleInfoRequest>,
    ) -> Result<Response<GetModuleInfoResponse>, Status> {
        let req = request.into_inner();
        let response = match self.runtime.get_module_info(&req.name).await {
            Ok(info) => {
                let igates = info
                    .igates
                    .into_iter()
                    .map(|g| IGateInfo {
                        igate: g.igate,
                        ogates: g
                            .ogates
                            .into_iter()
                            .map(|(ogate, name)| IGateOGate { ogate, name })
                            .collect(),
                    })
                    .collect();
                let ogates = info
                    .ogates
                    .into_iter()
                    .map(|g| OGateInfo {
                        ogate: g.ogate,
                        name: g.peer_module,
                        igate: g.peer_igate,
                        cnt: g.cnt,
                        pkts: g.pkts,
                        timestamp: 0,
                    })
                    .collect();
                let metadata = info
                    .attrs
                    .into_iter()
                    .map(|a| Attribute {
                        name: a.name,
                        size: a.size,
                        mode: a.mode.as_str().to_string(),
                        offset: a.offset,
                    })
                    .collect();
                GetModuleInfoResponse {
                    name: info.name,
                    mclass: info.mclass,
                    desc: info.desc,
                    igates,
                    ogates,
                    metadata,
                    error: Some(ok_error()),
                }
            }
            Err(e) => GetModuleInfoResponse {
                name: String::new(),
                mclass: String::new(),
                desc: String::new(),
                igates: Vec::new(),
                ogates: Vec::new(),
                metadata: Vec::new(),
                error: Some(err_error(e)),
            },
        };
        Ok(Response::new(response))
    }

    async fn list_modules(&self, _request: Request<Empty>) -> Result<Response<ListModulesResponse>, Status> {
        let modules = self
            .runtime
            .list_modules()
            .await
            .into_iter()
            .map(|m| ModuleBrief {
                name: m.name,
                mclass: m.mclass,
                desc: m.desc,
            })
            .collect();
        Ok(Response::new(ListModulesResponse {
            modules,
            error: Some(ok_error()),
        }))
    }

    async fn reset_modules(&self, _request: Request<Empty>) -> Result<Response<EmptyResponse>, Status> {
        let result = self.runtime.reset_modules().await;
        Ok(Response::new(empty_response(result)))
    }

    // --- Graph ---

    async fn connect_modules(
        &self,
        request: Request<ConnectModulesRequest>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .runtime
            .connect_modules(&req.m1, req.ogate, &req.m2, req.igate)
            .await;
        Ok(Response::new(empty_response(result)))
    }

    async fn disconnect_modules(
        &self,
        request: Request<DisconnectModulesRequest>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let req = request.into_inner();
        let result = self.runtime.disconnect_modules(&req.name, req.ogate).await;
        Ok(Response::new(empty_response(result)))
    }

    // --- Tasks ---

    async fn attach_task(
        &self,
        request: Request<AttachTaskRequest>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .runtime
            .attach_task(&req.name, req.taskid, &req.tc, req.wid)
            .await;
        Ok(Response::new(empty_response(result)))
    }

    // --- Debug ---

    async fn enable_tcpdump(
        &self,
        request: Request<EnableTcpdumpRequest>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let req = request.into_inner();
        let result = self.runtime.enable_tcpdump(&req.name, req.ogate, &req.fifo).await;
        Ok(Response::new(empty_response(result)))
    }

    async fn disable_tcpdump(
        &self,
        request: Request<DisableTcpdumpRequest>,
    ) -> Result<Response<EmptyResponse>, Status> {
        let req = request.into_inner();
        let result = self.runtime.disable_tcpdump(&req.name, req.ogate).await;
        Ok(Response::new(empty_response(result)))
    }
}
