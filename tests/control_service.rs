//! Drives `ControlApi` directly, the way `cloud-service`'s `it_tests.rs`
//! exercises its services without going over the wire, covering the literal
//! scenarios and quantified properties from the testable-properties section.

use tonic::Request;

use flowctl::grpcapi::ControlApi;
use flowctl::proto::control_service_server::ControlService;
use flowctl::proto::{
    AddTcRequest, AddWorkerRequest, ConnectModulesRequest, CreateModuleRequest, DestroyModuleRequest,
    Empty, GetModuleInfoRequest, ListTcsRequest, TrafficClass,
};
use flowctl::runtime::Runtime;

fn api() -> ControlApi {
    ControlApi::new(Runtime::new())
}

#[tokio::test]
async fn add_worker_then_list_workers_reports_default_tc() {
    let api = api();

    let resp = api
        .add_worker(Request::new(AddWorkerRequest { wid: 0, core: 0 }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(resp.error.unwrap().err, 0);

    let workers = api.list_workers(Request::new(Empty {})).await.unwrap().into_inner();
    assert_eq!(workers.workers_status.len(), 1);
    let w = &workers.workers_status[0];
    assert_eq!(w.wid, 0);
    assert!(w.running);
    assert_eq!(w.core, 0);
    assert_eq!(w.num_tcs, 1);
    assert_eq!(w.silent_drops, 0);
}

#[tokio::test]
async fn add_worker_with_out_of_range_wid_fails_einval() {
    let api = api();
    let resp = api
        .add_worker(Request::new(AddWorkerRequest { wid: 9999, core: 0 }))
        .await
        .unwrap()
        .into_inner();
    let error = resp.error.unwrap();
    assert_eq!(error.err, 22);
}

#[tokio::test]
async fn add_tc_then_list_tcs_shows_worker_default_as_parent() {
    let api = api();
    api.add_worker(Request::new(AddWorkerRequest { wid: 0, core: 0 }))
        .await
        .unwrap();

    let resp = api
        .add_tc(Request::new(AddTcRequest {
            class: Some(TrafficClass {
                name: "bulk".to_string(),
                wid: 0,
                priority: 5,
                limit: Some(flowctl::proto::ResourceCounts {
                    schedules: 0,
                    cycles: 0,
                    packets: 1_000_000,
                    bits: 0,
                }),
                max_burst: None,
            }),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(resp.error.unwrap().err, 0);

    let tcs = api
        .list_tcs(Request::new(ListTcsRequest { wid: Some(0) }))
        .await
        .unwrap()
        .into_inner();
    let bulk = tcs.classes_status.iter().find(|c| c.name == "bulk").unwrap();
    assert!(!bulk.parent.is_empty());
    assert_eq!(bulk.wid, 0);
}

#[tokio::test]
async fn add_tc_duplicate_name_fails() {
    let api = api();
    api.add_worker(Request::new(AddWorkerRequest { wid: 0, core: 0 }))
        .await
        .unwrap();

    let class = TrafficClass {
        name: "bulk".to_string(),
        wid: 0,
        priority: 5,
        limit: None,
        max_burst: None,
    };
    api.add_tc(Request::new(AddTcRequest { class: Some(class.clone()) }))
        .await
        .unwrap();
    let resp = api
        .add_tc(Request::new(AddTcRequest { class: Some(class) }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(resp.error.unwrap().err, 22);
}

#[tokio::test]
async fn create_connect_destroy_module_round_trip() {
    let api = api();

    let src = api
        .create_module(Request::new(CreateModuleRequest {
            name: "src".to_string(),
            mclass: "Source".to_string(),
            arg: Some(flowctl::proto::create_module_request::Arg::SourceArg(
                flowctl::proto::SourceArg {},
            )),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(src.error.unwrap().err, 0);
    assert_eq!(src.name, "src");

    api.create_module(Request::new(CreateModuleRequest {
        name: "snk".to_string(),
        mclass: "Sink".to_string(),
        arg: Some(flowctl::proto::create_module_request::Arg::SinkArg(
            flowctl::proto::SinkArg {},
        )),
    }))
    .await
    .unwrap();

    api.connect_modules(Request::new(ConnectModulesRequest {
        m1: "src".to_string(),
        ogate: 0,
        m2: "snk".to_string(),
        igate: 0,
    }))
    .await
    .unwrap();

    let info = api
        .get_module_info(Request::new(GetModuleInfoRequest {
            name: "src".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(info.ogates.len(), 1);
    assert_eq!(info.ogates[0].name, "snk");
    assert_eq!(info.ogates[0].igate, 0);

    api.destroy_module(Request::new(DestroyModuleRequest {
        name: "src".to_string(),
    }))
    .await
    .unwrap();

    let snk_info = api
        .get_module_info(Request::new(GetModuleInfoRequest {
            name: "snk".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(snk_info.igates.is_empty());
}

#[tokio::test]
async fn reset_all_leaves_every_table_empty() {
    let api = api();
    api.add_worker(Request::new(AddWorkerRequest { wid: 0, core: 0 }))
        .await
        .unwrap();
    api.create_module(Request::new(CreateModuleRequest {
        name: "src".to_string(),
        mclass: "Source".to_string(),
        arg: Some(flowctl::proto::create_module_request::Arg::SourceArg(
            flowctl::proto::SourceArg {},
        )),
    }))
    .await
    .unwrap();

    let resp = api.reset_all(Request::new(Empty {})).await.unwrap().into_inner();
    assert_eq!(resp.error.unwrap().err, 0);

    let modules = api.list_modules(Request::new(Empty {})).await.unwrap().into_inner();
    assert!(modules.modules.is_empty());
    let workers = api.list_workers(Request::new(Empty {})).await.unwrap().into_inner();
    assert!(workers.workers_status.is_empty());
}
