fn main() {
    println!("cargo:rerun-if-changed=proto/control.proto");

    let out_dir = std::env::var("OUT_DIR").unwrap();
    let descriptor_path = std::path::Path::new(&out_dir).join("flowctl_control_descriptor.bin");

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(false)
        .file_descriptor_set_path(descriptor_path)
        .compile_protos(&["proto/control.proto"], &["proto"])
        .expect("failed to compile proto/control.proto");
}
