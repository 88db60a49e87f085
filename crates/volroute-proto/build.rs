use tonic_build::manual::{Builder, Method, Service};

fn method(name: &str, route: &str, input: &str, output: &str) -> tonic_build::manual::MethodBuilder {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("super::{input}"))
        .output_type(format!("super::{output}"))
        .codec_path("tonic::codec::ProstCodec")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Messages are hand-written prost structs in src/master.rs; only the
    // client stub is generated, so no protoc is needed at build time.
    let seaweed = Service::builder()
        .name("Seaweed")
        .package("master_pb")
        .method(
            method(
                "keep_connected",
                "KeepConnected",
                "KeepConnectedRequest",
                "KeepConnectedResponse",
            )
            .client_streaming()
            .server_streaming()
            .build(),
        )
        .method(
            method(
                "lookup_volume",
                "LookupVolume",
                "LookupVolumeRequest",
                "LookupVolumeResponse",
            )
            .build(),
        )
        .method(
            method(
                "get_master_configuration",
                "GetMasterConfiguration",
                "GetMasterConfigurationRequest",
                "GetMasterConfigurationResponse",
            )
            .build(),
        )
        .build();

    Builder::new()
        .build_server(false)
        .build_client(true)
        .compile(&[seaweed]);

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
