fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure().compile(
        &[
            "proto/store.proto",
            "proto/routing.proto",
            "proto/events.proto",
            "proto/sync.proto",
            "proto/naming.proto",
        ],
        &["proto"],
    )?;
    Ok(())
}
