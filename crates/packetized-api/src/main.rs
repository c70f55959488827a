use packetized_api::setup;
use packetized_core::Config;

// Use mimalloc as the global allocator for lower fragmentation under large
// multipart uploads, especially on musl-based container images.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = setup::initialize_app(config.clone()).await?;

    setup::server::start_server(&config, router, &state.pipeline.job_queue).await?;

    Ok(())
}
