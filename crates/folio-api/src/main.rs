use folio_core::Config;

// mimalloc keeps fragmentation low for the many short-lived PDF buffers,
// especially on musl-based container images.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = folio_api::setup::initialize_app(config.clone()).await?;

    folio_api::setup::server::start_server(&config, router).await?;

    if let Some(tasks) = &state.tasks {
        tasks.task_queue.shutdown().await;
    }
    folio_infra::shutdown_telemetry().await;

    Ok(())
}
