use std::sync::Arc;

use lta_config::{Component, RetryPolicy, ServiceEndpoint, StageConfig, WorkerConfig};
use lta_core::{Catalog, Claimant, CommandRunner, Coordinator};
use lta_rest::{FileCatalogClient, LtaDbClient, RestSettings};
use lta_tape::{HsiToolkit, ProcessRunner};
use lta_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics, build_sha};
use lta_worker::{
    ArchiveStage, ArchiveVerifier, ArchiveWriter, ClaimLoop, ClaimSettings, TapeLayout,
    TapeSession,
};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::runtime::{HeartbeatTarget, WorkActivity, WorkSchedule, run_work_loop, spawn_heartbeat};

/// Load configuration for `component` from the environment and run until
/// shutdown, or until idle in run-once mode.
///
/// # Errors
///
/// Returns an error if configuration, logging, or client construction fails,
/// or if a work cycle fails in run-once mode.
pub async fn run_app(component: Component) -> AppResult<()> {
    let config =
        WorkerConfig::from_env(component).map_err(|err| AppError::config("config.from_env", err))?;
    let log_format = config
        .log_format
        .as_deref()
        .map_or_else(LogFormat::infer, LogFormat::from_name);
    lta_telemetry::init_logging(&LoggingConfig {
        level: &config.log_level,
        format: log_format,
        build_sha: build_sha(),
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new(component.display_name(), &config.component_name);

    info!(component = %component, "LTA tape worker starting");
    config.log_summary();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received; finishing current work");
        shutdown_tx.send(true).ok();
    });

    run_with(&config, shutdown_rx).await
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "unable to listen for interrupt");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
}

/// Wire clients, tape session and stage from `config`, then drive the work loop.
pub(crate) async fn run_with(
    config: &WorkerConfig,
    shutdown: watch::Receiver<bool>,
) -> AppResult<()> {
    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let claimant = Claimant::generate(config.component_name.clone());
    info!(claimant = %claimant, "claimant identity generated");

    let work_client: Arc<dyn Coordinator> = Arc::new(
        LtaDbClient::new(rest_settings(&config.lta_rest, config.work))
            .map_err(|err| AppError::client("client.lta_rest", err))?,
    );
    let heartbeat_client: Arc<dyn Coordinator> = Arc::new(
        LtaDbClient::new(rest_settings(&config.lta_rest, config.heartbeat))
            .map_err(|err| AppError::client("client.lta_rest_heartbeat", err))?,
    );

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
    let tape = TapeSession::new(
        runner,
        HsiToolkit::new(config.hsi_path.clone(), config.hpss_avail_path.clone()),
    )
    .with_metrics(metrics.clone());
    let layout = TapeLayout::new(config.tape_base_path.clone());
    let settings = ClaimSettings {
        claimant,
        query: config.pop_query(),
        output_status: config.output_status,
    };

    let activity = Arc::new(WorkActivity::new());
    let heartbeat = spawn_heartbeat(
        heartbeat_client,
        HeartbeatTarget {
            component_type: config.component.status_type(),
            component_name: config.component_name.clone(),
        },
        Arc::clone(&activity),
        metrics.clone(),
        config.heartbeat_sleep,
        shutdown.clone(),
    );
    let schedule = WorkSchedule {
        work_sleep: config.work_sleep,
        run_once_and_die: config.run_once_and_die,
    };

    let result = match &config.stage {
        StageConfig::Writer { rse_base_path } => {
            let writer = ArchiveWriter::new(tape, layout, rse_base_path.clone());
            let claim_loop = ClaimLoop::new(writer, Arc::clone(&work_client), settings)
                .with_metrics(metrics.clone());
            drive(&claim_loop, schedule, &activity, shutdown).await
        }
        StageConfig::Verifier { file_catalog } => {
            let catalog: Arc<dyn Catalog> = Arc::new(
                FileCatalogClient::new(rest_settings(file_catalog, config.work))
                    .map_err(|err| AppError::client("client.file_catalog", err))?,
            );
            let verifier = ArchiveVerifier::new(
                tape,
                layout,
                Arc::clone(&work_client),
                catalog,
                config.dest_site.clone(),
            )
            .with_metrics(metrics.clone());
            let claim_loop =
                ClaimLoop::new(verifier, work_client, settings).with_metrics(metrics.clone());
            drive(&claim_loop, schedule, &activity, shutdown).await
        }
    };

    heartbeat.abort();
    if let Err(err) = heartbeat.await
        && !err.is_cancelled()
    {
        error!(error = %err, "heartbeat task ended abnormally");
    }
    info!(snapshot = ?metrics.snapshot(), "LTA tape worker stopped");
    result
}

async fn drive<S: ArchiveStage>(
    claim_loop: &ClaimLoop<S>,
    schedule: WorkSchedule,
    activity: &WorkActivity,
    shutdown: watch::Receiver<bool>,
) -> AppResult<()> {
    info!(claimant = %claim_loop.claimant(), "work loop starting");
    run_work_loop(claim_loop, schedule, activity, shutdown).await
}

fn rest_settings(endpoint: &ServiceEndpoint, policy: RetryPolicy) -> RestSettings {
    RestSettings {
        base_url: endpoint.url.clone(),
        token: endpoint.token.clone(),
        timeout: policy.timeout,
        retries: policy.retries,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let owned: Vec<(String, String)> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| {
            owned
                .iter()
                .find(|(candidate, _)| candidate == key)
                .map(|(_, value)| value.clone())
        }
    }

    #[test]
    fn rest_settings_follow_the_retry_policy() -> anyhow::Result<()> {
        let endpoint = ServiceEndpoint {
            url: "https://lta.example.org/api".parse()?,
            token: "secret".into(),
        };
        let settings = rest_settings(
            &endpoint,
            RetryPolicy {
                retries: 5,
                timeout: Duration::from_secs(12),
            },
        );
        assert_eq!(settings.base_url.as_str(), "https://lta.example.org/api");
        assert_eq!(settings.token, "secret");
        assert_eq!(settings.retries, 5);
        assert_eq!(settings.timeout, Duration::from_secs(12));
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_before_start_skips_work() -> anyhow::Result<()> {
        let config = WorkerConfig::from_lookup(
            Component::Writer,
            lookup(&[
                ("COMPONENT_NAME", "mover-test"),
                ("DEST_SITE", "NERSC"),
                ("SOURCE_SITE", "WIPAC"),
                ("LTA_REST_URL", "http://127.0.0.1:9/"),
                ("LTA_REST_TOKEN", "token"),
                ("TAPE_BASE_PATH", "/home/projects/icecube"),
                ("RSE_BASE_PATH", "/global/cscratch1/sd/icecube/lta"),
                ("HSI_PATH", "/nonexistent/hsi"),
                ("HPSS_AVAIL_PATH", "/nonexistent/hpss_avail"),
            ]),
        )?;
        let (tx, rx) = watch::channel(false);
        tx.send(true)?;
        let result = tokio::time::timeout(Duration::from_secs(5), run_with(&config, rx)).await?;
        assert!(result.is_ok());
        Ok(())
    }
}
