use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use alpr::CommandRecognizer;
use anyhow::Context;
use telegram::{BotClient, NotificationService};
use tracing::{info, warn};

use plate_gate::camera::SnapshotCamera;
use plate_gate::config::Config;
use plate_gate::recognition::feed::{spawn_sampler, FeedSettings};
use plate_gate::recognition::sampler::Sampler;
use plate_gate::recognition::RecognitionState;
use plate_gate::staging::StagingFile;
use plate_gate::web::session::SessionStore;
use plate_gate::web::{self as routes, AppState};
use plate_gate::{db, init_logging};

fn notification_service(config: &Config) -> anyhow::Result<NotificationService> {
    let telegram = &config.telegram;
    let (Some(token), Some(chat_id)) = (telegram.token.as_deref(), telegram.alert_chat_id) else {
        info!("Denied plate alerts disabled");
        return Ok(NotificationService::disabled());
    };

    let client = BotClient::with_api_url(&telegram.api_url, token)
        .context("invalid telegram settings")?;
    Ok(NotificationService::new(Some(client), Some(chat_id)))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_logging(&config.log_level);

    info!("Starting plate-gate...");

    let pool = db::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    let recognizer = Arc::new(CommandRecognizer::new(
        config.recognition.program.clone(),
        config.recognition.args.clone(),
    ));
    let camera = Arc::new(
        SnapshotCamera::new(config.camera.snapshot_url.clone(), config.camera.timeout())
            .context("failed to set up camera client")?,
    );
    let notifier = Arc::new(notification_service(&config)?);

    let sampler = Arc::new(Sampler::new(
        pool.clone(),
        recognizer,
        config.recognition.policy(),
        notifier,
        RecognitionState::new(),
    ));
    let sample_queue = spawn_sampler(sampler.clone());

    if let Err(e) = tokio::fs::create_dir_all(&config.upload_dir).await {
        warn!("Cannot create upload directory {:?}: {}", config.upload_dir, e);
    }

    let state = web::Data::new(AppState {
        pool,
        sessions: SessionStore::default(),
        sampler,
        sample_queue,
        camera,
        staging: StagingFile::new(config.staging_path.clone()),
        feed: FeedSettings {
            frame_interval: config.camera.frame_interval(),
            sample_interval: config.recognition.sample_interval(),
        },
        upload_dir: config.upload_dir.clone(),
    });

    info!("Listening on {}", config.bind_addr);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind(&config.bind_addr)
    .with_context(|| format!("failed to bind {}", config.bind_addr))?
    .run()
    .await?;

    info!("plate-gate stopped");
    Ok(())
}
