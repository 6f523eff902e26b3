//! Telegram long-polling loop feeding the intake dialogue.

use std::future::Future;
use std::time::Duration;

use telegram::{BotClient, TelegramError, Update};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::intake::{Intake, IntakeEvent, SUBMITTED};
use crate::staging::{StagingError, StagingFile};

/// Pause after a failed poll before asking again.
const RETRY_DELAY: Duration = Duration::from_secs(5);
const SAVE_FAILED: &str = "Could not save the request, please try again later.";

#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Telegram(#[from] TelegramError),
    #[error(transparent)]
    Staging(#[from] StagingError),
}

pub struct IntakeBot {
    client: BotClient,
    staging: StagingFile,
    intake: Intake,
    poll_timeout_secs: u64,
    offset: Option<i64>,
}

impl IntakeBot {
    pub fn new(client: BotClient, staging: StagingFile, poll_timeout_secs: u64) -> Self {
        Self {
            client,
            staging,
            intake: Intake::new(),
            poll_timeout_secs,
            offset: None,
        }
    }

    /// Poll until `shutdown` resolves.
    pub async fn run<F: Future<Output = ()>>(mut self, shutdown: F) {
        info!("Intake bot polling for updates");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Intake bot stopping");
                    break;
                }
                result = self.poll_once() => {
                    if let Err(e) = result {
                        warn!("Polling failed: {}", e);
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }
    }

    /// Fetch one batch of updates and handle each of them.
    pub async fn poll_once(&mut self) -> Result<usize, BotError> {
        let updates = self
            .client
            .get_updates(self.offset, self.poll_timeout_secs)
            .await?;

        for update in &updates {
            self.offset = Some(update.update_id + 1);
            if let Err(e) = self.handle_update(update).await {
                error!("Failed to handle update {}: {}", update.update_id, e);
            }
        }
        Ok(updates.len())
    }

    pub async fn handle_update(&mut self, update: &Update) -> Result<(), BotError> {
        let Some(message) = &update.message else {
            return Ok(());
        };
        let Some(text) = &message.text else {
            return Ok(());
        };
        let chat_id = message.chat.id;

        match self.intake.handle(chat_id, text) {
            IntakeEvent::Ignored => Ok(()),
            IntakeEvent::Reply(reply) => Ok(self.client.send_message(chat_id, reply).await?),
            IntakeEvent::Completed(submission) => {
                if let Err(e) = self.staging.append(submission).await {
                    self.client.send_message(chat_id, SAVE_FAILED).await?;
                    return Err(e.into());
                }
                Ok(self.client.send_message(chat_id, SUBMITTED).await?)
            }
        }
    }
}
