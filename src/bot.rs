//! Main loop: channel stream in, dispatcher, reply out.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinSet;

use crate::channels::{ChannelManager, IncomingMessage};
use crate::dispatcher::Dispatcher;
use crate::error::Result;

pub struct Bot {
    dispatcher: Arc<Dispatcher>,
    channels: Arc<ChannelManager>,
}

impl Bot {
    pub fn new(dispatcher: Arc<Dispatcher>, channels: ChannelManager) -> Self {
        Self {
            dispatcher,
            channels: Arc::new(channels),
        }
    }

    /// Run until Ctrl+C or until every channel stream has ended.
    ///
    /// Each message is handled on its own task; ordering per user is
    /// enforced by the dispatcher's user locks.
    pub async fn run(self) -> Result<()> {
        let mut message_stream = self.channels.start_all().await?;
        let mut in_flight = JoinSet::new();

        tracing::info!(channels = ?self.channels.names(), "Bot ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = done {
                        tracing::error!("Message task panicked: {e}");
                    }
                    continue;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            let dispatcher = Arc::clone(&self.dispatcher);
            let channels = Arc::clone(&self.channels);
            in_flight.spawn(async move { handle_one(&dispatcher, &channels, message).await });
        }

        // Let in-flight replies go out before closing channels.
        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                tracing::error!("Message task panicked: {e}");
            }
        }

        tracing::info!("Bot shutting down...");
        self.channels.shutdown_all().await?;
        Ok(())
    }
}

async fn handle_one(dispatcher: &Dispatcher, channels: &ChannelManager, message: IncomingMessage) {
    let response = dispatcher.handle(&message).await;
    if let Err(e) = channels.respond(&message, response).await {
        tracing::warn!(
            channel = %message.channel,
            user_id = %message.user_id,
            "Failed to deliver reply: {e}"
        );
    }
}
