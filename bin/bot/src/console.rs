//! Console channel: reads lines from stdin and prints each reply to stdout.
//!
//! Every line is a direct message from the configured console user and is
//! dispatched on its own task, so a slow completion does not block reading.
//! Runs until the shutdown future resolves or the input is closed; on end of
//! input, in-flight replies are awaited before returning.

use chatrelay_core::UserId;
use chatrelay_dispatch::{Dispatcher, InboundEvent};
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A console transport bound to one dispatcher.
#[derive(Debug, Clone)]
pub struct ConsoleChannel {
    dispatcher: Arc<Dispatcher>,
    user_id: UserId,
    bot_id: String,
}

impl ConsoleChannel {
    /// Creates a channel sending as `user_id` to the bot identified by `bot_id`.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, user_id: UserId, bot_id: impl Into<String>) -> Self {
        Self {
            dispatcher,
            user_id,
            bot_id: bot_id.into(),
        }
    }

    /// Reads `input` line by line until closed or `shutdown` resolves.
    ///
    /// Blank lines are skipped. Replies are written to `output` one per line,
    /// in completion order.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from `input` fails.
    pub async fn run<R, W, S>(&self, input: R, output: Arc<Mutex<W>>, shutdown: S) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = ()>,
    {
        let mut lines = input.lines();
        let mut in_flight = JoinSet::new();
        tokio::pin!(shutdown);

        info!(user_id = %self.user_id, "console channel started");

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(in_flight = in_flight.len(), "shutdown signal received, closing console channel");
                    in_flight.abort_all();
                    return Ok(());
                }

                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!("console input closed");
                        break;
                    };
                    let text = line.trim();
                    if text.is_empty() {
                        continue;
                    }

                    debug!(chars = text.chars().count(), "console line received");
                    let event = InboundEvent::direct(self.user_id.clone(), self.bot_id.clone(), text);
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let output = Arc::clone(&output);
                    in_flight.spawn(async move {
                        let reply = dispatcher.handle(&event).await;
                        let mut out = output.lock().await;
                        if let Err(e) = write_line(&mut *out, reply.text()).await {
                            warn!(error = %e, "failed to write console reply");
                        }
                    });
                }

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join(joined);
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
        Ok(())
    }
}

async fn write_line<W>(out: &mut W, text: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(text.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        warn!(error = %e, "console dispatch task failed");
    }
}
