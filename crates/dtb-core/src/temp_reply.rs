//! Replies that retract themselves (and the triggering reaction) after a delay.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::{
    domain::{MessageRef, ReactionInfo, SourceMessage},
    mediator::{Command, CommandHandler, Context, Mediator},
    ports::GatewayPort,
    utils::{run_cancellable, sleep_cancellable},
    Result,
};

/// Post a reply to `source_message`. With a `deletion_delay` the reply is
/// deleted (and the reaction removed) once the delay elapses; without one it
/// stays.
#[derive(Clone, Debug, Validate)]
pub struct SendTempReply {
    #[validate(length(min = 1, message = "reply text is required"))]
    pub text: String,
    pub reaction_info: Option<ReactionInfo>,
    pub source_message: SourceMessage,
    pub deletion_delay: Option<Duration>,
}

impl Command for SendTempReply {
    type Output = MessageRef;
}

/// Delete a reply posted by [`SendTempReply`].
#[derive(Clone, Debug)]
pub struct DeleteTempReply {
    pub reply: MessageRef,
    pub source_message: SourceMessage,
    pub reaction_info: Option<ReactionInfo>,
}

impl Command for DeleteTempReply {
    type Output = ();
}

pub struct SendTempReplyHandler {
    gateway: Arc<dyn GatewayPort>,
    /// Process lifetime. Pending deletions outlive the request that scheduled
    /// them and only stop at shutdown.
    shutdown: CancellationToken,
}

impl SendTempReplyHandler {
    pub fn new(gateway: Arc<dyn GatewayPort>, shutdown: CancellationToken) -> Self {
        Self { gateway, shutdown }
    }

    fn schedule_deletion(&self, mediator: Mediator, delay: Duration, command: DeleteTempReply) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if sleep_cancellable(&shutdown, delay).await.is_err() {
                tracing::debug!(reply = ?command.reply, "shutdown before temp reply deletion");
                return;
            }
            if let Err(e) = mediator.send(command, &shutdown).await {
                tracing::warn!(error = %e, "failed to delete temp reply");
            }
        });
    }
}

#[async_trait]
impl CommandHandler<SendTempReply> for SendTempReplyHandler {
    async fn handle(&self, command: &SendTempReply, ctx: &Context<'_>) -> Result<MessageRef> {
        let reply = run_cancellable(
            ctx.cancel(),
            self.gateway.send_reply(&command.source_message, &command.text),
        )
        .await?;

        let Some(delay) = command.deletion_delay else {
            tracing::debug!(reply = ?reply, "sent permanent reply");
            return Ok(reply);
        };

        tracing::debug!(
            reply = ?reply,
            delay_secs = delay.as_secs_f64(),
            "sent temp reply, deletion scheduled"
        );
        self.schedule_deletion(
            ctx.mediator().clone(),
            delay,
            DeleteTempReply {
                reply,
                source_message: command.source_message.clone(),
                reaction_info: command.reaction_info.clone(),
            },
        );
        Ok(reply)
    }
}

pub struct DeleteTempReplyHandler {
    gateway: Arc<dyn GatewayPort>,
}

impl DeleteTempReplyHandler {
    pub fn new(gateway: Arc<dyn GatewayPort>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl CommandHandler<DeleteTempReply> for DeleteTempReplyHandler {
    async fn handle(&self, command: &DeleteTempReply, ctx: &Context<'_>) -> Result<()> {
        match run_cancellable(ctx.cancel(), self.gateway.delete_message(command.reply)).await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => return Err(e),
            // Someone (a moderator, the author) may have deleted it already.
            Err(e) => {
                tracing::warn!(reply = ?command.reply, error = %e, "failed to delete temp reply")
            }
        }

        if let Some(reaction) = &command.reaction_info {
            run_cancellable(
                ctx.cancel(),
                self.gateway
                    .remove_reaction(&command.source_message, reaction),
            )
            .await?;
        }
        Ok(())
    }
}
