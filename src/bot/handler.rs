//! Gateway event handler.

use serenity::all::{
    ChannelId, Command, CommandDataOptionValue, CommandInteraction,
    CommandOptionType, Context, CreateAttachment, CreateCommand, CreateCommandOption,
    CreateInteractionResponseFollowup, EventHandler, Http, Interaction, Message, Ready, UserId,
};
use serenity::async_trait;
use std::sync::{Arc, OnceLock};
use tokio::sync::Notify;

use super::inbound::{addressed_to_bot, clean_prompt, is_shutdown_request, Addressing};
use super::send::{send_reply, IMAGE_FILENAME};
use crate::pipeline::{self, Inbound, ERROR_FALLBACK, IMAGE_FALLBACK};
use crate::state::AppState;

const SHUTDOWN_REPLY: &str = "Shutting down... Catch you on the flip side! 👋";

pub struct Handler {
    state: Arc<AppState>,
    bot_id: OnceLock<UserId>,
    owner_id: OnceLock<u64>,
    /// Notified by `!shutdown`; `bot::run` closes the shards.
    shutdown: Arc<Notify>,
}

impl Handler {
    pub fn new(state: Arc<AppState>, shutdown: Arc<Notify>) -> Self {
        Self {
            state,
            bot_id: OnceLock::new(),
            owner_id: OnceLock::new(),
            shutdown,
        }
    }

    /// The configured owner, else the owner of the Discord application.
    async fn resolve_owner(&self, ctx: &Context) -> Option<u64> {
        if let Some(id) = self.state.config.discord.owner_id {
            return Some(id);
        }
        match ctx.http.get_current_application_info().await {
            Ok(info) => info.owner.map(|user| user.id.get()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch application owner, !shutdown disabled");
                None
            }
        }
    }

    async fn handle_message(&self, ctx: &Context, msg: &Message) -> anyhow::Result<()> {
        let discord = &self.state.config.discord;
        let inbound = Inbound {
            channel_id: msg.channel_id.to_string(),
            user_id: msg.author.id.to_string(),
            prompt: clean_prompt(&msg.content, &discord.bot_name),
        };
        tracing::info!(
            channel = %inbound.channel_id,
            user = %inbound.user_id,
            chars = inbound.prompt.len(),
            "processing message"
        );

        msg.channel_id.broadcast_typing(&ctx.http).await?;
        let reply = pipeline::respond(&self.state, &inbound).await;

        let mention = format!("<@{}>", msg.author.id);
        send_reply(&ctx.http, msg.channel_id, Some(&mention), &reply, &self.state).await?;

        if let Some(count) = reply.follow_ups {
            spawn_thought_chain(
                Arc::clone(&ctx.http),
                Arc::clone(&self.state),
                msg.channel_id,
                inbound.user_id,
                count,
            );
        }
        Ok(())
    }

    async fn handle_create(&self, ctx: &Context, command: &CommandInteraction) {
        self.state.bot_metrics.increment_commands();
        let prompt = command
            .data
            .options
            .iter()
            .find(|o| o.name == "prompt")
            .and_then(|o| match &o.value {
                CommandDataOptionValue::String(s) => Some(s.as_str()),
                _ => None,
            })
            .unwrap_or_default();

        if let Err(e) = command.defer(&ctx.http).await {
            tracing::error!(error = %e, "failed to defer /create");
            return;
        }

        let followup = match self.state.images.generate(prompt).await {
            Ok(bytes) => CreateInteractionResponseFollowup::new()
                .add_file(CreateAttachment::bytes(bytes, IMAGE_FILENAME)),
            Err(e) => {
                self.state.api_metrics.record_error(&e.kind());
                tracing::error!(error = %e, user = %command.user.id, "/create failed");
                CreateInteractionResponseFollowup::new().content(IMAGE_FALLBACK)
            }
        };
        if let Err(e) = command.create_followup(&ctx.http, followup).await {
            tracing::error!(error = %e, "failed to send /create result");
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        let _ = self.bot_id.set(ready.user.id);
        tracing::info!(user = %ready.user.name, id = %ready.user.id, "connected to Discord");
        if let Some(owner) = self.resolve_owner(&ctx).await {
            let _ = self.owner_id.set(owner);
        }

        let create = CreateCommand::new("create")
            .description("Generate an image based on your prompt")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "prompt", "What to draw")
                    .required(true),
            );
        match Command::create_global_command(&ctx.http, create).await {
            Ok(cmd) => tracing::info!(command = %cmd.name, "registered slash command"),
            Err(e) => tracing::error!(error = %e, "failed to register /create"),
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if is_shutdown_request(&msg.content, msg.author.id.get(), self.owner_id.get().copied()) {
            self.state.bot_metrics.increment_commands();
            tracing::info!(user = %msg.author.id, "shutdown requested");
            if let Err(e) = msg.channel_id.say(&ctx.http, SHUTDOWN_REPLY).await {
                tracing::warn!(error = %e, "failed to send shutdown reply");
            }
            self.shutdown.notify_one();
            return;
        }

        let bot_id = self.bot_id.get().copied();
        let discord = &self.state.config.discord;
        let addressing = Addressing {
            content: &msg.content,
            from_self: Some(msg.author.id) == bot_id,
            from_bot: msg.author.bot,
            mentions_bot: bot_id.is_some_and(|id| msg.mentions.iter().any(|u| u.id == id)),
            is_dm: msg.guild_id.is_none(),
        };
        if !addressed_to_bot(&addressing, &discord.bot_name, discord.respond_in_dms) {
            return;
        }

        self.state.bot_metrics.increment_messages();
        if let Err(e) = self.handle_message(&ctx, &msg).await {
            self.state.bot_metrics.increment_errors();
            tracing::error!(error = %e, channel = %msg.channel_id, "message handling failed");
            let _ = msg.channel_id.say(&ctx.http, ERROR_FALLBACK).await;
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            match command.data.name.as_str() {
                "create" => self.handle_create(&ctx, &command).await,
                other => tracing::warn!(command = %other, "unknown command"),
            }
        }
    }
}

/// Send `count` thought-chain follow-ups, each after a random delay.
fn spawn_thought_chain(
    http: Arc<Http>,
    state: Arc<AppState>,
    channel: ChannelId,
    user_id: String,
    count: usize,
) {
    tokio::spawn(async move {
        let channel_id = channel.to_string();
        for step in 0..count {
            let delay = state.chains.follow_up_delay(&mut rand::rng());
            tokio::time::sleep(delay).await;

            let Some(reply) = pipeline::follow_up(&state, &channel_id, &user_id).await else {
                break;
            };
            if let Err(e) = send_reply(&http, channel, None, &reply, &state).await {
                tracing::warn!(error = %e, channel = %channel_id, step, "failed to send follow-up");
                state.chains.end_chain(&channel_id);
                break;
            }
        }
    });
}
