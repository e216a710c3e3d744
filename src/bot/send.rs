//! Sending replies with simulated typing.

use serenity::all::{ChannelId, CreateAttachment, CreateMessage, Http};
use std::time::Duration;

use crate::pipeline::{Reply, IMAGE_FALLBACK};
use crate::reply::typing_delay;
use crate::state::AppState;

pub const IMAGE_FILENAME: &str = "generated_image.png";

/// Post a reply: requested images first, then the text in chunks. The first
/// chunk is prefixed with `mention` when given.
pub async fn send_reply(
    http: &Http,
    channel: ChannelId,
    mention: Option<&str>,
    reply: &Reply,
    state: &AppState,
) -> serenity::Result<()> {
    for prompt in &reply.image_prompts {
        send_image(http, channel, prompt, state).await?;
    }

    let cfg = &state.config.reply;
    let mut mention = mention;
    for chunk in reply.chunks(cfg.chunk_chars) {
        let text = match mention.take() {
            Some(m) => format!("{m} {chunk}"),
            None => chunk.to_string(),
        };

        channel.broadcast_typing(http).await?;
        tokio::time::sleep(typing_delay(
            text.chars().count(),
            cfg.typing_ms_per_char,
            cfg.typing_max_ms,
        ))
        .await;
        channel.say(http, text).await?;
        tokio::time::sleep(Duration::from_millis(cfg.pause_ms)).await;
    }
    Ok(())
}

/// Render one image prompt and upload it, or post the image fallback line.
pub async fn send_image(
    http: &Http,
    channel: ChannelId,
    prompt: &str,
    state: &AppState,
) -> serenity::Result<()> {
    channel.broadcast_typing(http).await?;
    match state.images.generate(prompt).await {
        Ok(bytes) => {
            let attachment = CreateAttachment::bytes(bytes, IMAGE_FILENAME);
            channel
                .send_message(http, CreateMessage::new().add_file(attachment))
                .await?;
        }
        Err(e) => {
            state.api_metrics.record_error(&e.kind());
            tracing::error!(error = %e, channel = %channel, "image generation failed");
            channel.say(http, IMAGE_FALLBACK).await?;
        }
    }
    Ok(())
}
