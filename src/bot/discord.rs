use crate::{
    config::Config,
    error::AppError,
    media::{normalize_post_url, ExtractResult, MediaService, MediaType, YtDlpEngine},
    session::SessionStore,
    stats::{SqliteStats, StatsRecorder},
    utils,
};
use anyhow::{Context, Result};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{error, info, warn};
use twilight_cache_inmemory::InMemoryCache;
use twilight_gateway::{Event, Intents, Shard, ShardId, StreamExt};
use twilight_http::Client as HttpClient;
use twilight_model::{
    application::{
        command::CommandType,
        interaction::{Interaction, InteractionData, InteractionType},
    },
    channel::message::{
        component::{ActionRow, Button, ButtonStyle},
        Component, MessageFlags,
    },
    gateway::payload::incoming::MessageCreate,
    http::{
        attachment::Attachment,
        interaction::{InteractionResponse, InteractionResponseType},
    },
    id::{
        marker::{ApplicationMarker, ChannelMarker, MessageMarker},
        Id,
    },
};
use twilight_util::builder::command::CommandBuilder;

/// Discord caps bot uploads at 25MB for most servers.
const MAX_UPLOAD_BYTES: u64 = 25_000_000;

/// Prefix of the custom id carried by every quality button.
const QUALITY_PREFIX: &str = "q:";

pub struct DiscordBot {
    state: Arc<BotState>,
    cache: InMemoryCache,
    shard: Shard,
}

/// Everything the spawned per-event handlers need.
struct BotState {
    http: HttpClient,
    media: MediaService,
    sessions: SessionStore,
    stats: Option<Arc<SqliteStats>>,
    application_id: Id<ApplicationMarker>,
}

impl DiscordBot {
    pub async fn new(config: Config) -> Result<Self> {
        let token = config.token()?.to_string();

        let http = HttpClient::new(token.clone());
        let cache = InMemoryCache::new();

        let intents = Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGES | Intents::MESSAGE_CONTENT;
        let shard = Shard::new(ShardId::ONE, token, intents);

        let media = MediaService::new(Box::new(YtDlpEngine::new()), config.download_dir())
            .context("Failed to initialize media service")?;

        // Test the engine setup
        if let Err(e) = media.test_setup().await {
            warn!("Media engine test failed: {}", e);
        }

        // Stats are best-effort: run without them rather than refuse to start.
        let stats = match SqliteStats::connect(&config.stats_db()).await {
            Ok(stats) => Some(Arc::new(stats)),
            Err(e) => {
                warn!("Stats database unavailable, running without stats: {}", e);
                None
            }
        };

        // Get application ID
        let application_id = {
            let response = http.current_user_application().await?;
            response.model().await?.id
        };

        let bot = Self {
            state: Arc::new(BotState {
                http,
                media,
                sessions: SessionStore::new(),
                stats,
                application_id,
            }),
            cache,
            shard,
        };

        bot.register_commands().await?;

        Ok(bot)
    }

    async fn register_commands(&self) -> Result<()> {
        info!("Registering Discord slash commands...");

        let help_command = CommandBuilder::new(
            "help".to_string(),
            "How to fetch a video from a post URL".to_string(),
            CommandType::ChatInput,
        )
        .build();

        self.state
            .http
            .interaction(self.state.application_id)
            .create_global_command()
            .chat_input(&help_command.name, &help_command.description)
            .await?;

        info!("Successfully registered /help slash command");
        Ok(())
    }

    pub async fn run(mut self) -> Result<()> {
        info!("Discord bot starting...");

        loop {
            let event = match self
                .shard
                .next_event(twilight_gateway::EventTypeFlags::all())
                .await
            {
                Some(Ok(event)) => event,
                Some(Err(source)) => {
                    error!(?source, "Error receiving event");
                    continue;
                }
                None => {
                    info!("Shard stream ended");
                    return Ok(());
                }
            };

            self.cache.update(&event);

            // Each request runs as its own task; a slow download must not
            // block other users' messages.
            match event {
                Event::MessageCreate(msg) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = state.handle_message(&msg).await {
                            error!("Failed to handle message: {:#}", e);
                        }
                    });
                }
                Event::InteractionCreate(interaction) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = state.handle_interaction(&interaction).await {
                            error!("Failed to handle interaction: {:#}", e);
                        }
                    });
                }
                Event::Ready(_) => {
                    info!("Discord bot is ready!");
                }
                _ => {}
            }
        }
    }
}

impl BotState {
    async fn handle_message(&self, msg: &MessageCreate) -> Result<()> {
        // Skip bot messages
        if msg.author.bot {
            return Ok(());
        }

        let Some(raw_url) = utils::extract_url(&msg.content) else {
            // Only DMs get the rejection; guild chatter without a post link
            // is none of our business.
            if msg.guild_id.is_none() && !msg.content.trim().is_empty() {
                self.http
                    .create_message(msg.channel_id)
                    .content(user_message(&AppError::InvalidUrl))
                    .await?;
            }
            return Ok(());
        };

        let status = self
            .http
            .create_message(msg.channel_id)
            .content("Checking the post...")
            .await?
            .model()
            .await?;

        let result = match self.media.resolve(&raw_url).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Extraction failed for {}: {}", raw_url, e);
                self.edit_status(msg.channel_id, status.id, user_message(&e))
                    .await?;
                return Ok(());
            }
        };

        if result.variants.is_empty() {
            let reply = match result.media_type {
                MediaType::Gif => "GIF posts aren't supported yet.",
                MediaType::Photo => "This post only contains photos.",
                _ => "This post does not contain a video.",
            };
            self.edit_status(msg.channel_id, status.id, reply).await?;
            return Ok(());
        }

        info!(
            "Offering {} qualities for {}",
            result.variants.len(),
            result.content_id
        );

        let caption = build_caption(&result);
        let components = quality_buttons(&result);
        self.http
            .update_message(msg.channel_id, status.id)
            .content(Some(&caption))
            .components(Some(&components))
            .await?;

        self.sessions.put(
            msg.channel_id.get(),
            &result.content_id,
            normalize_post_url(&raw_url),
        );

        Ok(())
    }

    async fn handle_interaction(&self, interaction: &Interaction) -> Result<()> {
        match interaction.kind {
            InteractionType::MessageComponent => {
                if let Some(InteractionData::MessageComponent(data)) = &interaction.data {
                    if let Some(payload) = data.custom_id.strip_prefix(QUALITY_PREFIX) {
                        self.handle_quality_choice(interaction, payload).await?;
                    }
                }
            }
            InteractionType::ApplicationCommand => {
                if let Some(InteractionData::ApplicationCommand(data)) = &interaction.data {
                    if data.name == "help" {
                        self.respond_to_interaction(
                            interaction,
                            "Send me a Twitter/X post URL (https://x.com/... or \
                             https://twitter.com/...) and I will fetch the available \
                             video qualities.",
                        )
                        .await?;
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// A quality button was pressed. The custom id carries
    /// `<content_id>:<format_id>:<label>`; the source URL comes from the
    /// session store.
    async fn handle_quality_choice(&self, interaction: &Interaction, payload: &str) -> Result<()> {
        let mut parts = payload.splitn(3, ':');
        let (Some(content_id), Some(format_id), Some(label)) =
            (parts.next(), parts.next(), parts.next())
        else {
            self.respond_to_interaction(interaction, "Invalid selection.")
                .await?;
            return Ok(());
        };

        let Some(channel_id) = interaction.channel.as_ref().map(|c| c.id) else {
            error!("No channel information in interaction");
            self.respond_to_interaction(interaction, "Cannot determine the channel.")
                .await?;
            return Ok(());
        };

        let Some(url) = self.sessions.get(channel_id.get(), content_id) else {
            self.respond_to_interaction(interaction, user_message(&AppError::SessionExpired))
                .await?;
            return Ok(());
        };

        self.respond_to_interaction(interaction, &format!("Downloading {label}..."))
            .await?;

        let path = match self.media.obtain(&url, content_id, label, format_id).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Download failed for {} {}: {}", content_id, label, e);
                let _ = self.followup_message(interaction, user_message(&e)).await;
                return Ok(());
            }
        };

        if let Err(e) = self.send_video(channel_id, &path, label).await {
            error!("Failed to send video to channel: {}", e);
            let _ = self
                .followup_message(interaction, "Failed to send the video file.")
                .await;
            return Ok(());
        }

        self.record_stat(interaction, &url, content_id, label);

        Ok(())
    }

    /// Best-effort usage stat; never delays or fails the user-facing flow.
    fn record_stat(&self, interaction: &Interaction, url: &str, content_id: &str, label: &str) {
        let Some(stats) = self.stats.clone() else {
            return;
        };
        let user_id = interaction
            .author_id()
            .map(|id| id.to_string())
            .unwrap_or_default();
        let (url, content_id, label) = (url.to_string(), content_id.to_string(), label.to_string());
        tokio::spawn(async move {
            if let Err(e) = stats.record(&user_id, &url, &content_id, &label).await {
                warn!("Failed to record stat: {}", e);
            }
        });
    }

    async fn send_video(
        &self,
        channel_id: Id<ChannelMarker>,
        path: &std::path::Path,
        label: &str,
    ) -> Result<()> {
        let file_size = tokio::fs::metadata(path).await?.len();
        if file_size > MAX_UPLOAD_BYTES {
            self.http
                .create_message(channel_id)
                .content(&format!(
                    "File too large ({}). Discord limit is {}.",
                    utils::human_readable_filesize(file_size),
                    utils::human_readable_filesize(MAX_UPLOAD_BYTES)
                ))
                .await?;
            return Ok(());
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video.mp4")
            .to_string();
        let attachment = Attachment::from_bytes(
            file_name,
            tokio::fs::read(path).await?,
            SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs(),
        );

        self.http
            .create_message(channel_id)
            .content(&format!("Quality: {label}"))
            .attachments(&[attachment])
            .await?;

        Ok(())
    }

    async fn edit_status(
        &self,
        channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
        content: &str,
    ) -> Result<()> {
        self.http
            .update_message(channel_id, message_id)
            .content(Some(content))
            .await?;
        Ok(())
    }

    async fn respond_to_interaction(&self, interaction: &Interaction, content: &str) -> Result<()> {
        let response = InteractionResponse {
            kind: InteractionResponseType::ChannelMessageWithSource,
            data: Some(twilight_model::http::interaction::InteractionResponseData {
                allowed_mentions: None,
                attachments: None,
                choices: None,
                components: None,
                content: Some(content.to_string()),
                custom_id: None,
                embeds: None,
                flags: Some(MessageFlags::EPHEMERAL),
                poll: None,
                title: None,
                tts: None,
            }),
        };

        self.http
            .interaction(self.application_id)
            .create_response(interaction.id, &interaction.token, &response)
            .await?;

        Ok(())
    }

    async fn followup_message(&self, interaction: &Interaction, content: &str) -> Result<()> {
        self.http
            .interaction(self.application_id)
            .create_followup(&interaction.token)
            .content(content)
            .await?;
        Ok(())
    }
}

/// What the user reads for each failure kind.
fn user_message(err: &AppError) -> &'static str {
    match err {
        AppError::InvalidUrl => "Invalid or unsupported link.",
        AppError::Extraction(_) => "An error occurred while fetching video info.",
        AppError::SessionExpired => "Session expired. Send the URL again.",
        AppError::Download(_) => "An error occurred while downloading.",
        AppError::Stats(_) | AppError::Io(_) => "Something went wrong. Try again later.",
    }
}

fn build_caption(result: &ExtractResult) -> String {
    let mut lines = Vec::new();
    if let Some(uploader) = &result.uploader {
        lines.push(format!("Author: {uploader}"));
    }
    if !result.title.is_empty() {
        lines.push(format!("Title: {}", result.title));
    }
    if let Some(date) = &result.upload_date {
        lines.push(format!("Date: {date}"));
    }
    lines.push("Choose video quality:".to_string());
    lines.join("\n")
}

/// One button per variant, three per row (Discord allows five rows).
fn quality_buttons(result: &ExtractResult) -> Vec<Component> {
    let buttons: Vec<Component> = result
        .variants
        .iter()
        .map(|v| {
            let mut label = v.quality_label.clone();
            if let Some(size) = v.filesize {
                label.push_str(&format!(" ({})", utils::human_readable_filesize(size)));
            }
            Component::Button(Button {
                id: None,
                custom_id: Some(format!(
                    "{QUALITY_PREFIX}{}:{}:{}",
                    result.content_id, v.format_id, v.quality_label
                )),
                disabled: false,
                emoji: None,
                label: Some(label),
                style: ButtonStyle::Secondary,
                url: None,
                sku_id: None,
            })
        })
        .collect();

    buttons
        .chunks(3)
        .take(5)
        .map(|row| {
            Component::ActionRow(ActionRow {
                id: None,
                components: row.to_vec(),
            })
        })
        .collect()
}

pub async fn run(config: Config) -> Result<()> {
    let bot = DiscordBot::new(config).await?;
    bot.run().await
}
