/* This file is part of the ReelFeed client libraries
*
*  Copyright (C) 2025 mini_bomba
*
*  This program is free software: you can redistribute it and/or modify
*  it under the terms of the GNU Affero General Public License as published by
*  the Free Software Foundation, either version 3 of the License, or
*  (at your option) any later version.
*
*  This program is distributed in the hope that it will be useful,
*  but WITHOUT ANY WARRANTY; without even the implied warranty of
*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
*  GNU Affero General Public License for more details.
*
*  You should have received a copy of the GNU Affero General Public License
*  along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use std::{path::PathBuf, process::ExitCode, sync::{Arc, LazyLock}};

use clap::{Parser, Subcommand, ValueEnum};
use cloneable_errors::{ErrorContext, IntoErrorIterator, ResContext};
use env_logger::Env;
use log::info;
use reelfeed_client::{
    api::{FeedbackKind, FeedbackRequest},
    ApiClient, Cache, ClientConfig, FeedService, StaticToken, UploadRequest,
};
use serde::Serialize;

static VERSION_STRING: LazyLock<&'static str> = LazyLock::new(create_version_string);
static LONG_VERSION:   LazyLock<&'static str> = LazyLock::new(create_long_version);

fn create_version_string() -> &'static str {
    match (built_info::GIT_COMMIT_HASH_SHORT, built_info::GIT_DIRTY) {
        (Some(hash), Some(true)) => format!("{}+g{hash}-dirty", built_info::PKG_VERSION).leak(),
        (Some(hash), _) => format!("{}+g{hash}", built_info::PKG_VERSION).leak(),
        _ => built_info::PKG_VERSION,
    }
}

fn create_long_version() -> &'static str {
    format!(
        "{} ({} channel)\nbuilt at {}\ncommit time {}",
        *VERSION_STRING,
        built_info::BUILD_CHANNEL.unwrap_or("dev"),
        built_info::BUILT_TIME_UTC,
        built_info::GIT_COMMIT_TIMESTAMP.unwrap_or("unknown"),
    ).leak()
}

#[derive(Parser)]
#[command(name = "reelfeed", about = "Browse and manage a ReelFeed backend from the terminal")]
#[command(version = *VERSION_STRING, long_version = *LONG_VERSION)]
struct Cli {
    /// Config file, created with default values if missing
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `base_url` from the config file
    #[arg(long, env = "REELFEED_BASE_URL")]
    base_url: Option<String>,

    /// Overrides `token` from the config file
    #[arg(long, env = "REELFEED_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show a feed page with ads placed between videos
    Feed {
        #[arg(default_value_t = 1)]
        page: u32,
        #[arg(long)]
        force: bool,
    },
    Video {
        id: String,
        #[arg(long)]
        force: bool,
    },
    Ads {
        #[arg(long)]
        force: bool,
    },
    UserVideos {
        user_id: String,
        #[arg(long)]
        force: bool,
    },
    Like { id: String },
    Unlike { id: String },
    Share { id: String },
    Comment { id: String, text: String },
    DeleteComment { id: String, comment_id: String },
    Follow { user_id: String },
    Unfollow { user_id: String },
    /// Report an ad impression, or a click with `--click`
    TrackAd {
        id: String,
        #[arg(long)]
        click: bool,
    },
    Feedback {
        #[arg(value_enum)]
        kind: FeedbackArg,
        message: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Upload a video file and wait until the backend has processed it
    Upload {
        path: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        category: String,
        /// Comma separated
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long)]
        link: Option<String>,
        /// Return as soon as the upload is accepted
        #[arg(long)]
        no_wait: bool,
    },
    DeleteVideo { id: String },
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand)]
enum CacheCommand {
    Clear,
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum FeedbackArg {
    Bug,
    Suggestion,
    Other,
}

impl From<FeedbackArg> for FeedbackKind {
    fn from(value: FeedbackArg) -> Self {
        match value {
            FeedbackArg::Bug => FeedbackKind::Bug,
            FeedbackArg::Suggestion => FeedbackKind::Suggestion,
            FeedbackArg::Other => FeedbackKind::Other,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut chain = err.error_chain();
            if let Some(top) = chain.next() {
                eprintln!("Error: {top}");
            }
            for cause in chain {
                eprintln!("    caused by: {cause}");
            }
            ExitCode::FAILURE
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ErrorContext> {
    let serialized = serde_json::to_string_pretty(value).context("Failed to serialize the result")?;
    println!("{serialized}");
    Ok(())
}

async fn run(cli: Cli) -> Result<(), ErrorContext> {
    let mut config = ClientConfig::load_or_create(&cli.config)?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if cli.token.is_some() {
        config.token = cli.token;
    }

    let tokens = Arc::new(StaticToken(config.token.clone()));
    let client = ApiClient::from_config(&config, tokens).context("Failed to set up the API client")?;
    let service = FeedService::new(client, Cache::from_config(&config.cache), config.feed)
        .with_user_id(config.user_id.clone());
    let client = service.source();

    match cli.command {
        Command::Feed { page, force } => print_json(&service.feed(page, force).await.context("Failed to load the feed")?),
        Command::Video { id, force } => print_json(&service.video(&id, force).await.context("Failed to load the video")?),
        Command::Ads { force } => print_json(&service.ads(force).await.context("Failed to load ads")?),
        Command::UserVideos { user_id, force } => print_json(&service.user_videos(&user_id, force).await.context("Failed to load the user's videos")?),
        Command::Like { id } => print_json(&service.like_video(&id).await.context("Failed to like the video")?),
        Command::Unlike { id } => print_json(&service.unlike_video(&id).await.context("Failed to unlike the video")?),
        Command::Share { id } => print_json(&service.share_video(&id).await.context("Failed to share the video")?),
        Command::Comment { id, text } => print_json(&service.post_comment(&id, &text).await.context("Failed to post the comment")?),
        Command::DeleteComment { id, comment_id } => {
            service.delete_comment(&id, &comment_id).await.context("Failed to delete the comment")?;
            info!("Comment {comment_id} deleted");
            Ok(())
        },
        Command::Follow { user_id } => print_json(&client.follow_user(&user_id).await.context("Failed to follow the user")?),
        Command::Unfollow { user_id } => print_json(&client.unfollow_user(&user_id).await.context("Failed to unfollow the user")?),
        Command::TrackAd { id, click } => {
            if click {
                client.track_ad_click(&id).await;
            } else {
                client.track_ad_impression(&id).await;
            }
            Ok(())
        },
        Command::Feedback { kind, message, email } => {
            let feedback = FeedbackRequest { kind: kind.into(), message, contact_email: email };
            client.submit_feedback(&feedback).await.context("Failed to submit feedback")?;
            info!("Feedback sent, thank you!");
            Ok(())
        },
        Command::Upload { path, title, description, category, tags, link, no_wait } => {
            let mut request = UploadRequest::from_path(&path).await.context("Failed to prepare the upload")?;
            request.title = title;
            request.description = description;
            request.category = category;
            request.tags = tags;
            request.link = link;
            let status = if no_wait {
                let status = client.upload_video(request).await.context("Failed to upload the video")?;
                service.after_upload(&status.video_id).await;
                status
            } else {
                service.upload_and_wait(request, &config.upload).await.context("Failed to upload the video")?
            };
            print_json(&status)
        },
        Command::DeleteVideo { id } => {
            service.delete_video(&id).await.context("Failed to delete the video")?;
            info!("Video {id} deleted");
            Ok(())
        },
        Command::Cache(CacheCommand::Clear) => {
            let removed = service.cache().clear().await.context("Failed to clear the cache")?;
            info!("Removed {removed} cache entries");
            Ok(())
        },
        Command::Cache(CacheCommand::Stats) => {
            let stats = service.cache().stats().await.context("Failed to read cache stats")?;
            println!("{} entries ({} fresh, {} stale)", stats.total, stats.fresh, stats.stale);
            Ok(())
        },
    }
}

mod built_info {
    // Contents generated by buildscript, using built
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
