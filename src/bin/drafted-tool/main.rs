use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use spdlog::warn;

use drafted::config::{open_config, Config};
use drafted::logger::configure_logger;
use drafted::store::ContentRepository;
use drafted::workflow::ContentWorkflow;

use crate::draft::new_cmd;
use crate::generate::generate_cmd;
use crate::review::{approve_cmd, list_cmd, reject_cmd, unpublish_cmd};

mod draft;
mod generate;
mod review;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Config path
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a draft for a topic
    Generate(GenerateArgs),
    /// Create a blank draft
    New(NewArgs),
    /// Publish a draft
    Approve(FileArgs),
    /// Delete a draft
    Reject(FileArgs),
    /// Move a published post back to drafts
    Unpublish(SlugArgs),
    /// List drafts or published posts
    List(ListArgs),
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Topic of the new post
    topic: String,
}

#[derive(Parser, Debug)]
struct NewArgs {
    /// Name of the author. If empty, OS user real name is being used
    #[arg(short, long)]
    name: Option<String>,

    /// Title of the post
    #[arg(short, long)]
    title: String,

    /// Writes the draft to the stdout instead of the drafts directory
    #[arg(long)]
    stdout: bool,
}

#[derive(Parser, Debug)]
struct FileArgs {
    /// Draft file name, relative to the drafts directory
    file: String,
}

#[derive(Parser, Debug)]
struct SlugArgs {
    /// Slug of the published post
    slug: String,
}

#[derive(Parser, Debug)]
struct ListArgs {
    #[arg(default_value_t = ListTarget::Drafts)]
    target: ListTarget,
}

#[derive(Clone, Debug, ValueEnum)]
enum ListTarget {
    Drafts,
    Published,
}

impl Display for ListTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ListTarget::Drafts => write!(f, "drafts"),
            ListTarget::Published => write!(f, "published"),
        }
    }
}

fn load_config(config_path: Option<String>) -> Result<Config> {
    let config = open_config(config_path.map(PathBuf::from)).map_err(|e| anyhow!(e))?;
    if let Err(err) = configure_logger(&config) {
        warn!("Error creating logger sinks. Using console instead. Desc={}", err);
    }
    Ok(config)
}

fn workflow(config: &Config) -> ContentWorkflow {
    ContentWorkflow::new(ContentRepository::from_dirs(
        config.paths.drafts_dir.clone(),
        config.paths.published_dir.clone(),
    ))
}

#[ntex::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::New(ref new_args) = args.command {
        if new_args.stdout {
            return new_cmd(new_args, None);
        }
    }

    let config = load_config(args.config_path)?;
    let workflow = workflow(&config);

    match args.command {
        Command::Generate(args) => generate_cmd(&args, &config, &workflow).await,
        Command::New(args) => new_cmd(&args, Some(&workflow)),
        Command::Approve(args) => approve_cmd(&args, &workflow),
        Command::Reject(args) => reject_cmd(&args, &workflow),
        Command::Unpublish(args) => unpublish_cmd(&args, &workflow),
        Command::List(args) => list_cmd(&args, &workflow),
    }
}
