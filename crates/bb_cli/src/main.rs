//! Basketball Blitz terminal driver
//!
//! Plays a hot-seat match in one terminal (every player types at the same
//! prompt) and inspects the match saves a bot deployment leaves behind.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bb_core::config::{from_env_var, MATCH_CONFIG_PATH_ENV};
use bb_core::state::Phase;
use bb_core::{
    execute_command_json, Audience, ChoiceSet, Coordinator, FileMatchStore, MatchConfig, MatchStore,
    Notice, PlayerId, Presenter, Selection, VenueId,
};

#[derive(Parser)]
#[command(name = "bb")]
#[command(about = "Turn-based basketball over a shared terminal", long_about = None)]
struct Cli {
    /// Directory holding match saves
    #[arg(long, global = true, default_value = "saves")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a full match; players answer in turn at this terminal
    Play {
        /// Six player names: team 1 pg, sg, ce then team 2 pg, sg, ce
        #[arg(num_args = 6, required = true)]
        players: Vec<String>,

        /// Venue number used for the save file
        #[arg(long, default_value = "1")]
        venue: u64,

        /// Seed for toss fallbacks
        #[arg(long)]
        seed: Option<u64>,

        /// Short match (12 possessions)
        #[arg(long, default_value = "false")]
        quick: bool,
    },

    /// Print the live score of a stored match
    Show { venue: u64 },

    /// List venues with a match still in play
    List,

    /// Delete a stored match
    Delete { venue: u64 },

    /// Execute one JSON command against the store and print the response
    Json {
        /// Request object, e.g. '{"cmd":"live_score","venue":1}'
        request: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let store = FileMatchStore::new(&cli.store);

    match cli.command {
        Commands::Play { players, venue, seed, quick } => {
            let config = if quick {
                MatchConfig::quick()
            } else {
                from_env_var(MATCH_CONFIG_PATH_ENV).context("failed to load match config")?
            };
            let coordinator = match seed {
                Some(seed) => Coordinator::new(store, config, seed),
                None => Coordinator::with_entropy(store, config),
            };
            play(&coordinator, VenueId(venue), &players)?;
        }

        Commands::Show { venue } => {
            let Some(state) = store.load(VenueId(venue)).context("failed to read match save")? else {
                bail!("no match stored for venue {venue}");
            };
            for line in state.live_score().summary_lines() {
                println!("{line}");
            }
        }

        Commands::List => {
            let venues = store.list_active().context("failed to scan match saves")?;
            if venues.is_empty() {
                println!("No matches in play.");
            }
            for venue in venues {
                println!("{venue}");
            }
        }

        Commands::Delete { venue } => {
            store.delete(VenueId(venue)).context("failed to delete match save")?;
            println!("Deleted venue {venue}.");
        }

        Commands::Json { request } => {
            let config = from_env_var(MATCH_CONFIG_PATH_ENV).context("failed to load match config")?;
            let coordinator = Coordinator::with_entropy(store, config);
            println!("{}", execute_command_json(&coordinator, &request));
        }
    }

    Ok(())
}

fn play<S: MatchStore>(c: &Coordinator<S>, venue: VenueId, players: &[String]) -> Result<()> {
    let presenter = Terminal { names: players.to_vec() };
    let host = PlayerId(1);

    c.create_lobby(venue, host, &players[0], &presenter).context("failed to open the lobby")?;
    for (id, name) in (2..).zip(&players[1..]) {
        c.join(venue, PlayerId(id), name, &presenter).with_context(|| format!("{name} could not join"))?;
    }
    c.start(venue, host, &presenter).context("failed to start")?;
    c.run_toss(venue, host, &presenter).context("coin toss failed")?;

    let mut possessions = 0u32;
    while c.live_score(venue)?.phase == Phase::Active {
        c.advance_possession(venue, &presenter)?;
        possessions += 1;
    }
    info!(%venue, possessions, "match complete");

    for line in c.live_score(venue)?.summary_lines() {
        println!("{line}");
    }
    Ok(())
}

/// Hot-seat presenter. Prompts block on stdin; an empty line or end of
/// input counts as letting the prompt time out.
struct Terminal {
    names: Vec<String>,
}

impl Terminal {
    fn name(&self, user: PlayerId) -> String {
        usize::try_from(user.0)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.names.get(i))
            .cloned()
            .unwrap_or_else(|| format!("player {user}"))
    }
}

impl Presenter for Terminal {
    fn present_choices(&self, _venue: VenueId, user: PlayerId, choices: &ChoiceSet) -> Selection {
        println!("\n[{}] {} ({}s)", self.name(user), choices.text, choices.timeout_secs);
        for (i, option) in choices.options.iter().enumerate() {
            println!("  {}. {}", i + 1, option.label);
        }
        print!("> ");
        // a prompt that fails to flush still reads the answer
        let _ = io::stdout().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => Selection::Timeout,
            Ok(_) if line.trim().is_empty() => Selection::Timeout,
            Ok(_) => Selection::Chosen(line.trim().to_string()),
        }
    }

    fn notify(&self, _venue: VenueId, audience: Audience, notice: &Notice) {
        match audience {
            Audience::Venue => println!("{notice}"),
            Audience::Team(team) => println!("(Team {team}) {notice}"),
            Audience::Player(player) => println!("({}) {notice}", self.name(player)),
        }
    }
}
