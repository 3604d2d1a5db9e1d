//! Line-based console that drives a [`MusicBot`] without a chat gateway.
//!
//! Tracks are synthesized from the command line; the local node "plays" them
//! on a timer.

use serenity::model::id::{GuildId, UserId};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    audio::track::{Track, TrackInfo},
    bot::{loader::LoadResult, MusicBot},
};

const DEFAULT_LENGTH: Duration = Duration::from_secs(180);

const HELP: &str = "\
play <title> [length]      queue one track, e.g. `play Intro 3m20s`
stream <title>             queue a live stream
playlist <name>: a, b, c   queue several tracks at once
search <query>             queue the first search hit
stop                       clear the queue and the player
np                         show the current track
queue [page|json]          show waiting tracks
finish                     end the current track as if it played out
join | leave               open or destroy the guild link
guild <id> | user <id>     switch guild or requester
status                     node overview
quit";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command `{0}`, try `help`")]
    Unknown(String),
    #[error("Missing {0}")]
    MissingArgument(&'static str),
    #[error("Invalid id `{0}`")]
    InvalidId(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play { title: String, length: Duration },
    Stream { title: String },
    Playlist { name: String, titles: Vec<String> },
    Search { query: String },
    Stop,
    NowPlaying,
    Queue { page: usize },
    QueueJson,
    Finish,
    Join,
    Leave,
    Guild(GuildId),
    User(UserId),
    Status,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match name.to_lowercase().as_str() {
            "play" | "p" => {
                let (title, length) = split_length(rest);
                Command::Play {
                    title: required(title, "track title")?,
                    length,
                }
            }
            "stream" => Command::Stream {
                title: required(rest, "stream title")?,
            },
            "playlist" => {
                let (name, list) = rest
                    .split_once(':')
                    .ok_or(CommandError::MissingArgument("`name: track, track`"))?;
                let titles: Vec<String> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect();
                Command::Playlist {
                    name: required(name, "playlist name")?,
                    titles,
                }
            }
            "search" => Command::Search {
                query: rest.to_string(),
            },
            "stop" => Command::Stop,
            "np" | "nowplaying" => Command::NowPlaying,
            "queue" | "q" => match rest {
                "json" => Command::QueueJson,
                "" => Command::Queue { page: 1 },
                page => Command::Queue {
                    page: page.parse().unwrap_or(1),
                },
            },
            "finish" => Command::Finish,
            "join" => Command::Join,
            "leave" => Command::Leave,
            "guild" => Command::Guild(GuildId::new(parse_id(rest)?)),
            "user" => Command::User(UserId::new(parse_id(rest)?)),
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(command)
    }
}

fn required(value: &str, what: &'static str) -> Result<String, CommandError> {
    let value = value.trim();
    if value.is_empty() {
        Err(CommandError::MissingArgument(what))
    } else {
        Ok(value.to_string())
    }
}

/// Separa una duración legible al final del título, p. ej. `Song 4m10s`.
fn split_length(input: &str) -> (&str, Duration) {
    if let Some((title, last)) = input.rsplit_once(' ') {
        if let Ok(length) = humantime::parse_duration(last) {
            return (title.trim(), length);
        }
    }
    (input, DEFAULT_LENGTH)
}

fn parse_id(input: &str) -> Result<u64, CommandError> {
    match input.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(CommandError::InvalidId(input.to_string())),
    }
}

pub struct Console {
    bot: Arc<MusicBot>,
    guild_id: GuildId,
    user_id: UserId,
    loaded: u64,
}

impl Console {
    pub fn new(bot: Arc<MusicBot>) -> Self {
        let config = bot.config();
        let guild_id = GuildId::new(config.default_guild_id);
        let user_id = UserId::new(config.default_user_id);
        Self {
            bot,
            guild_id,
            user_id,
            loaded: 0,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    fn track(&mut self, info: TrackInfo) -> Track {
        self.loaded += 1;
        let encoded = format!("console:{}:{}", self.loaded, info.title);
        Track::new(encoded, info)
    }

    /// Runs one command. `None` means the console should exit.
    pub async fn execute(&mut self, command: Command) -> Option<String> {
        let guild = self.guild_id;
        let user = self.user_id;

        let reply = match command {
            Command::Play { title, length } => {
                let track = self.track(TrackInfo::new(title, length));
                self.bot.load(guild, user, LoadResult::Track(track)).resolve().await
            }
            Command::Stream { title } => {
                let track = self.track(TrackInfo::new(title, Duration::ZERO).stream());
                self.bot.load(guild, user, LoadResult::Track(track)).resolve().await
            }
            Command::Playlist { name, titles } => {
                let result = if titles.is_empty() {
                    LoadResult::Empty
                } else {
                    let tracks = titles
                        .into_iter()
                        .map(|title| self.track(TrackInfo::new(title, DEFAULT_LENGTH)))
                        .collect();
                    LoadResult::Playlist { name, tracks }
                };
                self.bot.load(guild, user, result).resolve().await
            }
            Command::Search { query } => {
                let hits = if query.is_empty() {
                    Vec::new()
                } else {
                    vec![self.track(
                        TrackInfo::new(query.clone(), DEFAULT_LENGTH)
                            .with_uri(format!("search:{}", query)),
                    )]
                };
                self.bot.load(guild, user, LoadResult::Search(hits)).resolve().await
            }
            Command::Stop => self.bot.stop(guild).resolve().await,
            Command::NowPlaying => self.bot.now_playing(guild),
            Command::Queue { page } => self.bot.queue(guild, page),
            Command::QueueJson => self
                .bot
                .queue_json(guild)
                .unwrap_or_else(|e| format!("Could not encode queue: {}", e)),
            Command::Finish => match self.bot.node().finish_current(guild) {
                Some(track) => format!("Finished: {}", track.title()),
                None => "Nothing playing currently!".to_string(),
            },
            Command::Join => self.bot.join(guild),
            Command::Leave => self.bot.leave(guild).await,
            Command::Guild(id) => {
                self.guild_id = id;
                format!("Now controlling guild {}", id)
            }
            Command::User(id) => {
                self.user_id = id;
                format!("Requests now come from user {}", id)
            }
            Command::Status => self.bot.status(),
            Command::Help => HELP.to_string(),
            Command::Quit => return None,
        };

        Some(reply)
    }

    /// Reads commands line by line until `quit`, end of input or `shutdown`.
    pub async fn run<R, W>(
        &mut self,
        input: R,
        mut output: W,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        info!("⌨️ Consola lista, guild {} (escribe `help`)", self.guild_id);

        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.next_line() => match line? {
                    Some(line) => line,
                    None => break,
                },
            };
            if line.trim().is_empty() {
                continue;
            }

            debug!("Comando de consola: {}", line);
            let reply = match Command::parse(&line) {
                Ok(command) => match self.execute(command).await {
                    Some(reply) => reply,
                    None => break,
                },
                Err(e) => e.to_string(),
            };

            output.write_all(reply.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use pretty_assertions::assert_eq;

    fn console() -> Console {
        let config = Config {
            playback_speed: 0.0,
            default_guild_id: 10,
            default_user_id: 20,
            ..Config::default()
        };
        let (bot, _events) = MusicBot::new(config);
        Console::new(Arc::new(bot))
    }

    #[test]
    fn test_parse_play_with_length() {
        assert_eq!(
            Command::parse("play Intro 3m20s").unwrap(),
            Command::Play {
                title: "Intro".into(),
                length: Duration::from_secs(200)
            }
        );
        assert_eq!(
            Command::parse("p Two Words").unwrap(),
            Command::Play {
                title: "Two Words".into(),
                length: DEFAULT_LENGTH
            }
        );
    }

    #[test]
    fn test_parse_playlist_and_errors() {
        assert_eq!(
            Command::parse("playlist Mix: a, b ,c").unwrap(),
            Command::Playlist {
                name: "Mix".into(),
                titles: vec!["a".into(), "b".into(), "c".into()]
            }
        );
        assert_eq!(
            Command::parse("play").unwrap_err(),
            CommandError::MissingArgument("track title")
        );
        assert_eq!(
            Command::parse("guild 0").unwrap_err(),
            CommandError::InvalidId("0".into())
        );
        assert_eq!(
            Command::parse("dance").unwrap_err(),
            CommandError::Unknown("dance".into())
        );
        assert_eq!(Command::parse("queue json").unwrap(), Command::QueueJson);
    }

    #[tokio::test]
    async fn test_execute_play_then_queue() {
        let mut console = console();

        let first = console
            .execute(Command::parse("play Intro").unwrap())
            .await
            .unwrap();
        assert_eq!(first, "Added to queue: Intro\nRequested by: <@20>");

        console
            .execute(Command::parse("search lo-fi beats").unwrap())
            .await;
        let queue = console.execute(Command::Queue { page: 1 }).await.unwrap();
        assert!(queue.starts_with("Now: Intro [3:00]\n1. lo-fi beats [3:00] - <@20>\n"));

        let finished = console.execute(Command::Finish).await.unwrap();
        assert_eq!(finished, "Finished: Intro");
    }

    #[tokio::test]
    async fn test_run_reads_until_quit() {
        let mut console = console();
        let input: &[u8] = b"guild 5\nplaylist Empty:\nbogus\nquit\nplay never\n";
        let mut output = Vec::new();

        console
            .run(input, &mut output, CancellationToken::new())
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(
            output,
            "Now controlling guild 5\nNo matches found for your input!\nUnknown command `bogus`, try `help`\n"
        );
        assert_eq!(console.guild_id(), GuildId::new(5));
    }
}
