use crate::Config;
use gerwatch_core::backoff;
use serde_json::Value;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines},
    net::TcpStream,
    process::{Child, ChildStdout, Command},
    sync::mpsc::UnboundedSender,
};
use tracing::{debug, error, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SPAWN_GRACE: Duration = Duration::from_secs(1);

/// Dials one subscription to the event stream. The production source
/// spawns ssh; tests substitute scripted sources.
trait EventSource {
    type Feed: EventFeed;

    async fn connect(&mut self) -> io::Result<Self::Feed>;
}

/// A live subscription: blocks until the next decoded event record.
trait EventFeed {
    async fn next_event(&mut self) -> io::Result<Value>;
}

struct SshSource {
    config: Config,
}

impl EventSource for SshSource {
    type Feed = Connection;

    async fn connect(&mut self) -> io::Result<Connection> {
        Connection::open(&self.config).await
    }
}

/// One live `gerrit stream-events` subscription: an ssh child whose stdout
/// yields one JSON event record per line.
struct Connection {
    _child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl Connection {
    async fn open(config: &Config) -> io::Result<Self> {
        // Preflight the TCP route first: a refused or unreachable server
        // must fail the connect attempt here, inside the backoff round,
        // not as an EOF after a spawn that always "succeeds".
        let preflight = TcpStream::connect((config.server.as_str(), config.port));
        match tokio::time::timeout(CONNECT_TIMEOUT, preflight).await {
            Ok(Ok(stream)) => drop(stream),
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to '{}:{}' timed out", config.server, config.port),
                ));
            }
        }

        let mut command = Command::new("ssh");
        command
            .arg("-p")
            .arg(config.port.to_string())
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("ServerAliveInterval=30");
        if let Some(keyfile) = &config.keyfile {
            command.arg("-i").arg(keyfile);
        }
        command
            .arg(destination(config))
            .arg("gerrit")
            .arg("stream-events")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let stdout = child.stdout.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "ssh stdout not captured")
        })?;

        // An ssh that dies during session setup (rejected key, unknown
        // command) counts as a failed attempt, not a stream error. The
        // stream is silent between events, so the only success signal is
        // the child surviving the grace window.
        match tokio::time::timeout(SPAWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    format!("ssh exited during connect: {status}"),
                ));
            }
            Ok(Err(err)) => return Err(err),
            Err(_) => {}
        }

        Ok(Self {
            _child: child,
            lines: BufReader::new(stdout).lines(),
        })
    }
}

impl EventFeed for Connection {
    /// Waits for the next event record. EOF and read errors both surface as
    /// `Err` so the caller tears the connection down; lines that fail to
    /// decode are logged and skipped without dropping the stream.
    async fn next_event(&mut self) -> io::Result<Value> {
        loop {
            let line = self.lines.next_line().await?.ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "event stream closed")
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(event) => return Ok(event),
                Err(err) => {
                    warn!(event = "event_decode_error", error = %err);
                }
            }
        }
    }
}

fn destination(config: &Config) -> String {
    if config.username.is_empty() {
        config.server.clone()
    } else {
        format!("{}@{}", config.username, config.server)
    }
}

pub async fn run(config: Config, tx: UnboundedSender<Value>) {
    let attempts = config.connect_attempts;
    let source = SshSource { config };
    supervise(source, attempts, tx).await;
}

/// Supervised watcher loop: keep one feed alive and push every decoded
/// event record onto the queue. A stream error drops the feed and restarts
/// the connect-with-backoff round from attempt zero. The task ends only
/// when a whole backoff round is exhausted without a successful connect;
/// the UI then keeps rendering whatever rows it already has.
async fn supervise<S: EventSource>(mut source: S, attempts: i32, tx: UnboundedSender<Value>) {
    let mut feed: Option<S::Feed> = None;
    loop {
        if feed.is_none() {
            match ensure_connected(&mut source, attempts).await {
                Ok(live) => feed = Some(live),
                Err(err) => {
                    error!(event = "watcher_stopped", error = %err);
                    return;
                }
            }
        }
        let Some(live) = feed.as_mut() else {
            continue;
        };
        match live.next_event().await {
            Ok(event) => {
                debug!(event = "event_enqueued");
                if tx.send(event).is_err() {
                    info!(event = "queue_closed");
                    return;
                }
            }
            Err(err) => {
                warn!(event = "stream_error", error = %err);
                feed = None;
            }
        }
    }
}

/// Walks a fresh backoff schedule: attempt, sleep on failure, repeat.
/// Exhausting the schedule is the one unrecoverable outcome.
async fn ensure_connected<S: EventSource>(source: &mut S, attempts: i32) -> io::Result<S::Feed> {
    for delay in backoff::connect_delays(attempts) {
        match source.connect().await {
            Ok(feed) => {
                info!(event = "stream_connected");
                return Ok(feed);
            }
            Err(err) => {
                warn!(
                    event = "connect_error",
                    error = %err,
                    retry_in_secs = delay.as_secs()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
    Err(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "connect attempts exhausted",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };
    use tokio::sync::mpsc::{self, error::TryRecvError};

    struct ScriptedFeed {
        events: VecDeque<io::Result<Value>>,
    }

    impl EventFeed for ScriptedFeed {
        async fn next_event(&mut self) -> io::Result<Value> {
            match self.events.pop_front() {
                Some(item) => item,
                None => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "event stream closed",
                )),
            }
        }
    }

    /// Hands out one scripted feed per connect; once the script runs dry,
    /// every further connect fails.
    struct ScriptedSource {
        connects: Arc<AtomicU32>,
        feeds: VecDeque<Vec<io::Result<Value>>>,
    }

    impl ScriptedSource {
        fn new(connects: Arc<AtomicU32>, feeds: Vec<Vec<io::Result<Value>>>) -> Self {
            Self {
                connects,
                feeds: feeds.into(),
            }
        }
    }

    impl EventSource for ScriptedSource {
        type Feed = ScriptedFeed;

        async fn connect(&mut self) -> io::Result<ScriptedFeed> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            match self.feeds.pop_front() {
                Some(events) => Ok(ScriptedFeed {
                    events: events.into(),
                }),
                None => Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "server down",
                )),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_connect_budget_ends_the_watcher_task() {
        let connects = Arc::new(AtomicU32::new(0));
        let source = ScriptedSource::new(connects.clone(), Vec::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(supervise(source, 5, tx));
        task.await.unwrap();

        // One attempt per schedule entry, then the task is gone for good.
        assert_eq!(connects.load(Ordering::SeqCst), 5);
        // The consumer side stays usable; it just reports a closed queue,
        // so the UI keeps ticking on the rows it already has.
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempt_budget_never_connects() {
        let connects = Arc::new(AtomicU32::new(0));
        let source = ScriptedSource::new(
            connects.clone(),
            vec![vec![Ok(json!({"type": "patchset-created"}))]],
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(supervise(source, 0, tx)).await.unwrap();

        assert_eq!(connects.load(Ordering::SeqCst), 0);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_error_reconnects_with_a_fresh_feed() {
        let connects = Arc::new(AtomicU32::new(0));
        let source = ScriptedSource::new(
            connects.clone(),
            vec![
                vec![Ok(json!({"type": "patchset-created"}))],
                vec![Ok(json!({"type": "comment-added"}))],
            ],
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(supervise(source, 3, tx)).await.unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first["type"], "patchset-created");
        let second = rx.try_recv().unwrap();
        assert_eq!(second["type"], "comment-added");
        assert!(rx.try_recv().is_err());

        // Two successful connects, then one full failed round of three.
        assert_eq!(connects.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn mid_stream_read_error_does_not_lose_prior_events() {
        let connects = Arc::new(AtomicU32::new(0));
        let source = ScriptedSource::new(
            connects.clone(),
            vec![vec![
                Ok(json!({"type": "patchset-created"})),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            ]],
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(supervise(source, 2, tx)).await.unwrap();

        assert_eq!(rx.try_recv().unwrap()["type"], "patchset-created");
        // The reset triggered one fresh round: 1 success + 2 failures.
        assert_eq!(connects.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn destination_omits_user_when_unknown() {
        let config = Config {
            server: "review.example.org".to_string(),
            port: 29418,
            username: String::new(),
            keyfile: None,
            connect_attempts: 5,
            log_file: "gerwatch.log".into(),
        };
        assert_eq!(destination(&config), "review.example.org");

        let with_user = Config {
            username: "jdoe".to_string(),
            ..config
        };
        assert_eq!(destination(&with_user), "jdoe@review.example.org");
    }
}
