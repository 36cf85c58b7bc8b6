//! Shared test utilities for facade integration tests.
//!
//! Import via `mod common;` in integration test files:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```
//!
//! [`FakeStore`] is a small in-process RESP2 server covering the commands
//! the facade issues. It runs on its own thread and Tokio runtime, so the
//! blocking facade can be driven from plain `#[test]` functions.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::TcpListener as StdTcpListener;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, oneshot};

use ferrite_facade::resp::decode_value;
use ferrite_facade::{
    ActionPolicy, CommandFacade, ConnectionSupervisor, EndpointConfig, Pool, Value,
};

// ============================================================================
// Facade helpers
// ============================================================================

/// Endpoint settings with short timeouts for tests.
#[allow(dead_code)]
pub fn endpoint(port: u16) -> EndpointConfig {
    let mut config = EndpointConfig::from_addr("127.0.0.1", port);
    config.connect_timeout = Some(Duration::from_millis(500));
    config.socket_timeout = Some(Duration::from_secs(2));
    config
}

/// A port with nothing listening on it.
#[allow(dead_code)]
pub fn closed_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("should bind to random port");
    let port = listener.local_addr().expect("should have local addr").port();
    drop(listener);
    port
}

/// A facade over explicit master/replica ports.
#[allow(dead_code)]
pub fn facade(master: Option<u16>, replica: Option<u16>, policy: ActionPolicy) -> CommandFacade {
    let master = master.map(|port| Arc::new(Pool::new("master", endpoint(port))));
    let replica = replica.map(|port| Arc::new(Pool::new("replica", endpoint(port))));
    CommandFacade::new(ConnectionSupervisor::new(master, replica), policy)
        .expect("facade should build")
}

/// A facade allowing every action, with `store` as its only endpoint.
#[allow(dead_code)]
pub fn facade_for(store: &FakeStore) -> CommandFacade {
    facade(Some(store.port()), None, ActionPolicy::all())
}

/// Poll `cond` every 10ms for up to ~2 seconds.
#[allow(dead_code)]
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

// ============================================================================
// Fake store
// ============================================================================

/// An in-process RESP2 server with an in-memory keyspace.
pub struct FakeStore {
    port: u16,
    shared: Arc<Shared>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

#[allow(dead_code)]
impl FakeStore {
    /// Start a store on a random port.
    pub fn start() -> Self {
        Self::start_with_password(None)
    }

    /// Start a store that requires `AUTH password` when set.
    pub fn start_with_password(password: Option<&str>) -> Self {
        let shared = Arc::new(Shared::new(password.map(str::to_owned)));
        let (port_tx, port_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let server_shared = shared.clone();

        let thread = std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("fake store runtime");
            rt.block_on(async move {
                let listener = TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("should bind to random port");
                port_tx
                    .send(listener.local_addr().expect("local addr").port())
                    .expect("port channel");
                tokio::select! {
                    _ = accept_loop(listener, server_shared) => {}
                    _ = shutdown_rx => {}
                }
            });
        });

        let port = port_rx.recv().expect("fake store should report its port");
        Self {
            port,
            shared,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Number of times `name` (any case) was received, including inside MULTI.
    pub fn command_count(&self, name: &str) -> usize {
        let name = name.to_ascii_uppercase();
        self.shared
            .log
            .lock()
            .iter()
            .filter(|c| **c == name)
            .count()
    }

    /// Every command received, excluding the AUTH/SELECT handshake.
    pub fn data_commands(&self) -> usize {
        self.shared
            .log
            .lock()
            .iter()
            .filter(|c| c.as_str() != "AUTH" && c.as_str() != "SELECT")
            .count()
    }

    /// Number of accepted TCP connections.
    pub fn connections(&self) -> usize {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    /// Connections currently in subscribed mode.
    pub fn subscribers(&self) -> usize {
        self.shared.subscribers.lock().len()
    }

    /// The list at `key`, bypassing the network.
    pub fn list(&self, key: &str) -> Vec<String> {
        let mut state = self.shared.state.lock();
        match state.entry(key.as_bytes()) {
            Some(Data::List(items)) => items.iter().map(|v| text(v)).collect(),
            _ => Vec::new(),
        }
    }

    /// The string at `key`, bypassing the network.
    pub fn string(&self, key: &str) -> Option<String> {
        let mut state = self.shared.state.lock();
        match state.entry(key.as_bytes()) {
            Some(Data::Str(v)) => Some(text(v)),
            _ => None,
        }
    }

    /// Overwrite the string at `key` as a concurrent client would.
    pub fn set_string(&self, key: &str, value: &str) {
        let mut state = self.shared.state.lock();
        state.insert(key.as_bytes(), Data::Str(value.as_bytes().to_vec()), None);
    }

    /// Replace the list at `key`.
    pub fn set_list(&self, key: &str, items: &[&str]) {
        let mut state = self.shared.state.lock();
        let list = items.iter().map(|s| s.as_bytes().to_vec()).collect();
        state.insert(key.as_bytes(), Data::List(list), None);
    }
}

impl Drop for FakeStore {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct Shared {
    state: Mutex<State>,
    password: Option<String>,
    log: Mutex<Vec<String>>,
    accepted: AtomicUsize,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, Vec<String>>>,
    messages: broadcast::Sender<(String, String)>,
}

impl Shared {
    fn new(password: Option<String>) -> Self {
        let (messages, _) = broadcast::channel(1024);
        Self {
            state: Mutex::new(State::default()),
            password,
            log: Mutex::new(Vec::new()),
            accepted: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(HashMap::new()),
            messages,
        }
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        shared.accepted.fetch_add(1, Ordering::SeqCst);
        let id = shared.next_id.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(serve(stream, shared.clone(), id));
    }
}

// ============================================================================
// Keyspace
// ============================================================================

enum Data {
    Str(Vec<u8>),
    List(VecDeque<Vec<u8>>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    Set(HashSet<Vec<u8>>),
    ZSet(Vec<(Vec<u8>, f64)>),
}

struct Entry {
    data: Data,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct State {
    entries: HashMap<Vec<u8>, Entry>,
    versions: HashMap<Vec<u8>, u64>,
}

impl State {
    fn purge(&mut self, key: &[u8]) {
        let expired = matches!(
            self.entries.get(key),
            Some(Entry { expires_at: Some(at), .. }) if *at <= Instant::now()
        );
        if expired {
            self.entries.remove(key);
            self.touch(key);
        }
    }

    fn entry(&mut self, key: &[u8]) -> Option<&mut Data> {
        self.purge(key);
        self.entries.get_mut(key).map(|e| &mut e.data)
    }

    fn exists(&mut self, key: &[u8]) -> bool {
        self.purge(key);
        self.entries.contains_key(key)
    }

    fn insert(&mut self, key: &[u8], data: Data, expires_at: Option<Instant>) {
        self.entries
            .insert(key.to_vec(), Entry { data, expires_at });
        self.touch(key);
    }

    fn remove(&mut self, key: &[u8]) -> bool {
        self.purge(key);
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.touch(key);
        }
        removed
    }

    fn touch(&mut self, key: &[u8]) {
        *self.versions.entry(key.to_vec()).or_insert(0) += 1;
    }

    fn version(&self, key: &[u8]) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    /// Drop `key` when its collection became empty.
    fn drop_if_empty(&mut self, key: &[u8]) {
        let empty = match self.entries.get(key).map(|e| &e.data) {
            Some(Data::List(l)) => l.is_empty(),
            Some(Data::Hash(h)) => h.is_empty(),
            Some(Data::Set(s)) => s.is_empty(),
            Some(Data::ZSet(z)) => z.is_empty(),
            _ => false,
        };
        if empty {
            self.entries.remove(key);
        }
    }

    fn expires_in(&mut self, key: &[u8]) -> Option<Option<Duration>> {
        self.purge(key);
        self.entries.get(key).map(|e| {
            e.expires_at
                .map(|at| at.saturating_duration_since(Instant::now()))
        })
    }
}

// ============================================================================
// Replies
// ============================================================================

enum Reply {
    Status(String),
    Error(String),
    Int(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<Reply>>),
}

impl Reply {
    fn ok() -> Self {
        Reply::Status("OK".into())
    }

    fn bulk(data: &[u8]) -> Self {
        Reply::Bulk(Some(data.to_vec()))
    }

    fn nil() -> Self {
        Reply::Bulk(None)
    }

    fn strings<'a>(items: impl IntoIterator<Item = &'a Vec<u8>>) -> Self {
        Reply::Array(Some(items.into_iter().map(|v| Reply::bulk(v)).collect()))
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Reply::Status(s) => out.extend_from_slice(format!("+{}\r\n", s).as_bytes()),
            Reply::Error(s) => out.extend_from_slice(format!("-{}\r\n", s).as_bytes()),
            Reply::Int(n) => out.extend_from_slice(format!(":{}\r\n", n).as_bytes()),
            Reply::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
            Reply::Bulk(Some(data)) => {
                out.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
                out.extend_from_slice(data);
                out.extend_from_slice(b"\r\n");
            }
            Reply::Array(None) => out.extend_from_slice(b"*-1\r\n"),
            Reply::Array(Some(items)) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode(out);
                }
            }
        }
    }
}

type CmdResult = Result<Reply, Reply>;

fn err(msg: &str) -> Reply {
    Reply::Error(format!("ERR {}", msg))
}

fn wrong_type() -> Reply {
    Reply::Error("WRONGTYPE Operation against a key holding the wrong kind of value".into())
}

fn arity(name: &str) -> Reply {
    err(&format!(
        "wrong number of arguments for '{}' command",
        name.to_ascii_lowercase()
    ))
}

fn int_arg(arg: &[u8]) -> Result<i64, Reply> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| err("value is not an integer or out of range"))
}

fn float_arg(arg: &[u8]) -> Result<f64, Reply> {
    let s = std::str::from_utf8(arg).map_err(|_| err("value is not a valid float"))?;
    match s {
        "-inf" => Ok(f64::NEG_INFINITY),
        "+inf" | "inf" => Ok(f64::INFINITY),
        _ => s.parse().map_err(|_| err("value is not a valid float")),
    }
}

fn text(v: &[u8]) -> String {
    String::from_utf8_lossy(v).into_owned()
}

fn format_score(score: f64) -> Vec<u8> {
    score.to_string().into_bytes()
}

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// Inclusive `[start, stop]` normalized against `len`, `None` when empty.
fn index_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

/// Glob match supporting `*` and `?`.
fn glob_match(pattern: &[u8], subject: &[u8]) -> bool {
    match (pattern.first(), subject.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match(&pattern[1..], subject)
                || (!subject.is_empty() && glob_match(pattern, &subject[1..]))
        }
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &subject[1..]),
        (Some(p), Some(s)) if p == s => glob_match(&pattern[1..], &subject[1..]),
        _ => false,
    }
}

// ============================================================================
// Connection handling
// ============================================================================

#[derive(Default)]
struct Session {
    authenticated: bool,
    watched: Vec<(Vec<u8>, u64)>,
    queued: Option<Vec<Vec<Vec<u8>>>>,
    patterns: Vec<String>,
    messages: Option<broadcast::Receiver<(String, String)>>,
}

async fn next_message(
    rx: &mut Option<broadcast::Receiver<(String, String)>>,
) -> Result<(String, String), broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn serve(stream: TcpStream, shared: Arc<Shared>, id: u64) {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = BytesMut::with_capacity(4096);
    let mut session = Session {
        authenticated: shared.password.is_none(),
        ..Session::default()
    };

    loop {
        loop {
            let frame = match decode_value(&mut buf) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(_) => return,
            };
            let args: Vec<Vec<u8>> = match frame {
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(b) => Some(b.to_vec()),
                        _ => None,
                    })
                    .collect(),
                _ => return,
            };
            if args.is_empty() {
                continue;
            }
            let mut out = Vec::new();
            for reply in handle(&shared, &mut session, id, args).await {
                reply.encode(&mut out);
            }
            if writer.write_all(&out).await.is_err() {
                unregister(&shared, id);
                return;
            }
        }

        tokio::select! {
            read = reader.read_buf(&mut buf) => {
                if !matches!(read, Ok(n) if n > 0) {
                    unregister(&shared, id);
                    return;
                }
            }
            message = next_message(&mut session.messages) => {
                let (channel, payload) = match message {
                    Ok(m) => m,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                };
                let mut out = Vec::new();
                for pattern in &session.patterns {
                    if glob_match(pattern.as_bytes(), channel.as_bytes()) {
                        Reply::Array(Some(vec![
                            Reply::bulk(b"pmessage"),
                            Reply::bulk(pattern.as_bytes()),
                            Reply::bulk(channel.as_bytes()),
                            Reply::bulk(payload.as_bytes()),
                        ]))
                        .encode(&mut out);
                    }
                }
                if writer.write_all(&out).await.is_err() {
                    unregister(&shared, id);
                    return;
                }
            }
        }
    }
}

fn unregister(shared: &Shared, id: u64) {
    shared.subscribers.lock().remove(&id);
}

/// Run one command; pub/sub commands can produce several replies.
async fn handle(shared: &Shared, session: &mut Session, id: u64, args: Vec<Vec<u8>>) -> Vec<Reply> {
    let name = text(&args[0]).to_ascii_uppercase();
    shared.log.lock().push(name.clone());

    if name == "AUTH" {
        let supplied = args.last().map(|p| text(p));
        return vec![match (&shared.password, supplied) {
            (Some(expected), Some(got)) if args.len() >= 2 && *expected == got => {
                session.authenticated = true;
                Reply::ok()
            }
            (None, _) => err("Client sent AUTH, but no password is set"),
            _ => Reply::Error("WRONGPASS invalid username-password pair".into()),
        }];
    }
    if !session.authenticated {
        return vec![Reply::Error("NOAUTH Authentication required.".into())];
    }

    if let Some(queued) = session.queued.as_mut() {
        match name.as_str() {
            "EXEC" | "DISCARD" | "MULTI" | "WATCH" => {}
            _ => {
                queued.push(args);
                return vec![Reply::Status("QUEUED".into())];
            }
        }
    }

    match name.as_str() {
        "PSUBSCRIBE" => return psubscribe(shared, session, id, &args[1..]),
        "PUNSUBSCRIBE" => return punsubscribe(shared, session, id, &args[1..]),
        "BLPOP" | "BRPOP" => return vec![blocking_pop(shared, &name, &args).await],
        _ => {}
    }
    if !session.patterns.is_empty() && name != "PING" {
        return vec![err("only (P)SUBSCRIBE / (P)UNSUBSCRIBE / PING / QUIT allowed in this context")];
    }

    let reply = match name.as_str() {
        "WATCH" => {
            if session.queued.is_some() {
                err("WATCH inside MULTI is not allowed")
            } else {
                let state = shared.state.lock();
                for key in &args[1..] {
                    session.watched.push((key.clone(), state.version(key)));
                }
                Reply::ok()
            }
        }
        "UNWATCH" => {
            session.watched.clear();
            Reply::ok()
        }
        "MULTI" => {
            if session.queued.is_some() {
                err("MULTI calls can not be nested")
            } else {
                session.queued = Some(Vec::new());
                Reply::ok()
            }
        }
        "DISCARD" => match session.queued.take() {
            Some(_) => {
                session.watched.clear();
                Reply::ok()
            }
            None => err("DISCARD without MULTI"),
        },
        "EXEC" => match session.queued.take() {
            Some(queued) => {
                let mut state = shared.state.lock();
                let dirty = session
                    .watched
                    .iter()
                    .any(|(key, version)| state.version(key) != *version);
                session.watched.clear();
                if dirty {
                    Reply::Array(None)
                } else {
                    let results = queued
                        .iter()
                        .map(|cmd| {
                            let name = text(&cmd[0]).to_ascii_uppercase();
                            execute(shared, &mut state, &name, cmd).unwrap_or_else(|e| e)
                        })
                        .collect();
                    Reply::Array(Some(results))
                }
            }
            None => err("EXEC without MULTI"),
        },
        _ => {
            let mut state = shared.state.lock();
            execute(shared, &mut state, &name, &args).unwrap_or_else(|e| e)
        }
    };
    vec![reply]
}

fn psubscribe(shared: &Shared, session: &mut Session, id: u64, patterns: &[Vec<u8>]) -> Vec<Reply> {
    if patterns.is_empty() {
        return vec![arity("psubscribe")];
    }
    if session.messages.is_none() {
        session.messages = Some(shared.messages.subscribe());
    }
    let mut replies = Vec::new();
    for pattern in patterns {
        let pattern = text(pattern);
        if !session.patterns.contains(&pattern) {
            session.patterns.push(pattern.clone());
        }
        replies.push(Reply::Array(Some(vec![
            Reply::bulk(b"psubscribe"),
            Reply::bulk(pattern.as_bytes()),
            Reply::Int(session.patterns.len() as i64),
        ])));
    }
    shared
        .subscribers
        .lock()
        .insert(id, session.patterns.clone());
    replies
}

fn punsubscribe(shared: &Shared, session: &mut Session, id: u64, patterns: &[Vec<u8>]) -> Vec<Reply> {
    let targets: Vec<String> = if patterns.is_empty() {
        session.patterns.clone()
    } else {
        patterns.iter().map(|p| text(p)).collect()
    };
    let mut replies = Vec::new();
    if targets.is_empty() {
        replies.push(Reply::Array(Some(vec![
            Reply::bulk(b"punsubscribe"),
            Reply::nil(),
            Reply::Int(0),
        ])));
    }
    for pattern in targets {
        session.patterns.retain(|p| *p != pattern);
        replies.push(Reply::Array(Some(vec![
            Reply::bulk(b"punsubscribe"),
            Reply::bulk(pattern.as_bytes()),
            Reply::Int(session.patterns.len() as i64),
        ])));
    }
    if session.patterns.is_empty() {
        session.messages = None;
        shared.subscribers.lock().remove(&id);
    } else {
        shared
            .subscribers
            .lock()
            .insert(id, session.patterns.clone());
    }
    replies
}

async fn blocking_pop(shared: &Shared, name: &str, args: &[Vec<u8>]) -> Reply {
    if args.len() < 3 {
        return arity(name);
    }
    let timeout = match float_arg(&args[args.len() - 1]) {
        Ok(t) if t >= 0.0 => t,
        _ => return err("timeout is not a float or out of range"),
    };
    let keys = &args[1..args.len() - 1];
    let deadline = (timeout > 0.0).then(|| Instant::now() + Duration::from_secs_f64(timeout));
    let front = name == "BLPOP";
    loop {
        {
            let mut state = shared.state.lock();
            for key in keys {
                let popped = match state.entry(key) {
                    Some(Data::List(items)) => {
                        if front {
                            items.pop_front()
                        } else {
                            items.pop_back()
                        }
                    }
                    _ => None,
                };
                if let Some(value) = popped {
                    state.touch(key);
                    state.drop_if_empty(key);
                    return Reply::Array(Some(vec![Reply::bulk(key), Reply::bulk(&value)]));
                }
            }
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Reply::Array(None);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ============================================================================
// Commands
// ============================================================================

fn execute(shared: &Shared, state: &mut State, name: &str, args: &[Vec<u8>]) -> CmdResult {
    let argc = args.len();
    let need = |n: usize| if argc < n { Err(arity(name)) } else { Ok(()) };

    match name {
        "PING" => Ok(Reply::Status("PONG".into())),
        "SELECT" => {
            need(2)?;
            int_arg(&args[1])?;
            Ok(Reply::ok())
        }
        "EXISTS" => {
            need(2)?;
            Ok(Reply::Int(
                args[1..].iter().filter(|k| state.exists(k)).count() as i64,
            ))
        }
        "DEL" => {
            need(2)?;
            Ok(Reply::Int(
                args[1..].iter().filter(|k| state.remove(k)).count() as i64,
            ))
        }
        "GET" => {
            need(2)?;
            match state.entry(&args[1]) {
                Some(Data::Str(v)) => Ok(Reply::bulk(v)),
                Some(_) => Err(wrong_type()),
                None => Ok(Reply::nil()),
            }
        }
        "SET" => {
            need(3)?;
            let mut expires_at = None;
            let mut keep_ttl = false;
            let mut nx = false;
            let mut xx = false;
            let mut i = 3;
            while i < argc {
                match text(&args[i]).to_ascii_uppercase().as_str() {
                    "EX" | "PX" if i + 1 < argc => {
                        let n = int_arg(&args[i + 1])?;
                        if n <= 0 {
                            return Err(err("invalid expire time in 'set' command"));
                        }
                        let dur = if text(&args[i]).eq_ignore_ascii_case("EX") {
                            Duration::from_secs(n as u64)
                        } else {
                            Duration::from_millis(n as u64)
                        };
                        expires_at = Some(Instant::now() + dur);
                        i += 1;
                    }
                    "KEEPTTL" => keep_ttl = true,
                    "NX" => nx = true,
                    "XX" => xx = true,
                    _ => return Err(err("syntax error")),
                }
                i += 1;
            }
            let exists = state.exists(&args[1]);
            if (nx && exists) || (xx && !exists) {
                return Ok(Reply::nil());
            }
            if keep_ttl {
                expires_at = state.expires_in(&args[1]).flatten().map(|d| Instant::now() + d);
            }
            state.insert(&args[1], Data::Str(args[2].clone()), expires_at);
            Ok(Reply::ok())
        }
        "SETNX" => {
            need(3)?;
            if state.exists(&args[1]) {
                return Ok(Reply::Int(0));
            }
            state.insert(&args[1], Data::Str(args[2].clone()), None);
            Ok(Reply::Int(1))
        }
        "SETEX" => {
            need(4)?;
            let seconds = int_arg(&args[2])?;
            if seconds <= 0 {
                return Err(err("invalid expire time in 'setex' command"));
            }
            let at = Instant::now() + Duration::from_secs(seconds as u64);
            state.insert(&args[1], Data::Str(args[3].clone()), Some(at));
            Ok(Reply::ok())
        }
        "EXPIRE" => {
            need(3)?;
            let seconds = int_arg(&args[2])?;
            state.purge(&args[1]);
            match state.entries.get_mut(args[1].as_slice()) {
                Some(entry) => {
                    entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds.max(0) as u64));
                    state.touch(&args[1]);
                    Ok(Reply::Int(1))
                }
                None => Ok(Reply::Int(0)),
            }
        }
        "TTL" | "PTTL" => {
            need(2)?;
            Ok(Reply::Int(match state.expires_in(&args[1]) {
                None => -2,
                Some(None) => -1,
                Some(Some(left)) if name == "TTL" => ((left.as_millis() + 500) / 1000) as i64,
                Some(Some(left)) => left.as_millis() as i64,
            }))
        }
        "INCR" | "DECR" | "INCRBY" => {
            need(if name == "INCRBY" { 3 } else { 2 })?;
            let delta = match name {
                "INCR" => 1,
                "DECR" => -1,
                _ => int_arg(&args[2])?,
            };
            let expires_at = state
                .expires_in(&args[1])
                .flatten()
                .map(|d| Instant::now() + d);
            let current = match state.entry(&args[1]) {
                Some(Data::Str(v)) => int_arg(v)?,
                Some(_) => return Err(wrong_type()),
                None => 0,
            };
            let next = current + delta;
            state.insert(&args[1], Data::Str(next.to_string().into_bytes()), expires_at);
            Ok(Reply::Int(next))
        }
        "LPUSH" | "RPUSH" => {
            need(3)?;
            if !state.exists(&args[1]) {
                state.insert(&args[1], Data::List(VecDeque::new()), None);
            }
            let len = match state.entry(&args[1]) {
                Some(Data::List(items)) => {
                    for value in &args[2..] {
                        if name == "LPUSH" {
                            items.push_front(value.clone());
                        } else {
                            items.push_back(value.clone());
                        }
                    }
                    items.len()
                }
                _ => return Err(wrong_type()),
            };
            state.touch(&args[1]);
            Ok(Reply::Int(len as i64))
        }
        "LRANGE" => {
            need(4)?;
            let (start, stop) = (int_arg(&args[2])?, int_arg(&args[3])?);
            match state.entry(&args[1]) {
                Some(Data::List(items)) => {
                    let items: Vec<Vec<u8>> = match index_range(items.len(), start, stop) {
                        Some((s, e)) => items.range(s..=e).cloned().collect(),
                        None => Vec::new(),
                    };
                    Ok(Reply::strings(&items))
                }
                Some(_) => Err(wrong_type()),
                None => Ok(Reply::Array(Some(Vec::new()))),
            }
        }
        "LLEN" => {
            need(2)?;
            match state.entry(&args[1]) {
                Some(Data::List(items)) => Ok(Reply::Int(items.len() as i64)),
                Some(_) => Err(wrong_type()),
                None => Ok(Reply::Int(0)),
            }
        }
        "LPOP" | "RPOP" => {
            need(2)?;
            let popped = match state.entry(&args[1]) {
                Some(Data::List(items)) => {
                    if name == "LPOP" {
                        items.pop_front()
                    } else {
                        items.pop_back()
                    }
                }
                Some(_) => return Err(wrong_type()),
                None => None,
            };
            match popped {
                Some(value) => {
                    state.touch(&args[1]);
                    state.drop_if_empty(&args[1]);
                    Ok(Reply::bulk(&value))
                }
                None => Ok(Reply::nil()),
            }
        }
        "HSET" => {
            if argc < 4 || argc % 2 != 0 {
                return Err(arity(name));
            }
            if !state.exists(&args[1]) {
                state.insert(&args[1], Data::Hash(HashMap::new()), None);
            }
            let added = match state.entry(&args[1]) {
                Some(Data::Hash(map)) => args[2..]
                    .chunks(2)
                    .filter(|pair| map.insert(pair[0].clone(), pair[1].clone()).is_none())
                    .count(),
                _ => return Err(wrong_type()),
            };
            state.touch(&args[1]);
            Ok(Reply::Int(added as i64))
        }
        "HGET" => {
            need(3)?;
            match state.entry(&args[1]) {
                Some(Data::Hash(map)) => Ok(Reply::Bulk(map.get(&args[2]).cloned())),
                Some(_) => Err(wrong_type()),
                None => Ok(Reply::nil()),
            }
        }
        "HMGET" => {
            need(3)?;
            match state.entry(&args[1]) {
                Some(Data::Hash(map)) => Ok(Reply::Array(Some(
                    args[2..]
                        .iter()
                        .map(|f| Reply::Bulk(map.get(f).cloned()))
                        .collect(),
                ))),
                Some(_) => Err(wrong_type()),
                None => Ok(Reply::Array(Some(
                    args[2..].iter().map(|_| Reply::nil()).collect(),
                ))),
            }
        }
        "HGETALL" | "HKEYS" => {
            need(2)?;
            match state.entry(&args[1]) {
                Some(Data::Hash(map)) => {
                    let mut flat = Vec::new();
                    for (field, value) in map.iter() {
                        flat.push(Reply::bulk(field));
                        if name == "HGETALL" {
                            flat.push(Reply::bulk(value));
                        }
                    }
                    Ok(Reply::Array(Some(flat)))
                }
                Some(_) => Err(wrong_type()),
                None => Ok(Reply::Array(Some(Vec::new()))),
            }
        }
        "HDEL" => {
            need(3)?;
            let removed = match state.entry(&args[1]) {
                Some(Data::Hash(map)) => args[2..].iter().filter(|f| map.remove(*f).is_some()).count(),
                Some(_) => return Err(wrong_type()),
                None => 0,
            };
            if removed > 0 {
                state.touch(&args[1]);
                state.drop_if_empty(&args[1]);
            }
            Ok(Reply::Int(removed as i64))
        }
        "HLEN" => {
            need(2)?;
            match state.entry(&args[1]) {
                Some(Data::Hash(map)) => Ok(Reply::Int(map.len() as i64)),
                Some(_) => Err(wrong_type()),
                None => Ok(Reply::Int(0)),
            }
        }
        "SADD" => {
            need(3)?;
            if !state.exists(&args[1]) {
                state.insert(&args[1], Data::Set(HashSet::new()), None);
            }
            let added = match state.entry(&args[1]) {
                Some(Data::Set(set)) => args[2..].iter().filter(|m| set.insert((*m).clone())).count(),
                _ => return Err(wrong_type()),
            };
            state.touch(&args[1]);
            Ok(Reply::Int(added as i64))
        }
        "SREM" => {
            need(3)?;
            let removed = match state.entry(&args[1]) {
                Some(Data::Set(set)) => args[2..].iter().filter(|m| set.remove(*m)).count(),
                Some(_) => return Err(wrong_type()),
                None => 0,
            };
            if removed > 0 {
                state.touch(&args[1]);
                state.drop_if_empty(&args[1]);
            }
            Ok(Reply::Int(removed as i64))
        }
        "SMEMBERS" => {
            need(2)?;
            match state.entry(&args[1]) {
                Some(Data::Set(set)) => Ok(Reply::strings(set.iter())),
                Some(_) => Err(wrong_type()),
                None => Ok(Reply::Array(Some(Vec::new()))),
            }
        }
        "SCARD" => {
            need(2)?;
            match state.entry(&args[1]) {
                Some(Data::Set(set)) => Ok(Reply::Int(set.len() as i64)),
                Some(_) => Err(wrong_type()),
                None => Ok(Reply::Int(0)),
            }
        }
        "SISMEMBER" => {
            need(3)?;
            match state.entry(&args[1]) {
                Some(Data::Set(set)) => Ok(Reply::Int(set.contains(&args[2]) as i64)),
                Some(_) => Err(wrong_type()),
                None => Ok(Reply::Int(0)),
            }
        }
        "ZADD" => {
            need(4)?;
            let score = float_arg(&args[2])?;
            if !state.exists(&args[1]) {
                state.insert(&args[1], Data::ZSet(Vec::new()), None);
            }
            let added = match state.entry(&args[1]) {
                Some(Data::ZSet(members)) => {
                    let existing = members.iter().position(|(m, _)| *m == args[3]);
                    match existing {
                        Some(i) => {
                            members[i].1 = score;
                            0
                        }
                        None => {
                            members.push((args[3].clone(), score));
                            1
                        }
                    }
                }
                _ => return Err(wrong_type()),
            };
            state.touch(&args[1]);
            Ok(Reply::Int(added))
        }
        "ZRANGE" => {
            need(4)?;
            let (start, stop) = (int_arg(&args[2])?, int_arg(&args[3])?);
            match state.entry(&args[1]) {
                Some(Data::ZSet(members)) => {
                    let sorted = sorted_members(members);
                    let items: Vec<Vec<u8>> = match index_range(sorted.len(), start, stop) {
                        Some((s, e)) => sorted[s..=e].iter().map(|(m, _)| m.clone()).collect(),
                        None => Vec::new(),
                    };
                    Ok(Reply::strings(&items))
                }
                Some(_) => Err(wrong_type()),
                None => Ok(Reply::Array(Some(Vec::new()))),
            }
        }
        "ZRANGEBYSCORE" => {
            need(4)?;
            let (min, max) = (float_arg(&args[2])?, float_arg(&args[3])?);
            let with_scores = argc > 4 && text(&args[4]).eq_ignore_ascii_case("WITHSCORES");
            match state.entry(&args[1]) {
                Some(Data::ZSet(members)) => {
                    let mut flat = Vec::new();
                    for (member, score) in sorted_members(members) {
                        if score >= min && score <= max {
                            flat.push(Reply::bulk(&member));
                            if with_scores {
                                flat.push(Reply::bulk(&format_score(score)));
                            }
                        }
                    }
                    Ok(Reply::Array(Some(flat)))
                }
                Some(_) => Err(wrong_type()),
                None => Ok(Reply::Array(Some(Vec::new()))),
            }
        }
        "ZREM" | "ZREMRANGEBYSCORE" => {
            need(3)?;
            let removed = match state.entry(&args[1]) {
                Some(Data::ZSet(members)) => {
                    let before = members.len();
                    if name == "ZREM" {
                        members.retain(|(m, _)| !args[2..].contains(m));
                    } else {
                        need(4)?;
                        let (min, max) = (float_arg(&args[2])?, float_arg(&args[3])?);
                        members.retain(|(_, s)| *s < min || *s > max);
                    }
                    before - members.len()
                }
                Some(_) => return Err(wrong_type()),
                None => 0,
            };
            if removed > 0 {
                state.touch(&args[1]);
                state.drop_if_empty(&args[1]);
            }
            Ok(Reply::Int(removed as i64))
        }
        "ZSCORE" => {
            need(3)?;
            match state.entry(&args[1]) {
                Some(Data::ZSet(members)) => Ok(Reply::Bulk(
                    members
                        .iter()
                        .find(|(m, _)| *m == args[2])
                        .map(|(_, s)| format_score(*s)),
                )),
                Some(_) => Err(wrong_type()),
                None => Ok(Reply::nil()),
            }
        }
        "EVAL" => {
            need(3)?;
            let script = text(&args[1]);
            let numkeys = int_arg(&args[2])? as usize;
            if argc < 3 + numkeys {
                return Err(err("Number of keys can't be greater than number of args"));
            }
            if !script.contains("redis.call('TIME')") {
                return Err(err("only server-time scripts are supported"));
            }
            let now = epoch_millis();
            if script.contains("'SET'") && numkeys >= 1 {
                state.insert(&args[3], Data::Str(now.to_string().into_bytes()), None);
            }
            Ok(Reply::Int(now))
        }
        "PUBLISH" => {
            need(3)?;
            let channel = text(&args[1]);
            let receivers = shared
                .subscribers
                .lock()
                .values()
                .filter(|patterns| {
                    patterns
                        .iter()
                        .any(|p| glob_match(p.as_bytes(), channel.as_bytes()))
                })
                .count();
            let _ = shared.messages.send((channel, text(&args[2])));
            Ok(Reply::Int(receivers as i64))
        }
        _ => Err(err(&format!("unknown command '{}'", name))),
    }
}

fn sorted_members(members: &[(Vec<u8>, f64)]) -> Vec<(Vec<u8>, f64)> {
    let mut sorted = members.to_vec();
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}
