//! Thin startup binary: loads the graph, wires up the engine, and exposes a
//! minimal line-oriented TCP listener so the crate is runnable end to end.
//! The real HTTP/duplex-socket transport is explicitly out of scope for
//! the engine (see the library's module docs); this is just enough glue
//! to drive it from a socket, in both reply-channel flavors §6 names: a
//! one-shot XHR-style stream and a duplex socket that also carries
//! `QUEUED`/`WAITING`/`WORKING`/`DONE` progress frames.
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use fastcci::config::Args;
use fastcci::engine::Engine;
use fastcci::graph::Graph;
use fastcci::intake::RequestParams;
use fastcci::queue::JobStatus;
use fastcci::writer::ReplyChannel;

struct QueryParams(HashMap<String, String>);

impl RequestParams for QueryParams {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

fn parse_query(line: &str) -> QueryParams {
    let mut map = HashMap::new();
    for pair in line.trim().split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            map.insert(k.to_string(), v.to_string());
        }
    }
    QueryParams(map)
}

/// One-shot reply channel: writes every line to the TCP stream, then the
/// connection is closed by the caller. Progress frames (`WAITING`/
/// `WORKING`) don't apply to this mode — there is nowhere to put a frame
/// that isn't the final body.
struct XhrChannel(TcpStream);

impl ReplyChannel for XhrChannel {
    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.0, "{}", line)
    }

    fn supports_progress(&self) -> bool {
        false
    }
}

/// Duplex reply channel: every framed line is pushed to the socket as soon
/// as it's produced, including the out-of-band `QUEUED`/`WAITING`/`WORKING`
/// frames the notifier and worker emit while the client is still attached.
struct SocketChannel(TcpStream);

impl ReplyChannel for SocketChannel {
    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.0, "{}", line)
    }

    fn supports_progress(&self) -> bool {
        true
    }
}

fn handle_connection(stream: TcpStream, engine: &Engine) {
    let peer = stream.peer_addr().ok();
    let mut reader = BufReader::new(stream.try_clone().expect("clone tcp stream"));
    let mut line = String::new();
    if reader.read_line(&mut line).unwrap_or(0) == 0 {
        return;
    }

    if line.trim() == "status" {
        let mut stream = stream;
        let _ = stream.write_all(engine.status_probe().as_bytes());
        return;
    }

    let params = parse_query(&line);
    let duplex = params.get("mode") == Some("socket");

    let channel: Box<dyn ReplyChannel> = if duplex {
        Box::new(SocketChannel(stream.try_clone().expect("clone tcp stream")))
    } else {
        Box::new(XhrChannel(stream.try_clone().expect("clone tcp stream")))
    };

    match engine.submit(&params, channel) {
        Ok(job) => {
            if duplex {
                let mut sock = stream;
                job.wait_with_progress(|status, fnum_a, fnum_b| {
                    let frame = match status {
                        JobStatus::Waiting => engine.position_of(&job).map(|k| format!("WAITING {}\n", k)),
                        JobStatus::Preprocess | JobStatus::Computing => Some(format!("WORKING {} {}\n", fnum_a, fnum_b)),
                        JobStatus::Streaming | JobStatus::Done => None,
                    };
                    if let Some(frame) = frame {
                        let _ = sock.write_all(frame.as_bytes());
                    }
                });
                let _ = sock.write_all(b"DONE\n");
            } else {
                job.wait_until_done();
            }
            info!(?peer, duplex, "request completed");
        }
        Err(err) => {
            warn!(?peer, %err, "request rejected at intake");
        }
    }
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let graph = match Graph::load(&args.cat, &args.tree) {
        Ok(graph) => graph,
        Err(err) => {
            error!(%err, "failed to load graph, exiting");
            std::process::exit(1);
        }
    };
    info!(entities = graph.len(), "graph loaded");

    let engine = Arc::new(Engine::new(graph, args.queue_capacity));
    engine.spawn_worker();
    engine.spawn_notifier();

    let listener = match TcpListener::bind(("0.0.0.0", args.port)) {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, port = args.port, "failed to bind port, exiting");
            std::process::exit(1);
        }
    };
    info!(port = args.port, "server ready");

    // One handler thread per connection, matching the concurrency model of
    // spec §5: any number of request-handler threads may have a job
    // in-flight at once, serialized only by the single compute worker.
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || handle_connection(stream, &engine));
            }
            Err(err) => warn!(%err, "failed to accept connection"),
        }
    }
}
