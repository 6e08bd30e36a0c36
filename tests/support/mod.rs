//! Test plumbing: a fake Logstash collector and a driver for the listener
//! binary that speaks the supervisor side of the event protocol.

#![allow(dead_code)]

use std::io::{BufReader, Read, Write};
use std::net::UdpSocket;
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::{Value, json};

/// Fields that change from run to run
const VOLATILE: &[&str] = &["@timestamp", "host", "pid", "tries", "stack_info"];

/// Source tag the test configs stamp on every record
pub const SOURCE_TAG: &str = "supervisor-events";

/// UDP server that keeps every datagram it receives
pub struct Collector {
    port: u16,
    messages: Arc<Mutex<Vec<String>>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Collector {
    pub fn start() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind collector");
        socket
            .set_read_timeout(Some(Duration::from_millis(50)))
            .expect("Failed to set read timeout");
        let port = socket.local_addr().unwrap().port();

        let messages = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let messages = Arc::clone(&messages);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut buf = vec![0u8; 65_536];
                while running.load(Ordering::SeqCst) {
                    if let Ok((n, _)) = socket.recv_from(&mut buf) {
                        let text = String::from_utf8_lossy(&buf[..n]).trim().to_string();
                        messages.lock().unwrap().push(text);
                    }
                }
            })
        };

        Self {
            port,
            messages,
            running,
            handle: Some(handle),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Received messages with volatile fields stripped
    pub fn messages(&self, clear_buffer: bool) -> Vec<Value> {
        let mut guard = self.messages.lock().unwrap();
        let parsed = guard.iter().map(|m| strip_volatile(m)).collect();
        if clear_buffer {
            guard.clear();
        }
        parsed
    }

    pub fn clear(&self) {
        self.messages.lock().unwrap().clear();
    }

    /// Wait until at least `count` messages arrived, then return them
    pub fn wait_for(&self, count: usize) -> Vec<Value> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if self.messages.lock().unwrap().len() >= count {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        self.messages(false)
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Parse a datagram and drop its volatile fields
pub fn strip_volatile(message: &str) -> Value {
    let mut value: Value = serde_json::from_str(message).expect("collector received invalid JSON");
    if let Value::Object(ref mut map) = value {
        for key in VOLATILE {
            map.remove(*key);
        }
    }
    value
}

/// Expected collector document for a state change of the `messages` program
pub fn record(eventname: &str, from_state: &str) -> Value {
    json!({
        "@version": "1",
        "eventname": eventname,
        "from_state": from_state,
        "groupname": "messages",
        "level": "INFO",
        "logger_name": "supervisor",
        "message": format!("{} messages", eventname),
        "path": SOURCE_TAG,
        "processname": "messages",
        "tags": [],
        "type": "logstash"
    })
}

/// Write a listener config pointing at `port`
pub fn write_config(dir: &Path, port: u16) -> std::path::PathBuf {
    let path = dir.join("notifier.yaml");
    let yaml = format!(
        "collector:\n  host: 127.0.0.1\n  port: {}\nrecord:\n  source_tag: {}\n",
        port, SOURCE_TAG
    );
    std::fs::write(&path, yaml).expect("Failed to write config");
    path
}

/// Supervisor side of the event protocol
pub struct Listener {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    serial: u64,
}

/// Everything the listener left behind after its input closed
pub struct Finished {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl Listener {
    pub fn spawn(config: &Path, args: &[&str], envs: &[(&str, &str)]) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_logstash-notifier"))
            .arg("--config")
            .arg(config)
            .arg("listen")
            .args(args)
            .env_remove("LOGSTASH_SERVER")
            .env_remove("LOGSTASH_PORT")
            .env_remove("NOTIFIER_CONFIG")
            .env_remove("RUST_LOG")
            .envs(envs.iter().copied())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn logstash-notifier");

        let stdin = child.stdin.take();
        let stdout = BufReader::new(child.stdout.take().unwrap());
        Self {
            child,
            stdin,
            stdout,
            serial: 0,
        }
    }

    fn read_exact_str(&mut self, len: usize) -> String {
        let mut buf = vec![0u8; len];
        self.stdout.read_exact(&mut buf).expect("listener stdout closed early");
        String::from_utf8(buf).unwrap()
    }

    pub fn expect_ready(&mut self) {
        assert_eq!(self.read_exact_str(6), "READY\n");
    }

    pub fn expect_ack(&mut self) {
        assert_eq!(self.read_exact_str(11), "RESULT 2\nOK");
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        stdin.write_all(bytes).unwrap();
        stdin.flush().unwrap();
    }

    /// Build a protocol frame the way the supervisor does
    pub fn frame(&mut self, eventname: &str, payload: &str) -> Vec<u8> {
        self.serial += 1;
        format!(
            "ver:3.0 server:supervisor serial:{serial} pool:logstash poolserial:{serial} eventname:{} len:{}\n{}",
            eventname,
            payload.len(),
            payload,
            serial = self.serial
        )
        .into_bytes()
    }

    /// Wait for READY, send one frame, wait for its acknowledgement
    pub fn send(&mut self, eventname: &str, payload: &str) {
        self.expect_ready();
        let frame = self.frame(eventname, payload);
        self.write_raw(&frame);
        self.expect_ack();
    }

    /// Close stdin and collect what the listener did afterwards
    pub fn finish(mut self) -> Finished {
        drop(self.stdin.take());

        let mut stdout = String::new();
        self.stdout.read_to_string(&mut stdout).unwrap();

        let status = self.child.wait().unwrap();

        let mut stderr = String::new();
        if let Some(mut err) = self.child.stderr.take() {
            err.read_to_string(&mut stderr).unwrap();
        }

        Finished { status, stdout, stderr }
    }
}
