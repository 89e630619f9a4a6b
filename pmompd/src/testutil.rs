//! Scripted in-memory MPD server used by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::model::ServerDescriptor;
use crate::protocol::{Connector, Transport};

const DEFAULT_GREETING: &str = "OK MPD 0.23.5\n";

#[derive(Default)]
struct Script {
    greeting: Option<String>,
    responses: HashMap<String, Vec<u8>>,
    gates: HashMap<String, Receiver<()>>,
    log: Vec<String>,
    connects: usize,
    refuse: bool,
    dropped: bool,
}

/// Answers each command line with a canned response; unknown commands get a
/// bare `OK`. Cloning shares the script, so a test keeps a handle while the
/// session owns the transport.
#[derive(Clone, Default)]
pub(crate) struct FakeMpd {
    script: Arc<Mutex<Script>>,
}

impl FakeMpd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting(self, greeting: &str) -> Self {
        self.script.lock().unwrap().greeting = Some(greeting.to_string());
        self
    }

    /// `body` is the list of `key: value` lines; `OK` is appended.
    pub fn respond(&self, line: &str, body: &str) {
        let mut raw = body.as_bytes().to_vec();
        raw.extend_from_slice(b"OK\n");
        self.respond_raw(line, raw);
    }

    pub fn respond_raw(&self, line: &str, raw: Vec<u8>) {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(line.to_string(), raw);
    }

    pub fn fail(&self, line: &str, message: &str) {
        let name = line.split(' ').next().unwrap_or(line);
        let raw = format!("ACK [50@0] {{{name}}} {message}\n").into_bytes();
        self.respond_raw(line, raw);
    }

    /// Holds the response to `line` until the returned sender fires (or is
    /// dropped). One-shot.
    pub fn gate(&self, line: &str) -> Sender<()> {
        let (tx, rx) = bounded(1);
        self.script
            .lock()
            .unwrap()
            .gates
            .insert(line.to_string(), rx);
        tx
    }

    pub fn commands(&self) -> Vec<String> {
        self.script.lock().unwrap().log.clone()
    }

    pub fn count(&self, line: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|l| l.as_str() == line)
            .count()
    }

    pub fn connects(&self) -> usize {
        self.script.lock().unwrap().connects
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.script.lock().unwrap().refuse = refuse;
    }

    /// Makes the current connection look dead until the next connect.
    pub fn drop_connection(&self) {
        self.script.lock().unwrap().dropped = true;
    }

    pub fn transport(&self) -> Box<dyn Transport> {
        let greeting = self
            .script
            .lock()
            .unwrap()
            .greeting
            .clone()
            .unwrap_or_else(|| DEFAULT_GREETING.to_string());
        Box::new(FakeTransport {
            script: self.script.clone(),
            input: Vec::new(),
            pending: VecDeque::new(),
            output: greeting.into_bytes().into(),
        })
    }
}

impl Connector for FakeMpd {
    fn connect(
        &self,
        _server: &ServerDescriptor,
        _timeout: Duration,
    ) -> io::Result<Box<dyn Transport>> {
        {
            let mut script = self.script.lock().unwrap();
            if script.refuse {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "Connection refused",
                ));
            }
            script.connects += 1;
            script.dropped = false;
        }
        Ok(self.transport())
    }
}

struct FakeTransport {
    script: Arc<Mutex<Script>>,
    input: Vec<u8>,
    pending: VecDeque<String>,
    output: VecDeque<u8>,
}

impl Read for FakeTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if !self.output.is_empty() {
                let n = buf.len().min(self.output.len());
                for (slot, byte) in buf.iter_mut().zip(self.output.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            let Some(line) = self.pending.pop_front() else {
                return Ok(0);
            };
            let (response, gate) = {
                let mut script = self.script.lock().unwrap();
                if script.dropped {
                    return Ok(0);
                }
                let response = script
                    .responses
                    .get(&line)
                    .cloned()
                    .unwrap_or_else(|| b"OK\n".to_vec());
                (response, script.gates.remove(&line))
            };
            if let Some(gate) = gate {
                let _ = gate.recv();
            }
            self.output.extend(response);
        }
    }
}

impl Write for FakeTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.script.lock().unwrap().dropped {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "Broken pipe"));
        }
        self.input.extend_from_slice(buf);
        while let Some(pos) = self.input.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.input.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            self.script.lock().unwrap().log.push(line.clone());
            self.pending.push_back(line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for FakeTransport {}
