#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use mi_bridge::debugger::{Allocation, ProgramState};
use mi_bridge::protocol::{decode_records, split_token, RawRecord, Record};
use mi_bridge::transport::{SessionId, Transport, VariableLocation};
use mi_bridge::Result;

/// Answers one command body (token already stripped) with wire records.
pub type Responder = Box<dyn Fn(Option<u64>, &str) -> Vec<Value> + Send + Sync>;

/// Scripted stand-in for the HTTP backend. Every call is logged in order.
pub struct MockBackend {
    pub session: SessionId,
    responder: Responder,
    pub load: Vec<Value>,
    pub heap: Mutex<Vec<Allocation>>,
    pub output: Mutex<Vec<String>>,
    pub snapshot: Mutex<Option<ProgramState>>,
    /// Commands whose body starts with this prefix stall for the duration.
    pub slow: Option<(String, Duration)>,
    pub log: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new(responder: Responder) -> Self {
        Self {
            session: 7,
            responder,
            load: Vec::new(),
            heap: Mutex::new(Vec::new()),
            output: Mutex::new(Vec::new()),
            snapshot: Mutex::new(None),
            slow: None,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_load(mut self, records: Vec<Value>) -> Self {
        self.load = records;
        self
    }

    pub fn with_slow_command(mut self, prefix: &str, delay: Duration) -> Self {
        self.slow = Some((prefix.to_string(), delay));
        self
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Command lines sent, tokens included.
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("command ").map(str::to_string))
            .collect()
    }
}

pub fn decode(values: Vec<Value>) -> Vec<Record> {
    let raw: Vec<RawRecord> = values
        .into_iter()
        .map(|v| serde_json::from_value(v).expect("mock record must decode"))
        .collect();
    decode_records(raw)
}

impl Transport for MockBackend {
    async fn start(&self) -> Result<SessionId> {
        self.record("start".to_string());
        Ok(self.session)
    }

    async fn load_and_run(&self, session: SessionId, source: &str) -> Result<Vec<Record>> {
        self.record(format!("load {} {}", session, source.len()));
        Ok(decode(self.load.clone()))
    }

    async fn command(&self, _session: SessionId, text: &str) -> Result<Vec<Record>> {
        self.record(format!("command {}", text));
        let (token, body) = split_token(text);
        if let Some((prefix, delay)) = &self.slow {
            if body.starts_with(prefix.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }
        Ok(decode((self.responder)(token, body)))
    }

    async fn output(&self, _session: SessionId) -> Result<Vec<String>> {
        self.record("output".to_string());
        Ok(self.output.lock().unwrap().clone())
    }

    async fn memory(&self, _session: SessionId) -> Result<Vec<Allocation>> {
        self.record("memory".to_string());
        Ok(self.heap.lock().unwrap().clone())
    }

    async fn variable(&self, _session: SessionId, frame: u32, name: &str) -> Result<VariableLocation> {
        self.record(format!("variable {} {}", frame, name));
        let address = (self.responder)(None, &format!("-data-evaluate-expression --thread 1 --frame {} &{}", frame, name));
        let size = (self.responder)(None, &format!("-data-evaluate-expression --thread 1 --frame {} sizeof({})", frame, name));
        Ok(VariableLocation {
            address: decode(address),
            size: decode(size),
        })
    }

    async fn step(&self, _session: SessionId) -> Result<ProgramState> {
        self.record("step".to_string());
        Ok(self.snapshot.lock().unwrap().clone().unwrap_or_default())
    }

    async fn close(&self, session: SessionId) -> Result<()> {
        self.record(format!("close {}", session));
        Ok(())
    }
}

// Records in the shape the backend's MI parser emits.

pub fn done(token: Option<u64>, payload: Value) -> Value {
    json!({"type": "result", "message": "done", "token": token, "payload": payload, "stream": "stdout"})
}

pub fn error(token: Option<u64>, msg: &str) -> Value {
    json!({"type": "result", "message": "error", "token": token, "payload": {"msg": msg}, "stream": "stdout"})
}

pub fn running(token: Option<u64>) -> Value {
    json!({"type": "result", "message": "running", "token": token, "payload": null, "stream": "stdout"})
}

pub fn stopped(reason: &str, line: Option<u32>) -> Value {
    let mut payload = json!({"reason": reason});
    if let Some(line) = line {
        payload["frame"] = json!({"func": "main", "file": "prog.c", "line": line.to_string()});
    }
    json!({"type": "notify", "message": "stopped", "token": null, "payload": payload, "stream": "stdout"})
}

pub fn console(text: &str) -> Value {
    json!({"type": "console", "message": null, "token": null, "payload": text, "stream": "stdout"})
}

/// A stopped program described frame by frame, answering the listing and
/// evaluation commands the bridge issues.
#[derive(Clone, Default)]
pub struct ScriptedProgram {
    /// (function, line, [(name, value, type, address, size)]) innermost first.
    pub frames: Vec<(String, u32, Vec<(String, String, String, String, u64)>)>,
    /// Answers for execution-control commands, keyed by command body.
    pub control: HashMap<String, Vec<Value>>,
}

impl ScriptedProgram {
    pub fn frame(mut self, function: &str, line: u32, vars: &[(&str, &str, &str, &str, u64)]) -> Self {
        let vars = vars
            .iter()
            .map(|(n, v, t, a, s)| (n.to_string(), v.to_string(), t.to_string(), a.to_string(), *s))
            .collect();
        self.frames.push((function.to_string(), line, vars));
        self
    }

    pub fn on(mut self, command: &str, records: Vec<Value>) -> Self {
        self.control.insert(command.to_string(), records);
        self
    }

    pub fn respond(&self, token: Option<u64>, body: &str) -> Vec<Value> {
        if let Some(records) = self.control.get(body) {
            return records
                .iter()
                .cloned()
                .map(|mut r| {
                    if r["type"] == "result" {
                        r["token"] = json!(token);
                    }
                    r
                })
                .collect();
        }

        if body == "-stack-list-frames" {
            if self.frames.is_empty() {
                return vec![error(token, "No stack.")];
            }
            let stack: Vec<Value> = self
                .frames
                .iter()
                .enumerate()
                .map(|(level, (func, line, _))| {
                    json!({
                        "level": level.to_string(),
                        "addr": format!("0x40{:04x}", 0x1136 + level * 0x20),
                        "func": func,
                        "file": "prog.c",
                        "fullname": "/tmp/prog.c",
                        "line": line.to_string(),
                    })
                })
                .collect();
            return vec![done(token, json!({"stack": stack}))];
        }

        let words: Vec<&str> = body.split_whitespace().collect();
        match words.as_slice() {
            ["-stack-list-variables", "--thread", _, "--frame", frame, mode] => {
                let Some((_, _, vars)) = frame.parse::<usize>().ok().and_then(|f| self.frames.get(f)) else {
                    return vec![error(token, "No frame.")];
                };
                let variables: Vec<Value> = vars
                    .iter()
                    .map(|(name, value, ty, _, _)| match *mode {
                        "--all-values" => json!({"name": name, "value": value}),
                        _ => json!({"name": name, "type": ty}),
                    })
                    .collect();
                vec![done(token, json!({"variables": variables}))]
            }
            ["-data-evaluate-expression", "--thread", _, "--frame", frame, expression] => {
                let Some((_, _, vars)) = frame.parse::<usize>().ok().and_then(|f| self.frames.get(f)) else {
                    return vec![error(token, "No frame.")];
                };
                let found = |name: &str| vars.iter().find(|(n, ..)| n == name);
                if let Some(name) = expression.strip_prefix('&') {
                    if let Some((_, _, ty, address, _)) = found(name) {
                        return vec![done(token, json!({"value": format!("({} *) {}", ty, address)}))];
                    }
                } else if let Some(name) = expression
                    .strip_prefix("sizeof(")
                    .and_then(|rest| rest.strip_suffix(')'))
                {
                    if let Some((.., size)) = found(name) {
                        return vec![done(token, json!({"value": size.to_string()}))];
                    }
                }
                vec![error(token, "No symbol in current context.")]
            }
            _ => vec![error(token, &format!("Undefined MI command: {}", body))],
        }
    }

    pub fn into_backend(self) -> MockBackend {
        MockBackend::new(Box::new(move |token, body| self.respond(token, body)))
    }
}
