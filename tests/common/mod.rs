//! Common test utilities
//!
//! [`ScriptedRunner`] stands in for kubectl and az: each rule matches an
//! invocation by the exact arguments it must contain and replays canned
//! output. Every invocation is recorded for later assertions.

#![allow(dead_code, reason = "each integration test binary uses a subset of the helpers")]

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use iam_demo_ops::tools::{CommandError, CommandOutput, CommandRunner, Invocation};

#[derive(Debug)]
struct Rule {
    required_args: Vec<String>,
    responses: VecDeque<CommandOutput>,
}

#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to invocations containing every argument in `args`
    ///
    /// Responses are replayed in order; the last one repeats.
    pub fn on(&self, args: &[&str], responses: Vec<CommandOutput>) -> &Self {
        self.rules.lock().unwrap().push(Rule {
            required_args: args.iter().map(|a| (*a).to_string()).collect(),
            responses: responses.into(),
        });
        self
    }

    pub fn on_ok(&self, args: &[&str], stdout: &str) -> &Self {
        self.on(args, vec![ok(stdout)])
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls whose arguments contain `arg`
    pub fn calls_with(&self, arg: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|inv| inv.arguments().iter().any(|a| a == arg))
            .collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(invocation.clone());

        let mut rules = self.rules.lock().unwrap();
        let rule = rules.iter_mut().find(|rule| {
            rule.required_args
                .iter()
                .all(|required| invocation.arguments().iter().any(|a| a == required))
        });
        let Some(rule) = rule else {
            return Ok(failed(&format!("unexpected command: {}", invocation.render())));
        };
        let output = if rule.responses.len() > 1 {
            rule.responses.pop_front().unwrap()
        } else {
            rule.responses.front().cloned().unwrap_or_default()
        };
        Ok(output)
    }
}

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn failed(stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// `kubectl get service -o json` payload
pub fn service_json(service_type: &str, annotations: &[(&str, &str)]) -> String {
    let annotations: serde_json::Map<String, serde_json::Value> = annotations
        .iter()
        .map(|(k, v)| ((*k).to_string(), serde_json::Value::from(*v)))
        .collect();
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": "ingress-nginx-controller",
            "namespace": "ingress-nginx",
            "annotations": annotations,
        },
        "spec": { "type": service_type },
    })
    .to_string()
}

/// Write `content` to `root/relative`, creating parent directories
pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}
