#![allow(dead_code)]

use async_trait::async_trait;
use clap::Parser;
use iib_push::cli::{Cli, OperationConfig, Runner};
use iib_push::common::{CommandOptions, CommandOutput, CommandRunner};
use iib_push::iib::{BuildDetails, BuildRequest, IibClient};
use iib_push::push::{PushCollector, PushItem, PushItemState};
use iib_push::{IibPushError, Logger, Result};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

/// IIB stand-in returning a submitted build and then its final state
pub struct FakeIib {
    pub submitted: BuildDetails,
    pub finished: BuildDetails,
    pub requests: Mutex<Vec<BuildRequest>>,
    /// `get_build` fails, as when IIB becomes unreachable after the wait
    pub lookup_fails: bool,
    /// `wait_for_build` gives up before the build finishes
    pub wait_times_out: bool,
}

impl FakeIib {
    pub fn new(submitted: Value, finished: Value) -> Self {
        Self {
            submitted: serde_json::from_value(submitted).unwrap(),
            finished: serde_json::from_value(finished).unwrap(),
            requests: Mutex::new(Vec::new()),
            lookup_fails: false,
            wait_times_out: false,
        }
    }

    pub fn with_failing_lookup(mut self) -> Self {
        self.lookup_fails = true;
        self
    }

    pub fn with_wait_timeout(mut self) -> Self {
        self.wait_times_out = true;
        self
    }
}

#[async_trait]
impl IibClient for FakeIib {
    async fn add_bundles(&self, request: &BuildRequest) -> Result<BuildDetails> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.submitted.clone())
    }

    async fn remove_operators(&self, request: &BuildRequest) -> Result<BuildDetails> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.submitted.clone())
    }

    async fn get_build(&self, _id: &str) -> Result<BuildDetails> {
        if self.lookup_fails {
            return Err(IibPushError::Network("connection refused".to_string()));
        }
        Ok(self.finished.clone())
    }

    async fn wait_for_build(&self, build: &BuildDetails) -> Result<BuildDetails> {
        if self.wait_times_out {
            return Err(IibPushError::BuildTimeout {
                id: build.id.clone(),
                seconds: 7200,
            });
        }
        Ok(self.finished.clone())
    }

    fn build_url(&self, id: &str) -> String {
        format!("https://iib-server/api/v1/builds/{}", id)
    }
}

#[derive(Default)]
pub struct RecordingCollector {
    pub updates: Mutex<Vec<Vec<PushItem>>>,
}

impl RecordingCollector {
    pub fn states(&self) -> Vec<Vec<PushItemState>> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .map(|items| items.iter().map(|item| item.state).collect())
            .collect()
    }
}

#[async_trait]
impl PushCollector for RecordingCollector {
    async fn update_push_items(&self, items: &[PushItem]) -> Result<()> {
        self.updates.lock().unwrap().push(items.to_vec());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Records subprocess calls; exits with `status` for every call.
pub struct RecordingCommands {
    pub status: i32,
    pub calls: Mutex<Vec<Invocation>>,
}

impl RecordingCommands {
    pub fn succeeding() -> Self {
        Self {
            status: 0,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            status: 1,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingCommands {
    async fn run_output(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(Invocation {
            program: program.to_string(),
            args: args.to_vec(),
            env: options.env.clone(),
        });
        Ok(CommandOutput {
            status_code: Some(self.status),
            stdout: Vec::new(),
            stderr: b"boom".to_vec(),
        })
    }
}

pub fn config(args: &[&str]) -> OperationConfig {
    let cli = Cli::try_parse_from(args).unwrap();
    OperationConfig::from_command(cli.command).unwrap()
}

pub fn runner(
    config: OperationConfig,
    iib: Arc<FakeIib>,
    collector: Arc<RecordingCollector>,
    commands: Arc<RecordingCommands>,
) -> Runner {
    Runner::new(config, iib, collector, commands, Logger::new_quiet())
}

fn state_reason(state: &str) -> &'static str {
    if state == "failed" { "Generic IIB error" } else { "" }
}

pub fn add_build(state: &str) -> Value {
    json!({
        "id": 1,
        "state": state,
        "state_reason": state_reason(state),
        "request_type": "add",
        "from_index": "index-image",
        "from_index_resolved": "index-image@sha256:1111",
        "binary_image": "binary-image",
        "binary_image_resolved": "binary-image@sha256:2222",
        "index_image": "feed.com/index/image:tag",
        "index_image_resolved": "feed.com/index/image@sha256:3333",
        "arches": ["x86_64"],
        "bundle_mapping": {"operator-1": ["bundle1", "bundle2"]},
        "removed_operators": [],
        "organization": null,
        "omps_operator_version": {},
    })
}

pub fn rm_build(state: &str) -> Value {
    json!({
        "id": 2,
        "state": state,
        "state_reason": state_reason(state),
        "request_type": "rm",
        "from_index": "index-image",
        "binary_image": "binary-image",
        "index_image": "feed.com/index/image:tag",
        "arches": ["x86_64"],
        "bundle_mapping": {},
        "removed_operators": ["operator1"],
    })
}
