//! In-memory tracker and scripted command runner shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bootstrap::{CommandOutput, CommandRunner, CommandSpec, Issue, IssueComment, IssueTracker, TrackerError};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub const TITLE: &str = "Request Cluster Rebuild";

pub const ALL_NODES: &str = "\
NAME     STATUS   ROLES                  AGE   VERSION
klust1   Ready    control-plane,master   12d   v1.26.3+k3s1
klust2   Ready    <none>                 12d   v1.26.3+k3s1
klust3   Ready    <none>                 12d   v1.26.3+k3s1
";

pub const TWO_NODES: &str = "\
NAME     STATUS   ROLES                  AGE   VERSION
klust1   Ready    control-plane,master   12d   v1.26.3+k3s1
klust2   Ready    <none>                 12d   v1.26.3+k3s1
";

#[derive(Debug, Clone)]
pub struct FakeIssue {
    pub number: u64,
    pub title: String,
    pub open: bool,
    pub body: String,
    pub labels: Vec<String>,
    pub comments: Vec<IssueComment>,
    pub close_count: u32,
}

#[derive(Debug, Default)]
struct State {
    issues: Vec<FakeIssue>,
    next_number: u64,
    clock: i64,
    calls: u32,
    fail_listing: bool,
}

/// Issue tracker backed by memory. Comment timestamps advance one minute per
/// comment so ordering is deterministic.
#[derive(Debug, Default)]
pub struct FakeTracker {
    state: Mutex<State>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_number: 1,
                ..State::default()
            }),
        }
    }

    fn tick(state: &mut State) -> DateTime<Utc> {
        state.clock += 1;
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(state.clock)
    }

    /// Add an open issue and return its number.
    pub fn add_issue(&self, title: &str, labels: &[&str]) -> u64 {
        let mut state = self.state.lock().unwrap();
        let number = state.next_number;
        state.next_number += 1;
        state.issues.push(FakeIssue {
            number,
            title: title.to_string(),
            open: true,
            body: String::new(),
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
            comments: Vec::new(),
            close_count: 0,
        });
        number
    }

    /// Seed a comment as if someone else had posted it.
    pub fn add_comment(&self, issue: u64, body: &str) {
        let mut state = self.state.lock().unwrap();
        let created_at = Self::tick(&mut state);
        let issue = state.issues.iter_mut().find(|i| i.number == issue).unwrap();
        issue.comments.push(IssueComment {
            body: body.to_string(),
            created_at,
        });
    }

    pub fn fail_listing(&self) {
        self.state.lock().unwrap().fail_listing = true;
    }

    pub fn issue(&self, number: u64) -> FakeIssue {
        let state = self.state.lock().unwrap();
        state.issues.iter().find(|i| i.number == number).unwrap().clone()
    }

    pub fn issues(&self) -> Vec<FakeIssue> {
        self.state.lock().unwrap().issues.clone()
    }

    pub fn comment_bodies(&self, number: u64) -> Vec<String> {
        self.issue(number).comments.into_iter().map(|c| c.body).collect()
    }

    /// Number of tracker operations performed.
    pub fn calls(&self) -> u32 {
        self.state.lock().unwrap().calls
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn list_open_issues(&self) -> Result<Vec<Issue>, TrackerError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.fail_listing {
            return Err(TrackerError::Api {
                status: 502,
                message: "Bad Gateway".to_string(),
            });
        }
        Ok(state
            .issues
            .iter()
            .filter(|i| i.open)
            .map(|i| Issue {
                number: i.number,
                title: i.title.clone(),
                created_at: None,
            })
            .collect())
    }

    async fn create_issue(&self, title: &str, body: &str) -> Result<Issue, TrackerError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        let number = state.next_number;
        state.next_number += 1;
        state.issues.push(FakeIssue {
            number,
            title: title.to_string(),
            open: true,
            body: body.to_string(),
            labels: Vec::new(),
            comments: Vec::new(),
            close_count: 0,
        });
        Ok(Issue {
            number,
            title: title.to_string(),
            created_at: None,
        })
    }

    async fn list_labels(&self, issue: u64) -> Result<Vec<String>, TrackerError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        Ok(state
            .issues
            .iter()
            .find(|i| i.number == issue)
            .map(|i| i.labels.clone())
            .unwrap_or_default())
    }

    async fn latest_comment(&self, issue: u64) -> Result<Option<IssueComment>, TrackerError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        let comments = state
            .issues
            .iter()
            .find(|i| i.number == issue)
            .map(|i| i.comments.clone())
            .unwrap_or_default();
        Ok(bootstrap::tracker::most_recent(comments))
    }

    async fn create_comment(&self, issue: u64, body: &str) -> Result<(), TrackerError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        let created_at = Self::tick(&mut state);
        let issue = state
            .issues
            .iter_mut()
            .find(|i| i.number == issue)
            .ok_or(TrackerError::Api {
                status: 404,
                message: "Not Found".to_string(),
            })?;
        issue.comments.push(IssueComment {
            body: body.to_string(),
            created_at,
        });
        Ok(())
    }

    async fn close_issue(&self, issue: u64) -> Result<(), TrackerError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        let issue = state
            .issues
            .iter_mut()
            .find(|i| i.number == issue)
            .ok_or(TrackerError::Api {
                status: 404,
                message: "Not Found".to_string(),
            })?;
        issue.open = false;
        issue.close_count += 1;
        Ok(())
    }
}

/// Command runner returning canned results per program. Unscripted programs
/// succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    results: Mutex<HashMap<String, CommandOutput>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, program: &str, output: CommandOutput) -> Self {
        self.results
            .lock()
            .unwrap()
            .insert(program.to_string(), output);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.split_whitespace().next().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> CommandOutput {
        self.calls.lock().unwrap().push(spec.to_string());
        self.results
            .lock()
            .unwrap()
            .get(&spec.program)
            .cloned()
            .unwrap_or_else(|| CommandOutput::success(""))
    }
}
