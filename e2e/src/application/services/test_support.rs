//! Shared test helpers for service tests.
//!
//! `ScriptedTransport` replays canned replies in order (the last one repeats)
//! and records every command it receives.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::application::ports::{AgentExecutor, RemoteExecutor};
use crate::domain::CommandError;

#[derive(Debug, Clone)]
enum Reply {
    Ok(String),
    Exit(i32, String),
    Transport(String),
}

impl Reply {
    fn to_result(&self, command: &str) -> Result<String, CommandError> {
        match self {
            Self::Ok(out) => Ok(out.clone()),
            Self::Exit(code, stderr) => Err(CommandError::NonZeroExit {
                command: command.to_string(),
                code: Some(*code),
                stdout: String::new(),
                stderr: stderr.clone(),
            }),
            Self::Transport(reason) => Err(CommandError::Transport {
                target: "test@scripted:22".to_string(),
                reason: reason.clone(),
            }),
        }
    }
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    commands: Vec<String>,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, reply: Reply) -> Self {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).replies.push_back(reply);
        self
    }

    pub fn ok(self, stdout: &str) -> Self {
        self.push(Reply::Ok(stdout.to_string()))
    }

    pub fn exit(self, code: i32, stderr: &str) -> Self {
        self.push(Reply::Exit(code, stderr.to_string()))
    }

    pub fn transport(self, reason: &str) -> Self {
        self.push(Reply::Transport(reason.to_string()))
    }

    pub fn commands(&self) -> Vec<String> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).commands.clone()
    }

    fn next(&self, command: &str) -> Result<String, CommandError> {
        let mut script = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        script.commands.push(command.to_string());
        let reply = if script.replies.len() > 1 {
            script.replies.pop_front()
        } else {
            script.replies.front().cloned()
        };
        reply.map_or_else(|| Ok(String::new()), |r| r.to_result(command))
    }
}

impl RemoteExecutor for ScriptedTransport {
    fn target(&self) -> String {
        "test@scripted:22".to_string()
    }

    async fn execute(&self, command: &str) -> Result<String, CommandError> {
        self.next(command)
    }
}

impl AgentExecutor for ScriptedTransport {
    async fn execute(&self, args: &[&str]) -> Result<String, CommandError> {
        self.next(&args.join(" "))
    }
}
