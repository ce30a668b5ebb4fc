//! Shared fixtures for the integration tests: test doubles for the external
//! collaborators (Raft participant, transport) this crate consumes but does
//! not implement.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;
use atomix_core::error::AtomixError;
use atomix_core::error::AtomixResult;
use atomix_core::raft_participant::ReadConsistency;
use atomix_core::raft_participant::RaftParticipant;
use tracing_subscriber::prelude::*;

pub fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::Layer::default().with_ansi(false);
    let subscriber = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(fmt_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// A scripted [`RaftParticipant`]: `submit` replays a fixed sequence of
/// results, one per call, repeating the last entry once exhausted.
pub struct ScriptedParticipant {
    session_counter: AtomicU64,
    submit_script: Mutex<VecDeque<AtomixResult<String>>>,
    submit_calls: AtomicUsize,
}

impl ScriptedParticipant {
    pub fn new(script: Vec<AtomixResult<String>>) -> Self {
        Self {
            session_counter: AtomicU64::new(0),
            submit_script: Mutex::new(script.into_iter().collect()),
            submit_calls: AtomicUsize::new(0),
        }
    }

    pub fn submit_call_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RaftParticipant<String, String> for ScriptedParticipant {
    async fn open_session(&self, _client_id: &str) -> AtomixResult<u64> {
        Ok(self.session_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn submit(&self, _session: u64, _sequence: u64, _command: String) -> AtomixResult<String> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.submit_script.lock().unwrap();
        match script.pop_front() {
            Some(result) => result,
            None => Ok("ok".to_string()),
        }
    }

    async fn query(&self, _session: u64, _level: ReadConsistency, _query: String) -> AtomixResult<String> {
        Ok("ok".to_string())
    }

    async fn keepalive(&self, _session: u64) -> AtomixResult<()> {
        Ok(())
    }

    async fn close_session(&self, _session: u64) -> AtomixResult<()> {
        Ok(())
    }
}

/// Clones an [`AtomixError`] well enough to script repeatable responses;
/// `AtomixError` itself does not derive `Clone` (it carries a boxed
/// `anyhow::Error` in one variant), so tests build fresh instances instead.
pub fn unavailable(partition: u64) -> AtomixError {
    AtomixError::Unavailable { partition }
}

pub fn session_expired(session: u64) -> AtomixError {
    AtomixError::SessionExpired { session }
}
