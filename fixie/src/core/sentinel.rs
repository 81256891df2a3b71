//! Sentinel tokens and chunk-boundary-safe detection.
//!
//! After every fragment the session echoes `<token> <status>`. The scanner
//! finds the token in a stream of arbitrarily split reads. Only a trailing
//! run of bytes that is itself a prefix of the token is held back (at most
//! `token.len() - 1` bytes); everything else is released as soon as it is read.

use uuid::Uuid;

const PREFIX: &str = "__FIXIE_DONE__";

/// A per-execution marker: fixed prefix plus a fresh v4 UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelToken(String);

impl SentinelToken {
    pub fn generate() -> Self {
        Self::from_id(Uuid::new_v4())
    }

    pub fn from_id(id: Uuid) -> Self {
        Self(format!("{PREFIX}{}", id.hyphenated()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Shell directive that prints the token followed by the previous status.
    pub fn echo_directive(&self) -> String {
        format!("echo {} $?", self.0)
    }
}

/// Result of feeding one chunk to a [`SentinelScanner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// Fragment still running; `output` is safe to show now (may be empty).
    Output(Vec<u8>),
    /// Sentinel line seen.
    Done {
        /// Remaining fragment output preceding the token.
        output: Vec<u8>,
        /// Status echoed after the token, if it parsed.
        exit_code: Option<i32>,
        /// Bytes read past the sentinel line.
        trailing: Vec<u8>,
    },
}

#[derive(Debug)]
enum State {
    Searching { window: Vec<u8> },
    AwaitingStatus { held: Vec<u8>, status: Vec<u8> },
    Finished,
}

/// Incremental search for one [`SentinelToken`].
#[derive(Debug)]
pub struct SentinelScanner {
    token: Vec<u8>,
    state: State,
}

impl SentinelScanner {
    pub fn new(token: &SentinelToken) -> Self {
        Self {
            token: token.as_bytes().to_vec(),
            state: State::Searching { window: Vec::new() },
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    /// Bytes withheld so far that turned out not to be a token.
    ///
    /// Used when the stream ends before the sentinel appears.
    pub fn take_pending(&mut self) -> Vec<u8> {
        match &mut self.state {
            State::Searching { window } => std::mem::take(window),
            State::AwaitingStatus { held, .. } => std::mem::take(held),
            State::Finished => Vec::new(),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Scan {
        match std::mem::replace(&mut self.state, State::Finished) {
            State::Searching { mut window } => {
                window.extend_from_slice(chunk);
                let search = window;
                match find(&search, &self.token) {
                    Some(at) => {
                        let held = search[..at].to_vec();
                        let status = search[at + self.token.len()..].to_vec();
                        self.finish_status(held, status)
                    }
                    None => {
                        let split = search.len() - partial_token_len(&search, &self.token);
                        let output = search[..split].to_vec();
                        self.state = State::Searching {
                            window: search[split..].to_vec(),
                        };
                        Scan::Output(output)
                    }
                }
            }
            State::AwaitingStatus { held, mut status } => {
                status.extend_from_slice(chunk);
                self.finish_status(held, status)
            }
            State::Finished => Scan::Output(chunk.to_vec()),
        }
    }

    fn finish_status(&mut self, held: Vec<u8>, status: Vec<u8>) -> Scan {
        match status.iter().position(|b| *b == b'\n') {
            Some(newline) => {
                self.state = State::Finished;
                Scan::Done {
                    output: held,
                    exit_code: parse_status(&status[..newline]),
                    trailing: status[newline + 1..].to_vec(),
                }
            }
            None => {
                self.state = State::AwaitingStatus { held, status };
                Scan::Output(Vec::new())
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Length of the longest suffix of `haystack` that is a proper prefix of `token`.
fn partial_token_len(haystack: &[u8], token: &[u8]) -> usize {
    let longest = token.len().saturating_sub(1).min(haystack.len());
    (1..=longest)
        .rev()
        .find(|&len| token.starts_with(&haystack[haystack.len() - len..]))
        .unwrap_or(0)
}

fn parse_status(raw: &[u8]) -> Option<i32> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}
