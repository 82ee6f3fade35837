use std::fmt;

pub const FAILED_PREFIX: &str = "FAILED_";

/// Where a movie job stands. Persisted as `PENDING`, `PROCEEDING[c/t]`,
/// `ORGANIZING` or `COMPLETE`, optionally behind a single `FAILED_` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Proceeding { current: u32, total: u32 },
    Organizing,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStatus {
    pub stage: Stage,
    pub failed: bool,
}

impl Stage {
    pub fn encode(&self) -> String {
        match self {
            Stage::Pending => "PENDING".to_string(),
            Stage::Proceeding { current, total } => format!("PROCEEDING[{}/{}]", current, total),
            Stage::Organizing => "ORGANIZING".to_string(),
            Stage::Complete => "COMPLETE".to_string(),
        }
    }

    /// Parses a canonical stage string. Does not accept the failure prefix.
    pub fn parse(raw: &str) -> Option<Stage> {
        match raw {
            "PENDING" => Some(Stage::Pending),
            "ORGANIZING" => Some(Stage::Organizing),
            "COMPLETE" => Some(Stage::Complete),
            _ => {
                let inner = raw.strip_prefix("PROCEEDING[")?.strip_suffix(']')?;
                let (current, total) = inner.split_once('/')?;
                if !is_digits(current) || !is_digits(total) {
                    return None;
                }
                let current: u32 = current.parse().ok()?;
                let total: u32 = total.parse().ok()?;
                if current > total {
                    return None;
                }
                Some(Stage::Proceeding { current, total })
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Proceeding { .. } => "proceeding",
            Stage::Organizing => "organizing",
            Stage::Complete => "complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl JobStatus {
    pub fn new(stage: Stage) -> Self {
        JobStatus { stage, failed: false }
    }

    pub fn encode(&self) -> String {
        if self.failed {
            format!("{}{}", FAILED_PREFIX, self.stage.encode())
        } else {
            self.stage.encode()
        }
    }

    /// Strips at most one `FAILED_` prefix and parses the rest.
    /// Returns `None` for anything outside the grammar; callers treat that as
    /// a fresh start.
    pub fn decode(raw: &str) -> Option<JobStatus> {
        let raw = raw.trim();
        match raw.strip_prefix(FAILED_PREFIX) {
            Some(rest) => Stage::parse(rest).map(|stage| JobStatus { stage, failed: true }),
            None => Stage::parse(raw).map(JobStatus::new),
        }
    }
}

/// Applies the failure prefix to a raw persisted status, never twice.
pub fn mark_failed(raw: &str) -> String {
    if raw.starts_with(FAILED_PREFIX) {
        raw.to_string()
    } else {
        format!("{}{}", FAILED_PREFIX, raw)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
