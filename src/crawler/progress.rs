use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

/// Human-readable status event for presentation layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    PageStarted { number: u32, max_pages: u32, url: String },
    ProfileStarted { name: String, url: String },
    ItemsFound { url: String, count: usize },
    RecordSaved { name: String, has_email: bool },
    ProtectionDetected { url: String, interactive: bool },
    ChallengeSolved { url: String },
    Warning { message: String },
    Finished { pages: u64, records: u64 },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageStarted {
                number,
                max_pages,
                url,
            } => write!(f, "Page {}/{}: {}", number, max_pages, url),
            Self::ProfileStarted { name, url } => write!(f, "Profile of {}: {}", name, url),
            Self::ItemsFound { url, count } => write!(f, "Found {} items on {}", count, url),
            Self::RecordSaved { name, has_email } => {
                if *has_email {
                    write!(f, "Saved {}", name)
                } else {
                    write!(f, "Saved {} (no email)", name)
                }
            }
            Self::ProtectionDetected { url, interactive } => {
                if *interactive {
                    write!(f, "Bot protection on {}; solve it in the browser window", url)
                } else {
                    write!(f, "Bot protection on {}", url)
                }
            }
            Self::ChallengeSolved { url } => write!(f, "Challenge solved on {}", url),
            Self::Warning { message } => write!(f, "Warning: {}", message),
            Self::Finished { pages, records } => {
                write!(f, "Finished: {} records from {} pages", records, pages)
            }
        }
    }
}

/// Optional sink for progress events
///
/// A dropped receiver is not an error; events are simply discarded.
#[derive(Debug, Clone, Default)]
pub(crate) struct Progress {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl Progress {
    pub(crate) fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
