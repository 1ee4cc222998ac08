//! Credential gate: decides whether API calls are currently authorized.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Host-side key selection (e.g. a key picker in the embedding app).
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn has_selected_key(&self) -> bool;

    /// Run the host's key selection flow. May be a no-op.
    async fn open_key_selector(&self);

    /// Key chosen through the host flow, if it hands one over.
    fn selected_key(&self) -> Option<String> {
        None
    }
}

/// Normalize an environment-supplied key.
///
/// Empty, whitespace-only and the literal `undefined` (what bundlers emit
/// for an unset variable) all count as no key.
pub fn usable_key(raw: Option<&str>) -> Option<String> {
    let key = raw?.trim();
    if key.is_empty() || key == "undefined" {
        return None;
    }
    Some(key.to_string())
}

pub struct CredentialGate {
    env_key: Option<String>,
    provider: Option<Arc<dyn KeyProvider>>,
    satisfied: AtomicBool,
}

impl CredentialGate {
    pub fn new(env_key: Option<&str>, provider: Option<Arc<dyn KeyProvider>>) -> Self {
        let env_key = usable_key(env_key);
        let satisfied = AtomicBool::new(env_key.is_some());
        Self {
            env_key,
            provider,
            satisfied,
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Re-derive availability from the host provider and the env key.
    pub async fn check_availability(&self) -> bool {
        let selected = match &self.provider {
            Some(provider) => provider.has_selected_key().await,
            None => false,
        };
        let available = selected || self.env_key.is_some();
        self.satisfied.store(available, Ordering::SeqCst);
        available
    }

    /// Run the host key flow and optimistically treat the gate as open.
    pub async fn request_credential(&self) {
        if self.recover().await {
            self.satisfied.store(true, Ordering::SeqCst);
            info!("🔑 Key selector closed, gate reopened");
        }
    }

    /// Open the host key flow without touching the gate state.
    /// Returns false when there is no host flow.
    pub async fn recover(&self) -> bool {
        match &self.provider {
            Some(provider) => {
                provider.open_key_selector().await;
                true
            }
            None => {
                warn!("No key selector available; set GEMINI_API_KEY or api_key in config");
                false
            }
        }
    }

    pub fn mark_unsatisfied(&self) {
        self.satisfied.store(false, Ordering::SeqCst);
    }

    pub fn is_satisfied(&self) -> bool {
        self.satisfied.load(Ordering::SeqCst)
    }

    /// Key to send with the next call. The host-selected key wins.
    pub fn current_key(&self) -> Option<String> {
        self.provider
            .as_ref()
            .and_then(|p| usable_key(p.selected_key().as_deref()))
            .or_else(|| self.env_key.clone())
    }
}

/// Line-oriented terminal input shared by everything that reads from it.
///
/// A session must read stdin through one of these only; a second buffered
/// reader would swallow lines meant for the first.
pub struct LineSource {
    lines: Mutex<Lines<Box<dyn AsyncBufRead + Send + Unpin>>>,
}

impl LineSource {
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }

    pub fn from_reader<R: AsyncBufRead + Send + Unpin + 'static>(reader: R) -> Self {
        let boxed: Box<dyn AsyncBufRead + Send + Unpin> = Box::new(reader);
        Self {
            lines: Mutex::new(boxed.lines()),
        }
    }

    /// Next line without its terminator, `None` at end of input.
    pub async fn next_line(&self) -> std::io::Result<Option<String>> {
        self.lines.lock().await.next_line().await
    }
}

/// Terminal key picker: asks for a key on the session's input.
pub struct PromptKeySelector {
    input: Arc<LineSource>,
    key: RwLock<Option<String>>,
}

impl PromptKeySelector {
    pub fn new(input: Arc<LineSource>) -> Self {
        Self {
            input,
            key: RwLock::new(None),
        }
    }

    fn store(&self, key: Option<String>) {
        *self.key.write().expect("key lock poisoned") = key;
    }
}

#[async_trait]
impl KeyProvider for PromptKeySelector {
    async fn has_selected_key(&self) -> bool {
        self.selected_key().is_some()
    }

    async fn open_key_selector(&self) {
        let mut stdout = tokio::io::stdout();
        if stdout.write_all(b"Gemini API key: ").await.is_err() || stdout.flush().await.is_err() {
            return;
        }
        match self.input.next_line().await {
            Ok(Some(line)) => match usable_key(Some(&line)) {
                Some(key) => {
                    self.store(Some(key));
                    info!("🔑 Key entered");
                }
                None => warn!("Empty key entered, keeping the previous one"),
            },
            Ok(None) => warn!("Input closed before a key was entered"),
            Err(e) => warn!("Failed to read key: {e}"),
        }
    }

    fn selected_key(&self) -> Option<String> {
        self.key.read().expect("key lock poisoned").clone()
    }
}
