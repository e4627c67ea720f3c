//! Initialization Gate
//!
//! One-shot, process-wide policy state. The first intercepted call loads the
//! policy; every later call, on any thread, sees the same outcome.
//!
//! ```text
//!   (empty) ──first ensure()──► loader ──► Active(Policy)
//!                                      └─► Inactive      (no config,
//!                                                         unreadable,
//!                                                         empty section)
//! ```
//!
//! There is no way back: a process that wants another policy restarts.
//! Concurrent first callers block on the same `OnceLock` and the loader runs
//! exactly once.

use std::fmt;
use std::sync::OnceLock;

use tracing::debug;

use crate::config::Settings;
use crate::logging;
use crate::policy::Policy;

/// Terminal policy state
#[derive(Debug)]
pub enum PolicyState {
    /// A non-empty policy is enforced
    Active(Policy),
    /// Nothing is filtered
    Inactive,
}

impl PolicyState {
    /// Load the policy named by `settings`, mapping any failure to `Inactive`.
    pub fn load(settings: &Settings) -> Self {
        match Policy::load(settings) {
            Ok(policy) => {
                policy.log_summary();
                PolicyState::Active(policy)
            }
            Err(e) => {
                debug!("{}", e);
                PolicyState::Inactive
            }
        }
    }

    pub fn policy(&self) -> Option<&Policy> {
        match self {
            PolicyState::Active(policy) => Some(policy),
            PolicyState::Inactive => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.policy().is_some()
    }
}

type Loader = Box<dyn Fn() -> PolicyState + Send + Sync>;

/// Lazily initialized [`PolicyState`]
pub struct Gate {
    state: OnceLock<PolicyState>,
    loader: Loader,
}

impl Gate {
    /// A gate that runs `loader` on first use
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> PolicyState + Send + Sync + 'static,
    {
        Self {
            state: OnceLock::new(),
            loader: Box::new(loader),
        }
    }

    /// The production gate: settings from the environment, logging enabled
    /// when requested, policy from the configured file.
    pub fn from_env() -> Self {
        Self::new(|| {
            let settings = Settings::from_env();
            if settings.debug {
                logging::init();
            }
            PolicyState::load(&settings)
        })
    }

    /// A gate that is already settled
    pub fn settled(state: PolicyState) -> Self {
        let gate = Self::new(|| PolicyState::Inactive);
        let _ = gate.state.set(state);
        gate
    }

    /// Initialize if needed and return the terminal state
    pub fn ensure(&self) -> &PolicyState {
        self.state.get_or_init(|| (self.loader)())
    }

    /// The active policy, if any
    pub fn policy(&self) -> Option<&Policy> {
        self.ensure().policy()
    }

    /// The state without triggering initialization
    pub fn peek(&self) -> Option<&PolicyState> {
        self.state.get()
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate").field("state", &self.state.get()).finish()
    }
}
