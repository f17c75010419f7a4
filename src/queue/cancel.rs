use super::job::OwnerId;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct Armed {
    /// 0 for tokens created on demand, otherwise the `arm` call that installed it
    generation: u64,
    token: CancellationToken,
}

/// Owner-scoped cancellation requests.
///
/// Each owner maps to a [`CancellationToken`]. The worker hands the token to
/// the engine, which reacts at its next suspension point; a request therefore
/// takes effect within one progress read (bounded by the stall timeout).
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: DashMap<OwnerId, Armed>,
    generations: AtomicU64,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token the owner's running job should watch
    pub fn token(&self, owner: OwnerId) -> CancellationToken {
        self.tokens.entry(owner).or_default().token.clone()
    }

    /// Install a fresh token for the owner's next job, discarding any stale request.
    /// Returns the generation to pass to [`Self::disarm`] along with the token.
    pub fn arm(&self, owner: OwnerId) -> (u64, CancellationToken) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        self.tokens.insert(
            owner,
            Armed {
                generation,
                token: token.clone(),
            },
        );
        (generation, token)
    }

    /// Remove the owner's entry if it is still the one installed by `generation`
    pub fn disarm(&self, owner: OwnerId, generation: u64) {
        self.tokens.remove_if(&owner, |_, armed| armed.generation == generation);
    }

    pub fn request_cancel(&self, owner: OwnerId) {
        self.token(owner).cancel();
    }

    pub fn should_cancel(&self, owner: OwnerId) -> bool {
        self.tokens
            .get(&owner)
            .map(|armed| armed.token.is_cancelled())
            .unwrap_or(false)
    }

    /// Forget the owner's request so it cannot leak into a later job
    pub fn clear_cancel(&self, owner: OwnerId) {
        self.tokens.remove(&owner);
    }
}
