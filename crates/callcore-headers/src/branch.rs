use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic counter seeded at first use, standing in for a
/// high-resolution monotonic clock; combined with a random suffix so
/// concurrent callers on the same tick still get distinct branches.
static COUNTER: AtomicU64 = AtomicU64::new(0);

fn process_epoch() -> &'static Instant {
    use std::sync::OnceLock;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now)
}

/// Generate a fresh `z9hG4bK`-prefixed Via branch token.
///
/// Used whenever the B2BUA re-originates a request onto the opposite
/// leg — each forwarded request gets its own branch, never the
/// inbound request's, per RFC 3261 Section 16.6.
pub fn generate_branch() -> String {
    let elapsed_nanos = process_epoch().elapsed().as_nanos();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let rand_suffix: u32 = rand::thread_rng().gen();
    format!("z9hG4bK{elapsed_nanos:x}{seq:x}{rand_suffix:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn has_required_prefix() {
        assert!(generate_branch().starts_with("z9hG4bK"));
    }

    #[test]
    fn successive_calls_are_unique() {
        let branches: HashSet<String> = (0..1000).map(|_| generate_branch()).collect();
        assert_eq!(branches.len(), 1000);
    }
}
