mod id;

pub use id::*;

use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Returns a random alphanumeric string, used for session tokens and client message ids.
pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}
