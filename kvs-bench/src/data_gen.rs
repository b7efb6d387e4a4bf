//! Data generators for benchmarks

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Typical structured value stored by the benchmarks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: u8,
    pub score: f64,
    pub active: bool,
    pub tags: Vec<String>,
}

fn random_word<R: Rng>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a single profile with a fixed id
pub fn generate_single_profile(id: usize) -> Profile {
    let mut rng = rand::thread_rng();
    let name = random_word(&mut rng, 12);
    Profile {
        id: id as i64,
        email: format!("{}@example.com", name.to_lowercase()),
        name,
        age: rng.gen_range(18..80),
        score: rng.gen_range(0.0..100.0),
        active: rng.gen_bool(0.8),
        tags: (0..rng.gen_range(1..5))
            .map(|_| random_word(&mut rng, 6))
            .collect(),
    }
}

/// Generate profiles keyed by `(index, "profile")` tuples
pub fn generate_profiles(count: usize) -> Vec<((usize, &'static str), Profile)> {
    (0..count)
        .map(|i| ((i, "profile"), generate_single_profile(i)))
        .collect()
}

/// Generate a text blob of roughly `len` bytes
pub fn generate_blob(len: usize) -> String {
    random_word(&mut rand::thread_rng(), len)
}
