//! Sandbox identifier generation.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Number of random base-36 characters appended to the timestamp.
const RANDOM_CHARS: usize = 8;

/// Generates an identifier from the current time in milliseconds and random bits,
/// both base-36 encoded.
///
/// Uniqueness is probabilistic; [`Sandbox::create`](crate::Sandbox::create)
/// detects collisions on disk and retries.
pub fn generate_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let mut id = to_base36(millis);
    let mut rng = rand::thread_rng();
    for _ in 0..RANDOM_CHARS {
        id.push(BASE36[rng.gen_range(0..BASE36.len())] as char);
    }
    id
}

fn to_base36(mut n: u128) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
