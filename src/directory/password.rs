use rand::Rng;

const CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_+~`|}{[]:;?><,./-=";
const MIN_LEN: usize = 8;
const MAX_LEN: usize = 12;

/// Draws a throwaway password of 8 to 12 characters from a mixed
/// alphanumeric + symbol charset. Pure over the supplied generator so tests
/// can seed it; production callers pass `OsRng`.
pub fn generate_password<R: Rng>(rng: &mut R) -> String {
    let length = rng.gen_range(MIN_LEN..=MAX_LEN);
    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn length_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let password = generate_password(&mut rng);
            assert!((MIN_LEN..=MAX_LEN).contains(&password.len()), "{password}");
        }
    }

    #[test]
    fn only_charset_characters() {
        let mut rng = StdRng::seed_from_u64(42);
        let password = generate_password(&mut rng);
        for ch in password.bytes() {
            assert!(CHARSET.contains(&ch));
        }
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let a = generate_password(&mut StdRng::seed_from_u64(99));
        let b = generate_password(&mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }
}
