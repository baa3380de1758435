//! # MFA recovery codes
//!
//! Generated client-side once a TOTP factor is verified and shown to the user
//! exactly once. Codes are `XXXX-XXXX` over an alphabet without look-alike
//! characters (no `0/O`, `1/I/L`).

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const GROUP_LEN: usize = 4;

/// Generate `count` distinct recovery codes.
pub fn generate_recovery_codes<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<String> {
    let mut codes: Vec<String> = Vec::with_capacity(count);
    while codes.len() < count {
        let code = format!("{}-{}", group(rng), group(rng));
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

fn group<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..GROUP_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
