//! MiMC sponge over BN254
//!
//! Must stay bit-identical to the hash in the Shade circuits; a single
//! differing constant makes every commitment unprovable.
//!
//! ```text
//! permute(x, k) = round_90(...round_0(x)) + k,   round_i(s) = (s + k + c_i)^7
//! c_i           = (i+1)^3 + (i+1)
//! hash(x_1..x_n) : s = 0; for v in [n, x_1, .., x_n] { s = permute(s + v, 0) }
//! ```

use ark_bn254::Fr;

const ROUNDS: u32 = 91;

fn constant(round: u32) -> Fr {
    let n = Fr::from(u64::from(round) + 1);
    n * n * n + n
}

fn pow7(t: Fr) -> Fr {
    let t2 = t * t;
    let t3 = t2 * t;
    t3 * t3 * t
}

fn permute(mut state: Fr, key: Fr) -> Fr {
    for round in 0..ROUNDS {
        state = pow7(state + key + constant(round));
    }
    state + key
}

/// Hash a non-empty sequence; the arity is absorbed first as a domain tag
pub(crate) fn hash_n(inputs: &[Fr]) -> Fr {
    let arity = Fr::from(inputs.len() as u64);
    std::iter::once(arity)
        .chain(inputs.iter().copied())
        .fold(Fr::from(0u64), |state, v| permute(state + v, Fr::from(0u64)))
}

pub(crate) fn hash_2(left: Fr, right: Fr) -> Fr {
    hash_n(&[left, right])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        let expected = [2u64, 10, 30, 68, 130];
        for (round, c) in expected.into_iter().enumerate() {
            assert_eq!(constant(round as u32), Fr::from(c));
        }
    }

    #[test]
    fn test_pow7() {
        assert_eq!(pow7(Fr::from(3u64)), Fr::from(2187u64));
        assert_eq!(pow7(Fr::from(0u64)), Fr::from(0u64));
    }

    #[test]
    fn test_single_round_of_permute() {
        // With key 0 the first round is (x + 2)^7
        let x = Fr::from(4u64);
        assert_eq!(pow7(x + constant(0)), Fr::from(279936u64));
    }

    #[test]
    fn test_pair_is_ordered() {
        let (a, b) = (Fr::from(7u64), Fr::from(11u64));
        assert_eq!(hash_2(a, b), hash_2(a, b));
        assert_ne!(hash_2(a, b), hash_2(b, a));
    }

    #[test]
    fn test_trailing_zero_changes_hash() {
        let (a, b) = (Fr::from(100u64), Fr::from(200u64));
        assert_ne!(hash_n(&[a, b]), hash_n(&[a, b, Fr::from(0u64)]));
        assert_ne!(hash_n(&[a]), hash_n(&[a, Fr::from(0u64)]));
    }
}
