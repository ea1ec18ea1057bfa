#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for the BCH(255,131,18) codec's round-trip and
//! noise-tolerance laws.

use decdid_core::bch::{Bch, K, T};
use proptest::prelude::*;

fn message_strategy() -> impl Strategy<Value = [u8; K]> {
    proptest::collection::vec(0u8..=1, K).prop_map(|bits| {
        let mut msg = [0u8; K];
        msg.copy_from_slice(&bits);
        msg
    })
}

proptest! {
    /// A clean codeword always decodes back to the message that produced it.
    #[test]
    fn decode_of_encode_is_identity(message in message_strategy()) {
        let bch = Bch::new();
        let codeword = bch.encode(&message);
        let decoded = bch.decode(&codeword).expect("clean codeword must decode");
        prop_assert_eq!(decoded, message);
    }

    /// Flipping up to `t` bits, at arbitrary positions, never prevents
    /// recovery of the original message.
    #[test]
    fn decode_tolerates_up_to_t_errors(
        message in message_strategy(),
        positions in proptest::collection::hash_set(0usize..255, 0..=T),
    ) {
        let bch = Bch::new();
        let mut codeword = bch.encode(&message);
        for p in positions {
            codeword[p] ^= 1;
        }
        let decoded = bch.decode(&codeword).expect("errors within budget must decode");
        prop_assert_eq!(decoded, message);
    }
}
