//! Fuzz target for the roster, chat and avatar engine
//!
//! Differential: every operation is applied to the reference model and to
//! the real `Client`, and their observable states must agree.
//!
//! # Invariants
//!
//! - Model and engine return the same result for every operation
//! - Model and engine expose the same session, roster order, transcripts
//!   and avatar download count after every operation
//! - Adjacent peers in the display order are strictly ordered
//! - Avatar downloads started never fall behind those in flight
//! - NEVER panic on arbitrary callback sequences

#![no_main]

use std::cmp::Ordering;

use libfuzzer_sys::fuzz_target;
use parlor_core::roster::compare_peers;
use parlor_harness::{ModelWorld, Operation, RealWorld};

fuzz_target!(|ops: Vec<Operation>| {
    let mut model = ModelWorld::new();
    let mut real = RealWorld::new();

    for op in &ops {
        let model_result = model.apply(op);
        let real_result = real.apply(op);
        assert_eq!(model_result, real_result, "result divergence on {op:?}");

        let model_state = model.observable_state();
        let real_state = real.observable_state();
        assert_eq!(model_state, real_state, "state divergence after {op:?}");

        let peers: Vec<_> = real.client().ordered_peers().collect();
        for pair in peers.windows(2) {
            assert_eq!(compare_peers(pair[0], pair[1]), Ordering::Less);
        }

        assert!(real.client().avatars().in_flight() <= real_state.avatar_fetches);
    }
});
