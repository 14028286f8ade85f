#![no_main]

use cordyceps_avl::model::CursorEquivalenceInput;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: CursorEquivalenceInput| {
    cordyceps_avl::model::run_cursor_equivalence(input.keys, input.ops);
});
