#![no_main]

use histaug::summary::summarize_run;
use histaug::tracking::TrackedRun;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any run that decodes must summarise to a record or a field error, never panic
    if let Ok(run) = serde_json::from_slice::<TrackedRun>(data) {
        let _ = summarize_run(&run);
    }
});
