#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(model) = streach_model::Model::parse(s) {
            let values: Vec<String> = model.vars().iter().map(|_| "0.5".to_string()).collect();
            let _ = model.instantiate(&values);
        }
    }
});
