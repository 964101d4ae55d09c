#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = pillbox_config::load_toml(data) {
        let validated: eyre::Result<()> = cfg.validate();
        if validated.is_ok() {
            assert!(cfg.stability.required_stable_samples >= 1);
            assert!(cfg.runner.max_run_ms >= cfg.runner.connect_timeout_ms);
        }
    }
});
