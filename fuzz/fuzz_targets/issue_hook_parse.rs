#![no_main]

use libfuzzer_sys::fuzz_target;
use lifecycle_core::issue_event::parse_issue_hook;

fuzz_target!(|data: &[u8]| {
    if let Ok(event) = parse_issue_hook(data) {
        assert!(!event.org.trim().is_empty());
        assert!(!event.repo.trim().is_empty());
        assert!(!event.issue_number.trim().is_empty());
        assert!(!event.actor_login.trim().is_empty());
    }
});
