#![no_main]

use libfuzzer_sys::fuzz_target;
use lifecycle_core::operate_log::{parse_state_transition, prior_state, OperateLog};

fuzz_target!(|data: &[u8]| {
    let content = String::from_utf8_lossy(data);

    match parse_state_transition(&content) {
        Ok(transition) => {
            assert!(!transition.prior_state.is_empty());
            assert!(!transition.new_state.is_empty());
            assert!(!transition.prior_state.chars().any(char::is_whitespace));
            let logs = [OperateLog {
                content: content.to_string(),
                ..OperateLog::default()
            }];
            assert_eq!(prior_state(&logs).ok(), Some(transition.prior_state));
        }
        Err(_) => {
            assert!(content.split_whitespace().count() < 2);
        }
    }
});
