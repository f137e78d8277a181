#![no_main]

use libfuzzer_sys::fuzz_target;
use rollcall_core::{read_accounts, write_accounts};

fuzz_target!(|data: &[u8]| {
    // Parsing arbitrary input must never panic
    let Ok(accounts) = read_accounts(data) else {
        return;
    };

    // Anything that parses must survive a rewrite
    let mut buf = Vec::new();
    write_accounts(&mut buf, &accounts).expect("writing to a Vec cannot fail");
    let reparsed = read_accounts(buf.as_slice()).expect("rewritten data must parse");
    assert_eq!(accounts, reparsed);
});
