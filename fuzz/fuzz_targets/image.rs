#![no_main]

use libfuzzer_sys::fuzz_target;
use pezap::{Image, PatchOptions, Patcher};

fuzz_target!(|data: &[u8]| {
    if let Ok(mut image) = Image::from_mem(data.to_vec()) {
        let _ = Patcher::new(PatchOptions::default()).run_on_image(&mut image, None);
    }
});
