#![no_main]

use libfuzzer_sys::fuzz_target;
use pezap::pdb::PdbHeaderStream;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut header) = PdbHeaderStream::parse(data) {
        header.age = 1;
        let mut stream = data.to_vec();
        if header.write(&mut stream).is_ok() {
            assert_eq!(PdbHeaderStream::parse(&stream).ok(), Some(header));
            assert_eq!(stream[PdbHeaderStream::SIZE..], data[PdbHeaderStream::SIZE..]);
        }
    }
});
