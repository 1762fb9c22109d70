use libdfs::DfsPath;

pub fn p(s: &str) -> DfsPath {
    DfsPath::new(s).unwrap()
}

/// Patterned payload so misplaced or stale bytes show up as mismatches.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
