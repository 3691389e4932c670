//! Serial device resolution.
//!
//! Boards with an ST-LINK or similar debug probe expose their console as a
//! USB CDC-ACM or USB-serial node. Without an explicit device, the first
//! existing node from a fixed, ordered list of conventional names is used.

/// Conventional console device nodes, in preference order.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "/dev/ttyACM0",
    "/dev/ttyACM1",
    "/dev/ttyUSB0",
    "/dev/ttyUSB1",
];

/// First candidate for which `exists` holds.
pub fn first_existing<S, F>(candidates: &[S], exists: F) -> Option<String>
where
    S: AsRef<str>,
    F: Fn(&str) -> bool,
{
    candidates
        .iter()
        .map(AsRef::as_ref)
        .find(|path| exists(path))
        .map(str::to_string)
}

/// Resolve the console device.
///
/// An explicit device is used as given; opening it is what reports a missing
/// node. Otherwise the first existing candidate wins.
pub fn resolve_device<S, F>(explicit: Option<&str>, candidates: &[S], exists: F) -> Option<String>
where
    S: AsRef<str>,
    F: Fn(&str) -> bool,
{
    match explicit {
        Some(path) if !path.trim().is_empty() => Some(path.to_string()),
        _ => first_existing(candidates, exists),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn present(paths: &'static [&'static str]) -> impl Fn(&str) -> bool {
        move |p| paths.contains(&p)
    }

    #[test]
    fn test_first_existing_respects_order() {
        assert_eq!(
            first_existing(DEFAULT_CANDIDATES, present(&["/dev/ttyUSB0", "/dev/ttyACM1"])),
            Some("/dev/ttyACM1".to_string())
        );
        assert_eq!(
            first_existing(DEFAULT_CANDIDATES, present(&["/dev/ttyUSB1"])),
            Some("/dev/ttyUSB1".to_string())
        );
        assert_eq!(
            first_existing(
                DEFAULT_CANDIDATES,
                present(&["/dev/ttyACM0", "/dev/ttyACM1", "/dev/ttyUSB0", "/dev/ttyUSB1"])
            ),
            Some("/dev/ttyACM0".to_string())
        );
    }

    #[test]
    fn test_no_candidate_exists() {
        assert_eq!(first_existing(DEFAULT_CANDIDATES, present(&[])), None);
        assert_eq!(first_existing(DEFAULT_CANDIDATES, present(&["/dev/ttyS0"])), None);
    }

    #[test]
    fn test_every_single_candidate_is_found() {
        for candidate in DEFAULT_CANDIDATES {
            let found = first_existing(DEFAULT_CANDIDATES, |p| p == *candidate);
            assert_eq!(found.as_deref(), Some(*candidate));
        }
    }

    #[test]
    fn test_explicit_device_wins() {
        assert_eq!(
            resolve_device(Some("/dev/ttyS3"), DEFAULT_CANDIDATES, present(&["/dev/ttyACM0"])),
            Some("/dev/ttyS3".to_string())
        );
        assert_eq!(
            resolve_device(Some("  "), DEFAULT_CANDIDATES, present(&["/dev/ttyACM0"])),
            Some("/dev/ttyACM0".to_string())
        );
        assert_eq!(resolve_device(None, DEFAULT_CANDIDATES, present(&[])), None);
    }
}
