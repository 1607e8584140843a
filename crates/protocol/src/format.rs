//! Display helpers shared by dashboard front-ends.

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Formats a byte count with two decimals in 1024-based units (`"1.50 KB"`).
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".into();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

// Linux/Android values from <asm-generic/fcntl.h>.
const O_ACCMODE: i32 = 0o3;
const NAMED_FLAGS: &[(i32, &str)] = &[
    (0o100, "O_CREAT"),
    (0o200, "O_EXCL"),
    (0o1000, "O_TRUNC"),
    (0o2000, "O_APPEND"),
    (0o4000, "O_NONBLOCK"),
    (0o200000, "O_DIRECTORY"),
    (0o2000000, "O_CLOEXEC"),
];

/// Renders `open(2)` flags as `O_WRONLY | O_CREAT | O_TRUNC`.
///
/// Bits without a known name are appended as one hex term.
pub fn open_flags(flags: i32) -> String {
    let mut parts = vec![match flags & O_ACCMODE {
        0 => "O_RDONLY".to_string(),
        1 => "O_WRONLY".to_string(),
        2 => "O_RDWR".to_string(),
        other => format!("0x{other:x}"),
    }];

    let mut rest = flags & !O_ACCMODE;
    for &(bit, name) in NAMED_FLAGS {
        if rest & bit != 0 {
            parts.push(name.to_string());
            rest &= !bit;
        }
    }
    if rest != 0 {
        parts.push(format!("0x{rest:x}"));
    }
    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_zero() {
        assert_eq!(format_bytes(0), "0 B");
    }

    #[test]
    fn bytes_units() {
        assert_eq!(format_bytes(96), "96.00 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn bytes_caps_at_gigabytes() {
        assert_eq!(format_bytes(2048 * 1024 * 1024 * 1024), "2048.00 GB");
    }

    #[test]
    fn flags_read_only() {
        assert_eq!(open_flags(0), "O_RDONLY");
    }

    #[test]
    fn flags_write_create_truncate() {
        assert_eq!(open_flags(0o1101), "O_WRONLY | O_CREAT | O_TRUNC");
    }

    #[test]
    fn flags_cloexec_and_unknown_bits() {
        assert_eq!(open_flags(0o2000002), "O_RDWR | O_CLOEXEC");
        assert_eq!(open_flags(0o40000000), "O_RDONLY | 0x800000");
    }
}
