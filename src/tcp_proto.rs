//! TCP Protocol Definitions
//!
//! Control flags and 32-bit sequence space arithmetic.

use core::fmt;

bitflags::bitflags! {
    /// TCP header flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TcpFlags: u8 {
        const FIN = 0x01;
        const SYN = 0x02;
        const RST = 0x04;
        const PSH = 0x08;
        const ACK = 0x10;
        const URG = 0x20;
    }
}

impl TcpFlags {
    pub fn is_syn(&self) -> bool {
        self.contains(TcpFlags::SYN)
    }

    pub fn is_ack(&self) -> bool {
        self.contains(TcpFlags::ACK)
    }

    pub fn is_fin(&self) -> bool {
        self.contains(TcpFlags::FIN)
    }

    pub fn is_rst(&self) -> bool {
        self.contains(TcpFlags::RST)
    }
}

impl fmt::Display for TcpFlags {
    /// Renders as `SYN|ACK`, or `NONE` for an empty set.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        for (i, (name, _)) in self.iter_names().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

/// Largest window representable in the header without scaling.
pub const TCP_MAX_WINDOW: u32 = 0xFFFF;

// Sequence numbers live in a circular 2^32 space: `a` precedes `b` when the
// signed distance from `b` to `a` is negative.

#[inline]
pub fn seq_lt(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

#[inline]
pub fn seq_le(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) <= 0
}

#[inline]
pub fn seq_gt(a: u32, b: u32) -> bool {
    seq_lt(b, a)
}

/// `lo <= x <= hi` in sequence space.
#[inline]
pub fn seq_between(lo: u32, x: u32, hi: u32) -> bool {
    seq_le(lo, x) && seq_le(x, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_display() {
        assert_eq!((TcpFlags::SYN | TcpFlags::ACK).to_string(), "SYN|ACK");
        assert_eq!((TcpFlags::FIN | TcpFlags::ACK).to_string(), "FIN|ACK");
        assert_eq!(TcpFlags::empty().to_string(), "NONE");
    }

    #[test]
    fn test_exact_flag_equality() {
        let flags = TcpFlags::SYN | TcpFlags::ACK | TcpFlags::PSH;
        assert!(flags.is_syn() && flags.is_ack());
        assert_ne!(flags, TcpFlags::SYN | TcpFlags::ACK);
    }

    #[test]
    fn test_seq_compare_across_wrap() {
        assert!(seq_lt(0xFFFF_FFF0, 0x10));
        assert!(seq_gt(0x10, 0xFFFF_FFF0));
        assert!(seq_le(5, 5));
        assert!(!seq_lt(5, 5));
        assert!(seq_between(0xFFFF_FFFE, 1, 3));
        assert!(!seq_between(10, 9, 20));
    }
}
