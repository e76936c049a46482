use std::num::NonZeroU8;
use std::{fmt, ops};

/// Interest used in registering a descriptor with a [`Bridge`].
///
/// Interest indicates what readiness should be monitored for. For example if a
/// socket is registered with [readable] interest and the socket becomes
/// writable, no callback is delivered.
///
/// The bit values are the mid-layer `POLL*` values, see [`Interest::to_mid`].
///
/// The size of `Option<Interest>` should be identical to itself.
///
/// ```
/// use std::mem::size_of;
/// use midsock::Interest;
///
/// assert_eq!(size_of::<Option<Interest>>(), size_of::<Interest>());
/// ```
///
/// [`Bridge`]: crate::Bridge
/// [readable]: Interest::READABLE
#[derive(Copy, PartialEq, Eq, Clone, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Interest(NonZeroU8);

// Mid-layer poll bits, these must be unique.
const READABLE: u8 = 0x01;
const PRIORITY: u8 = 0x02;
const WRITABLE: u8 = 0x04;
const ERROR: u8 = 0x08;
const HUP: u8 = 0x10;
const INVALID: u8 = 0x20;

const INTEREST_MASK: u8 = READABLE | PRIORITY | WRITABLE;

impl Interest {
    /// Returns a `Interest` set representing readable interest (`POLLIN`).
    pub const READABLE: Interest = Interest(unsafe { NonZeroU8::new_unchecked(READABLE) });

    /// Returns a `Interest` set representing priority interest (`POLLPRI`).
    pub const PRIORITY: Interest = Interest(unsafe { NonZeroU8::new_unchecked(PRIORITY) });

    /// Returns a `Interest` set representing writable interest (`POLLOUT`).
    pub const WRITABLE: Interest = Interest(unsafe { NonZeroU8::new_unchecked(WRITABLE) });

    /// Add together two `Interest`.
    ///
    /// This does the same thing as the `BitOr` implementation, but is a
    /// constant function.
    ///
    /// ```
    /// use midsock::Interest;
    ///
    /// const INTERESTS: Interest = Interest::READABLE.add(Interest::WRITABLE);
    /// # fn silent_dead_code_warning(_: Interest) { }
    /// # silent_dead_code_warning(INTERESTS)
    /// ```
    #[allow(clippy::should_implement_trait)]
    #[must_use = "this returns the result of the operation, without modifying the original"]
    pub const fn add(self, other: Interest) -> Interest {
        Interest(unsafe { NonZeroU8::new_unchecked(self.0.get() | other.0.get()) })
    }

    /// Removes `other` `Interest` from `self`.
    ///
    /// Returns `None` if the set would be empty after removing `other`.
    ///
    /// ```
    /// use midsock::Interest;
    ///
    /// const RW_INTERESTS: Interest = Interest::READABLE.add(Interest::WRITABLE);
    ///
    /// // As long a one interest remain this will return `Some`.
    /// let w_interest = RW_INTERESTS.remove(Interest::READABLE).unwrap();
    /// assert!(!w_interest.is_readable());
    /// assert!(w_interest.is_writable());
    ///
    /// // Removing all interests from the set will return `None`.
    /// assert_eq!(w_interest.remove(Interest::WRITABLE), None);
    /// ```
    #[must_use = "this returns the result of the operation, without modifying the original"]
    pub fn remove(self, other: Interest) -> Option<Interest> {
        NonZeroU8::new(self.0.get() & !other.0.get()).map(Interest)
    }

    /// Returns true if the value includes readable readiness.
    pub const fn is_readable(self) -> bool {
        (self.0.get() & READABLE) != 0
    }

    /// Returns true if the value includes priority readiness.
    pub const fn is_priority(self) -> bool {
        (self.0.get() & PRIORITY) != 0
    }

    /// Returns true if the value includes writable readiness.
    pub const fn is_writable(self) -> bool {
        (self.0.get() & WRITABLE) != 0
    }

    /// Returns the mid-layer poll bits.
    pub const fn to_mid(self) -> u16 {
        self.0.get() as u16
    }

    /// Parses mid-layer poll bits.
    ///
    /// Bits that can't be requested, such as `POLLERR`, are ignored. Returns
    /// `None` if no interest remains.
    pub fn from_mid(bits: u16) -> Option<Interest> {
        NonZeroU8::new((bits as u8) & INTEREST_MASK).map(Interest)
    }
}

impl ops::BitOr for Interest {
    type Output = Self;

    #[inline]
    fn bitor(self, other: Self) -> Self {
        self.add(other)
    }
}

impl ops::BitOrAssign for Interest {
    #[inline]
    fn bitor_assign(&mut self, other: Self) {
        self.0 = (*self | other).0;
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_bits(fmt, self.0.get())
    }
}

/// Readiness observed by the host, delivered in an [`Event`].
///
/// Next to the [`Interest`] bits this can report conditions that are always
/// monitored: an error, a hang-up and an invalid descriptor.
///
/// [`Event`]: crate::Event
#[derive(Copy, PartialEq, Eq, Clone, Hash, Default)]
#[repr(transparent)]
pub struct Readiness(u8);

impl Readiness {
    pub const READABLE: Readiness = Readiness(READABLE);
    pub const PRIORITY: Readiness = Readiness(PRIORITY);
    pub const WRITABLE: Readiness = Readiness(WRITABLE);
    /// Error condition (`POLLERR`).
    pub const ERROR: Readiness = Readiness(ERROR);
    /// Hang-up (`POLLHUP`).
    pub const HUP: Readiness = Readiness(HUP);
    /// The descriptor isn't open (`POLLNVAL`).
    pub const INVALID: Readiness = Readiness(INVALID);

    pub const fn empty() -> Readiness {
        Readiness(0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if all bits in `other` are set.
    pub const fn contains(self, other: Readiness) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_readable(self) -> bool {
        self.contains(Readiness::READABLE)
    }

    pub const fn is_priority(self) -> bool {
        self.contains(Readiness::PRIORITY)
    }

    pub const fn is_writable(self) -> bool {
        self.contains(Readiness::WRITABLE)
    }

    pub const fn is_error(self) -> bool {
        self.contains(Readiness::ERROR)
    }

    pub const fn is_hup(self) -> bool {
        self.contains(Readiness::HUP)
    }

    pub const fn is_invalid(self) -> bool {
        self.contains(Readiness::INVALID)
    }

    /// Returns the mid-layer poll bits.
    pub const fn to_mid(self) -> u16 {
        self.0 as u16
    }

    /// Parses mid-layer poll bits, unknown bits are dropped.
    pub const fn from_mid(bits: u16) -> Readiness {
        Readiness(
            (bits as u8) & (READABLE | PRIORITY | WRITABLE | ERROR | HUP | INVALID),
        )
    }
}

impl From<Interest> for Readiness {
    fn from(interest: Interest) -> Readiness {
        Readiness(interest.0.get())
    }
}

impl ops::BitOr for Readiness {
    type Output = Self;

    #[inline]
    fn bitor(self, other: Self) -> Self {
        Readiness(self.0 | other.0)
    }
}

impl ops::BitOrAssign for Readiness {
    #[inline]
    fn bitor_assign(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(fmt, "(empty)");
        }
        fmt_bits(fmt, self.0)
    }
}

fn fmt_bits(fmt: &mut fmt::Formatter<'_>, bits: u8) -> fmt::Result {
    const NAMES: [(u8, &str); 6] = [
        (READABLE, "READABLE"),
        (PRIORITY, "PRIORITY"),
        (WRITABLE, "WRITABLE"),
        (ERROR, "ERROR"),
        (HUP, "HUP"),
        (INVALID, "INVALID"),
    ];
    let mut one = false;
    for (bit, name) in NAMES {
        if bits & bit != 0 {
            if one {
                write!(fmt, " | ")?
            }
            write!(fmt, "{}", name)?;
            one = true
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Interest, Readiness};

    #[test]
    fn mid_bits() {
        assert_eq!(Interest::READABLE.to_mid(), 0x1);
        assert_eq!(Interest::PRIORITY.to_mid(), 0x2);
        assert_eq!(Interest::WRITABLE.to_mid(), 0x4);
        assert_eq!(Readiness::ERROR.to_mid(), 0x8);
        assert_eq!(Readiness::HUP.to_mid(), 0x10);
        assert_eq!(Readiness::INVALID.to_mid(), 0x20);
    }

    #[test]
    fn from_mid() {
        assert_eq!(
            Interest::from_mid(0x5),
            Some(Interest::READABLE | Interest::WRITABLE)
        );
        // Error bits can't be requested.
        assert_eq!(Interest::from_mid(0x8), None);
        assert_eq!(Interest::from_mid(0x9), Some(Interest::READABLE));
        assert_eq!(Readiness::from_mid(0x40 | 0x10), Readiness::HUP);
    }

    #[test]
    fn fmt_debug() {
        assert_eq!(format!("{:?}", Interest::READABLE), "READABLE");
        assert_eq!(
            format!("{:?}", Interest::READABLE | Interest::WRITABLE),
            "READABLE | WRITABLE"
        );
        assert_eq!(
            format!("{:?}", Readiness::WRITABLE | Readiness::HUP),
            "WRITABLE | HUP"
        );
        assert_eq!(format!("{:?}", Readiness::empty()), "(empty)");
    }
}
