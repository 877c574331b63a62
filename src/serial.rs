//! Serial number allocation for issued certificates.

use std::collections::BTreeSet;
use std::ops::Range;

use rand::Rng;

use crate::error::{CaError, Result};

/// Serials are drawn uniformly from this half-open range.
pub const SERIAL_RANGE: Range<u64> = 50_000_000..100_000_000;

/// Upper bound on draws when looking for an unused serial.
const MAX_UNIQUE_DRAWS: usize = 64;

/// Draws certificate serial numbers.
///
/// The allocator itself is memoryless; pair it with an
/// [`IssuedSerialRegistry`] through [`SerialAllocator::next_unique`] when
/// serials must not repeat.
#[derive(Clone, Debug)]
pub struct SerialAllocator {
    range: Range<u64>,
}

impl Default for SerialAllocator {
    fn default() -> Self {
        Self {
            range: SERIAL_RANGE,
        }
    }
}

impl SerialAllocator {
    pub fn next(&self) -> u64 {
        rand::rng().random_range(self.range.clone())
    }

    /// Draws until a serial absent from `registry` comes up.
    pub fn next_unique(&self, registry: &IssuedSerialRegistry) -> Result<u64> {
        for _ in 0..MAX_UNIQUE_DRAWS {
            let serial = self.next();
            if !registry.contains(serial) {
                return Ok(serial);
            }
            tracing::debug!(serial, "serial already issued, drawing again");
        }
        Err(CaError::SerialExhausted {
            attempts: MAX_UNIQUE_DRAWS,
        })
    }
}

/// The set of serials a CA has already used.
///
/// Stored as one decimal serial per line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IssuedSerialRegistry {
    serials: BTreeSet<u64>,
}

impl IssuedSerialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the line-oriented form; blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let serials = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.parse::<u64>()
                    .map_err(|e| CaError::DecodingError(format!("bad serial {line:?}: {e}")))
            })
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self { serials })
    }

    pub fn to_text(&self) -> String {
        self.serials.iter().map(|s| format!("{s}\n")).collect()
    }

    pub fn contains(&self, serial: u64) -> bool {
        self.serials.contains(&serial)
    }

    /// Returns `false` if the serial was already present.
    pub fn insert(&mut self, serial: u64) -> bool {
        self.serials.insert(serial)
    }

    pub fn len(&self) -> usize {
        self.serials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_stay_in_range() {
        let allocator = SerialAllocator::default();
        for _ in 0..1000 {
            let serial = allocator.next();
            assert!(SERIAL_RANGE.contains(&serial), "{serial} out of range");
        }
    }

    #[test]
    fn next_unique_skips_registered_serials() {
        let allocator = SerialAllocator { range: 7..9 };
        let mut registry = IssuedSerialRegistry::new();
        registry.insert(7);
        for _ in 0..20 {
            assert_eq!(allocator.next_unique(&registry).unwrap(), 8);
        }
    }

    #[test]
    fn next_unique_gives_up_when_range_is_used() {
        let allocator = SerialAllocator { range: 7..8 };
        let mut registry = IssuedSerialRegistry::new();
        registry.insert(7);
        assert!(matches!(
            allocator.next_unique(&registry),
            Err(CaError::SerialExhausted { .. })
        ));
    }

    #[test]
    fn registry_text_form() {
        let registry = IssuedSerialRegistry::parse("\n60000001\n  50000000 \n").unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(50_000_000));
        assert_eq!(registry.to_text(), "50000000\n60000001\n");
        assert_eq!(IssuedSerialRegistry::parse(&registry.to_text()).unwrap(), registry);
    }

    #[test]
    fn registry_rejects_garbage() {
        assert!(IssuedSerialRegistry::parse("12\nabc\n").is_err());
    }
}
