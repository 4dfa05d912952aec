//! Port type compatibility.
//!
//! Rows are the source port's type, columns the target port's type, both in
//! [`ValueType::ALL`] order. Numbers and booleans may feed text ports (they
//! stringify losslessly); every other pairing requires identical types.

use flowcore::ValueType;

const Y: bool = true;
const N: bool = false;

#[rustfmt::skip]
const COMPATIBILITY: [[bool; 6]; 6] = [
    //            text number boolean image video audio
    /* text    */ [Y,   N,     N,      N,    N,    N],
    /* number  */ [Y,   Y,     N,      N,    N,    N],
    /* boolean */ [Y,   N,     Y,      N,    N,    N],
    /* image   */ [N,   N,     N,      Y,    N,    N],
    /* video   */ [N,   N,     N,      N,    Y,    N],
    /* audio   */ [N,   N,     N,      N,    N,    Y],
];

/// Fixed lookup over all 36 ordered type pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortCompatibilityRegistry;

impl PortCompatibilityRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn are_ports_compatible(&self, source: ValueType, target: ValueType) -> bool {
        are_ports_compatible(source, target)
    }
}

pub fn are_ports_compatible(source: ValueType, target: ValueType) -> bool {
    COMPATIBILITY[source.index()][target.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_type_is_always_compatible() {
        for t in ValueType::ALL {
            assert!(are_ports_compatible(t, t), "{} should accept itself", t);
        }
    }

    #[test]
    fn table_covers_every_pair() {
        let registry = PortCompatibilityRegistry::new();
        let mut compatible = 0;
        let mut checked = 0;
        for source in ValueType::ALL {
            for target in ValueType::ALL {
                checked += 1;
                if registry.are_ports_compatible(source, target) {
                    compatible += 1;
                }
            }
        }
        assert_eq!(checked, 36);
        // six reflexive pairs plus number->text and boolean->text
        assert_eq!(compatible, 8);
    }

    #[test]
    fn media_never_flows_into_text() {
        assert!(!are_ports_compatible(ValueType::Image, ValueType::Text));
        assert!(!are_ports_compatible(ValueType::Audio, ValueType::Text));
        assert!(!are_ports_compatible(ValueType::Text, ValueType::Image));
        assert!(!are_ports_compatible(ValueType::Image, ValueType::Video));
    }

    #[test]
    fn scalars_stringify_into_text() {
        assert!(are_ports_compatible(ValueType::Number, ValueType::Text));
        assert!(are_ports_compatible(ValueType::Boolean, ValueType::Text));
        assert!(!are_ports_compatible(ValueType::Text, ValueType::Number));
        assert!(!are_ports_compatible(ValueType::Number, ValueType::Boolean));
    }
}
