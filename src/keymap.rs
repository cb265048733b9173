//! The keymap: a host-supplied, read-only table mapping (layer, keypos) to
//! a keycode. The core never loads or parses keymap data itself — it is
//! handed an already-built table through one of the two loaders below,
//! matching the flat/row-col split in [`crate::keypos`].

use crate::keycode::Keycode;
use crate::keypos::Keypos;
use crate::{CoreError, CoreResult};

/// Resolve a keycode for a given layer and key position.
pub trait Keymap {
    /// Number of layers this keymap holds.
    fn num_layers(&self) -> u8;

    /// The keycode for `(layer, keypos)`, or 0 if out of bounds. Matches
    /// the original's `get_keycode_from_layer_fn`: lookups never fail, they
    /// degrade to the inert `0x00` basic keycode.
    fn lookup(&self, layer: u8, keypos: Keypos) -> Keycode;
}

/// A keymap addressed by a flat key index, one slice of keycodes per layer.
#[cfg(feature = "keypos-flat")]
pub struct FlatKeymap<'a> {
    layers: &'a [&'a [Keycode]],
}

#[cfg(feature = "keypos-flat")]
impl<'a> FlatKeymap<'a> {
    /// Build a flat keymap from one keycode slice per layer. Every layer
    /// must have the same length; an empty `layers` slice or length
    /// mismatch is a configuration error.
    pub fn new(layers: &'a [&'a [Keycode]]) -> CoreResult<Self> {
        if layers.is_empty() {
            return Err(CoreError::InvalidKeymapDimensions {
                message: "keymap must have at least one layer",
            });
        }
        let width = layers[0].len();
        if width == 0 || layers.iter().any(|l| l.len() != width) {
            return Err(CoreError::InvalidKeymapDimensions {
                message: "every layer must share the same non-zero width",
            });
        }
        Ok(FlatKeymap { layers })
    }
}

#[cfg(feature = "keypos-flat")]
impl Keymap for FlatKeymap<'_> {
    fn num_layers(&self) -> u8 {
        self.layers.len() as u8
    }

    fn lookup(&self, layer: u8, keypos: Keypos) -> Keycode {
        self.layers
            .get(layer as usize)
            .and_then(|l| l.get(keypos.0 as usize))
            .copied()
            .unwrap_or(0)
    }
}

/// A keymap addressed by (row, col), one flattened `rows * cols` slice per
/// layer.
#[cfg(feature = "keypos-rowcol")]
pub struct RowColKeymap<'a> {
    layers: &'a [&'a [Keycode]],
    rows: u8,
    cols: u8,
}

#[cfg(feature = "keypos-rowcol")]
impl<'a> RowColKeymap<'a> {
    /// Build a row/col keymap. Each layer's slice must be exactly
    /// `rows * cols` long.
    pub fn new(layers: &'a [&'a [Keycode]], rows: u8, cols: u8) -> CoreResult<Self> {
        if layers.is_empty() || rows == 0 || cols == 0 {
            return Err(CoreError::InvalidKeymapDimensions {
                message: "keymap must have at least one layer and non-zero rows/cols",
            });
        }
        let expected = rows as usize * cols as usize;
        if layers.iter().any(|l| l.len() != expected) {
            return Err(CoreError::InvalidKeymapDimensions {
                message: "every layer must be exactly rows * cols long",
            });
        }
        Ok(RowColKeymap { layers, rows, cols })
    }
}

#[cfg(feature = "keypos-rowcol")]
impl Keymap for RowColKeymap<'_> {
    fn num_layers(&self) -> u8 {
        self.layers.len() as u8
    }

    fn lookup(&self, layer: u8, keypos: Keypos) -> Keycode {
        if keypos.row >= self.rows || keypos.col >= self.cols {
            return 0;
        }
        let index = keypos.row as usize * self.cols as usize + keypos.col as usize;
        self.layers
            .get(layer as usize)
            .and_then(|l| l.get(index))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "keypos-flat")]
    #[test]
    fn flat_lookup_resolves_in_bounds() {
        let layer0: &[Keycode] = &[0x04, 0x05, 0x06];
        let layer1: &[Keycode] = &[0x10, 0x11, 0x12];
        let keymap = FlatKeymap::new(&[layer0, layer1]).unwrap();
        assert_eq!(keymap.lookup(0, Keypos::new(1)), 0x05);
        assert_eq!(keymap.lookup(1, Keypos::new(2)), 0x12);
    }

    #[cfg(feature = "keypos-flat")]
    #[test]
    fn flat_lookup_out_of_bounds_is_zero() {
        let layer0: &[Keycode] = &[0x04];
        let keymap = FlatKeymap::new(&[layer0]).unwrap();
        assert_eq!(keymap.lookup(0, Keypos::new(9)), 0);
        assert_eq!(keymap.lookup(9, Keypos::new(0)), 0);
    }

    #[cfg(feature = "keypos-flat")]
    #[test]
    fn flat_mismatched_widths_reject() {
        let layer0: &[Keycode] = &[0x04, 0x05];
        let layer1: &[Keycode] = &[0x10];
        assert!(FlatKeymap::new(&[layer0, layer1]).is_err());
    }

    #[cfg(feature = "keypos-rowcol")]
    #[test]
    fn rowcol_lookup_resolves_in_bounds() {
        let layer0: &[Keycode] = &[0x04, 0x05, 0x06, 0x07];
        let keymap = RowColKeymap::new(&[layer0], 2, 2).unwrap();
        assert_eq!(keymap.lookup(0, Keypos::new(1, 1)), 0x07);
    }

    #[cfg(feature = "keypos-rowcol")]
    #[test]
    fn rowcol_lookup_out_of_bounds_is_zero() {
        let layer0: &[Keycode] = &[0x04, 0x05, 0x06, 0x07];
        let keymap = RowColKeymap::new(&[layer0], 2, 2).unwrap();
        assert_eq!(keymap.lookup(0, Keypos::new(5, 5)), 0);
    }
}
