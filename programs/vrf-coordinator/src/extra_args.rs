use crate::errors::{CoordinatorError, Result};

/// Tag prefixing version-1 extra args: the first four bytes of
/// `keccak256("VRF ExtraArgsV1")`, kept for wire compatibility.
pub const EXTRA_ARGS_V1_TAG: [u8; 4] = [0x92, 0xfd, 0x13, 0x38];

/// Optional request arguments carried as an opaque byte string.
///
/// Empty bytes decode to the default (fee-token payment).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtraArgsV1 {
    pub native_payment: bool,
}

impl ExtraArgsV1 {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(EXTRA_ARGS_V1_TAG.len() + 1);
        out.extend_from_slice(&EXTRA_ARGS_V1_TAG);
        out.push(self.native_payment as u8);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        match bytes {
            [a, b, c, d, flag] if [*a, *b, *c, *d] == EXTRA_ARGS_V1_TAG => match *flag {
                0 => Ok(Self { native_payment: false }),
                1 => Ok(Self { native_payment: true }),
                _ => Err(CoordinatorError::InvalidExtraArgsTag),
            },
            _ => Err(CoordinatorError::InvalidExtraArgsTag),
        }
    }
}
